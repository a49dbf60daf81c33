//! Per-gene feature annotations (identifiers, symbols, positional fields).

use crate::error::{DeaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Feature annotation table, aligned to the rows of an expression matrix.
///
/// All annotation values are kept as strings; the table carries identity and
/// labels (gene symbol, chromosome, biotype), not quantities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureAnnotations {
    /// Gene IDs in row order.
    gene_ids: Vec<String>,
    /// Annotation column names.
    column_names: Vec<String>,
    /// Data stored as gene_id -> column_name -> value.
    data: HashMap<String, HashMap<String, String>>,
}

impl FeatureAnnotations {
    /// Build an annotation table with only gene IDs and no extra columns.
    pub fn from_ids(gene_ids: Vec<String>) -> Self {
        let data = gene_ids
            .iter()
            .map(|id| (id.clone(), HashMap::new()))
            .collect();
        Self {
            gene_ids,
            column_names: Vec::new(),
            data,
        }
    }

    /// Load feature annotations from a TSV file.
    ///
    /// First column is the gene ID; remaining columns are annotation fields.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| DeaError::EmptyData("Empty feature annotation file".to_string()))??;
        let header: Vec<&str> = header_line.split('\t').collect();
        let column_names: Vec<String> = header[1..].iter().map(|s| s.to_string()).collect();

        let mut gene_ids = Vec::new();
        let mut data = HashMap::new();

        for line_result in lines {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let gene_id = fields[0].to_string();

            let mut record = HashMap::new();
            for (col_idx, col_name) in column_names.iter().enumerate() {
                let value = fields.get(col_idx + 1).map(|s| s.trim()).unwrap_or("");
                record.insert(col_name.clone(), value.to_string());
            }
            gene_ids.push(gene_id.clone());
            data.insert(gene_id, record);
        }

        if gene_ids.is_empty() {
            return Err(DeaError::EmptyData(
                "No features in annotation file".to_string(),
            ));
        }

        Ok(Self {
            gene_ids,
            column_names,
            data,
        })
    }

    /// Gene IDs in row order.
    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    /// Annotation column names.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Number of annotated genes.
    pub fn n_genes(&self) -> usize {
        self.gene_ids.len()
    }

    /// Get one annotation value.
    pub fn get(&self, gene_id: &str, column: &str) -> Option<&str> {
        self.data
            .get(gene_id)
            .and_then(|m| m.get(column))
            .map(|s| s.as_str())
    }

    /// Get a whole annotation column, in row order.
    pub fn column(&self, column: &str) -> Result<Vec<&str>> {
        if !self.column_names.iter().any(|c| c == column) {
            return Err(DeaError::MissingColumn(column.to_string()));
        }
        Ok(self
            .gene_ids
            .iter()
            .map(|id| self.get(id, column).unwrap_or(""))
            .collect())
    }

    /// Check if a gene is annotated.
    pub fn has_gene(&self, gene_id: &str) -> bool {
        self.data.contains_key(gene_id)
    }

    /// Subset to the given genes, in the given order.
    pub fn subset_genes(&self, gene_ids: &[String]) -> Result<Self> {
        let mut new_data = HashMap::new();
        let mut new_gene_ids = Vec::new();

        for gid in gene_ids {
            match self.data.get(gid) {
                Some(record) => {
                    new_data.insert(gid.clone(), record.clone());
                    new_gene_ids.push(gid.clone());
                }
                None => {
                    return Err(DeaError::GeneMismatch(format!(
                        "Gene '{}' not found in feature annotations",
                        gid
                    )));
                }
            }
        }

        Ok(Self {
            gene_ids: new_gene_ids,
            column_names: self.column_names.clone(),
            data: new_data,
        })
    }

    /// Align to match the row order of a count matrix.
    pub fn align_to(&self, gene_ids: &[String]) -> Result<Self> {
        self.subset_genes(gene_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_tsv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "gene_id\tsymbol\tchromosome").unwrap();
        writeln!(file, "ENSG01\tBRCA1\t17").unwrap();
        writeln!(file, "ENSG02\tESR1\t6").unwrap();
        writeln!(file, "ENSG03\tERBB2\t17").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load() {
        let file = create_test_tsv();
        let anno = FeatureAnnotations::from_tsv(file.path()).unwrap();

        assert_eq!(anno.n_genes(), 3);
        assert_eq!(anno.column_names(), &["symbol", "chromosome"]);
        assert_eq!(anno.get("ENSG01", "symbol"), Some("BRCA1"));
        assert_eq!(anno.get("ENSG02", "chromosome"), Some("6"));
    }

    #[test]
    fn test_column() {
        let file = create_test_tsv();
        let anno = FeatureAnnotations::from_tsv(file.path()).unwrap();
        assert_eq!(anno.column("symbol").unwrap(), vec!["BRCA1", "ESR1", "ERBB2"]);
        assert!(anno.column("biotype").is_err());
    }

    #[test]
    fn test_subset_genes() {
        let file = create_test_tsv();
        let anno = FeatureAnnotations::from_tsv(file.path()).unwrap();

        let subset = anno
            .subset_genes(&["ENSG03".to_string(), "ENSG01".to_string()])
            .unwrap();
        assert_eq!(subset.gene_ids(), &["ENSG03", "ENSG01"]);

        assert!(anno.subset_genes(&["ENSG99".to_string()]).is_err());
    }

    #[test]
    fn test_from_ids() {
        let anno = FeatureAnnotations::from_ids(vec!["g1".to_string(), "g2".to_string()]);
        assert_eq!(anno.n_genes(), 2);
        assert!(anno.column_names().is_empty());
        assert!(anno.has_gene("g1"));
    }
}
