//! Expression matrix with sparse storage for RNA-seq counts.

use crate::error::{DeaError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sprs::{CsMat, TriMat};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// A sparse matrix of raw counts across genes and samples.
///
/// Rows represent genes, columns represent samples. Stored in CSR format
/// so row-wise (per-gene) operations are cheap.
#[derive(Debug, Clone)]
pub struct ExpressionMatrix {
    /// Sparse matrix in CSR format (genes × samples)
    data: CsMat<u64>,
    /// Gene identifiers (row names)
    gene_ids: Vec<String>,
    /// Sample identifiers (column names)
    sample_ids: Vec<String>,
}

/// Serde-friendly representation used for the persisted JSON form.
#[derive(Debug, Serialize, Deserialize)]
struct MatrixRepr {
    n_genes: usize,
    n_samples: usize,
    gene_ids: Vec<String>,
    sample_ids: Vec<String>,
    /// Non-zero entries as (row, col, value) triplets.
    entries: Vec<(usize, usize, u64)>,
}

impl ExpressionMatrix {
    /// Create a new ExpressionMatrix from a sparse matrix and identifiers.
    pub fn new(data: CsMat<u64>, gene_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != gene_ids.len() {
            return Err(DeaError::DimensionMismatch {
                expected: nrows,
                actual: gene_ids.len(),
            });
        }
        if ncols != sample_ids.len() {
            return Err(DeaError::DimensionMismatch {
                expected: ncols,
                actual: sample_ids.len(),
            });
        }
        Ok(Self {
            data,
            gene_ids,
            sample_ids,
        })
    }

    /// Build a matrix from (row, col, value) triplets.
    pub fn from_triplets(
        shape: (usize, usize),
        triplets: &[(usize, usize, u64)],
        gene_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let mut tri = TriMat::new(shape);
        for &(row, col, val) in triplets {
            if val > 0 {
                tri.add_triplet(row, col, val);
            }
        }
        Self::new(tri.to_csr(), gene_ids, sample_ids)
    }

    /// Load an expression matrix from a TSV file.
    ///
    /// Expected format:
    /// - First row: header with sample IDs (first column is the gene ID header)
    /// - Subsequent rows: gene ID followed by counts
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| DeaError::EmptyData("Empty counts TSV".to_string()))??;
        let header: Vec<&str> = header_line.split('\t').collect();
        if header.len() < 2 {
            return Err(DeaError::EmptyData(
                "Counts TSV must have at least one sample column".to_string(),
            ));
        }
        let sample_ids: Vec<String> = header[1..].iter().map(|s| s.to_string()).collect();
        let n_samples = sample_ids.len();

        let mut gene_ids: Vec<String> = Vec::new();
        let mut triplets: Vec<(usize, usize, u64)> = Vec::new();

        for line_result in lines {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let row_idx = gene_ids.len();
            gene_ids.push(fields[0].to_string());

            for (col_idx, raw) in fields[1..].iter().enumerate().take(n_samples) {
                let value: u64 = raw.trim().parse().map_err(|_| DeaError::InvalidCount {
                    value: raw.to_string(),
                    row: row_idx,
                    col: col_idx,
                })?;
                if value > 0 {
                    triplets.push((row_idx, col_idx, value));
                }
            }
        }

        if gene_ids.is_empty() {
            return Err(DeaError::EmptyData("No genes in counts TSV".to_string()));
        }

        Self::from_triplets((gene_ids.len(), n_samples), &triplets, gene_ids, sample_ids)
    }

    /// Write the matrix to a TSV file (dense layout).
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "gene_id")?;
        for sample_id in &self.sample_ids {
            write!(writer, "\t{}", sample_id)?;
        }
        writeln!(writer)?;

        for (row, gene_id) in self.gene_ids.iter().enumerate() {
            write!(writer, "{}", gene_id)?;
            for col in 0..self.n_samples() {
                write!(writer, "\t{}", self.get(row, col))?;
            }
            writeln!(writer)?;
        }

        Ok(())
    }

    /// Get the value at (row, col), returning 0 for missing entries.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u64 {
        self.data.get(row, col).copied().unwrap_or(0)
    }

    /// Number of genes (rows).
    #[inline]
    pub fn n_genes(&self) -> usize {
        self.data.rows()
    }

    /// Number of samples (columns).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.cols()
    }

    /// Total number of non-zero entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.data.nnz()
    }

    /// Gene identifiers.
    #[inline]
    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    /// Sample identifiers.
    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Get the underlying sparse matrix.
    #[inline]
    pub fn data(&self) -> &CsMat<u64> {
        &self.data
    }

    /// Number of samples in which a gene is detected (non-zero).
    pub fn detection_count(&self, row: usize) -> usize {
        self.data.outer_view(row).map(|v| v.nnz()).unwrap_or(0)
    }

    /// Get a dense vector for a specific gene (row).
    pub fn row_dense(&self, row: usize) -> Vec<u64> {
        let mut dense = vec![0u64; self.n_samples()];
        if let Some(row_vec) = self.data.outer_view(row) {
            for (col, &val) in row_vec.iter() {
                dense[col] = val;
            }
        }
        dense
    }

    /// Get a dense vector for a specific sample (column).
    pub fn col_dense(&self, col: usize) -> Vec<u64> {
        (0..self.n_genes()).map(|row| self.get(row, col)).collect()
    }

    /// Compute row sums (total counts per gene).
    pub fn row_sums(&self) -> Vec<u64> {
        (0..self.n_genes())
            .into_par_iter()
            .map(|row| {
                self.data
                    .outer_view(row)
                    .map(|v| v.iter().map(|(_, &val)| val).sum())
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Compute column sums (library sizes per sample).
    pub fn col_sums(&self) -> Vec<u64> {
        let mut sums = vec![0u64; self.n_samples()];
        for row_vec in self.data.outer_iterator() {
            for (col, &val) in row_vec.iter() {
                sums[col] += val;
            }
        }
        sums
    }

    /// Subset the matrix to the given genes (by row index), preserving order.
    pub fn subset_genes(&self, indices: &[usize]) -> Result<Self> {
        let n_samples = self.n_samples();
        let mut gene_ids = Vec::with_capacity(indices.len());
        let mut tri = TriMat::new((indices.len(), n_samples));

        for (new_row, &old_row) in indices.iter().enumerate() {
            if old_row >= self.n_genes() {
                return Err(DeaError::InvalidParameter(format!(
                    "Gene index {} out of bounds",
                    old_row
                )));
            }
            gene_ids.push(self.gene_ids[old_row].clone());
            if let Some(row_vec) = self.data.outer_view(old_row) {
                for (col, &val) in row_vec.iter() {
                    tri.add_triplet(new_row, col, val);
                }
            }
        }

        Self::new(tri.to_csr(), gene_ids, self.sample_ids.clone())
    }

    /// Subset the matrix to the given samples (by column index), preserving order.
    pub fn subset_samples(&self, indices: &[usize]) -> Result<Self> {
        let mut sample_ids = Vec::with_capacity(indices.len());
        for &old_col in indices {
            if old_col >= self.n_samples() {
                return Err(DeaError::InvalidParameter(format!(
                    "Sample index {} out of bounds",
                    old_col
                )));
            }
            sample_ids.push(self.sample_ids[old_col].clone());
        }

        let col_map: HashMap<usize, usize> = indices
            .iter()
            .enumerate()
            .map(|(new_col, &old_col)| (old_col, new_col))
            .collect();

        let mut tri = TriMat::new((self.n_genes(), indices.len()));
        for (row, row_vec) in self.data.outer_iterator().enumerate() {
            for (old_col, &val) in row_vec.iter() {
                if let Some(&new_col) = col_map.get(&old_col) {
                    tri.add_triplet(row, new_col, val);
                }
            }
        }

        Self::new(tri.to_csr(), self.gene_ids.clone(), sample_ids)
    }

    /// Convert to a dense matrix (f64).
    pub fn to_dense(&self) -> nalgebra::DMatrix<f64> {
        let mut dense = nalgebra::DMatrix::zeros(self.n_genes(), self.n_samples());
        for (row, row_vec) in self.data.outer_iterator().enumerate() {
            for (col, &val) in row_vec.iter() {
                dense[(row, col)] = val as f64;
            }
        }
        dense
    }

    fn to_repr(&self) -> MatrixRepr {
        let mut entries = Vec::with_capacity(self.nnz());
        for (row, row_vec) in self.data.outer_iterator().enumerate() {
            for (col, &val) in row_vec.iter() {
                entries.push((row, col, val));
            }
        }
        MatrixRepr {
            n_genes: self.n_genes(),
            n_samples: self.n_samples(),
            gene_ids: self.gene_ids.clone(),
            sample_ids: self.sample_ids.clone(),
            entries,
        }
    }

    fn from_repr(repr: MatrixRepr) -> Result<Self> {
        Self::from_triplets(
            (repr.n_genes, repr.n_samples),
            &repr.entries,
            repr.gene_ids,
            repr.sample_ids,
        )
    }
}

impl Serialize for ExpressionMatrix {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_repr().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ExpressionMatrix {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let repr = MatrixRepr::deserialize(deserializer)?;
        Self::from_repr(repr).map_err(serde::de::Error::custom)
    }
}
