//! Result types for differential expression analysis.

use crate::error::{DeaError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Fixed significance cutoff on the adjusted p-value.
pub const SIGNIFICANCE_ALPHA: f64 = 0.05;

/// Result for a single gene from differential expression analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeResult {
    /// Gene identifier.
    pub gene_id: String,
    /// Name of the coefficient/contrast being tested.
    pub contrast: String,
    /// Mean of normalized counts across samples.
    pub base_mean: f64,
    /// Estimated effect size (log2 fold change vs the reference level).
    pub log2_fold_change: f64,
    /// Standard error of the estimate (log2 scale).
    pub std_error: f64,
    /// Test statistic.
    pub statistic: f64,
    /// Raw p-value.
    pub p_value: f64,
    /// Adjusted p-value (q-value) after multiple testing correction.
    pub q_value: f64,
    /// Significance flag at q < 0.05.
    pub significant: bool,
}

impl DeResult {
    /// Create a new result row; the `significant` flag is derived from the
    /// q-value at the fixed 0.05 cutoff.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gene_id: String,
        contrast: String,
        base_mean: f64,
        log2_fold_change: f64,
        std_error: f64,
        statistic: f64,
        p_value: f64,
        q_value: f64,
    ) -> Self {
        let significant = q_value < SIGNIFICANCE_ALPHA;
        Self {
            gene_id,
            contrast,
            base_mean,
            log2_fold_change,
            std_error,
            statistic,
            p_value,
            q_value,
            significant,
        }
    }

    /// Check significance at a custom threshold.
    pub fn is_significant_at(&self, alpha: f64) -> bool {
        self.q_value < alpha
    }
}

/// Collection of differential expression results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeResultSet {
    /// Method name used to generate these results.
    pub method: String,
    /// Individual results for each gene.
    pub results: Vec<DeResult>,
}

impl DeResultSet {
    /// Create a new result set.
    pub fn new(method: String, results: Vec<DeResult>) -> Self {
        Self { method, results }
    }

    /// Number of results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Get results sorted by p-value (ascending).
    pub fn sorted_by_pvalue(&self) -> Vec<&DeResult> {
        let mut sorted: Vec<_> = self.results.iter().collect();
        sorted.sort_by(|a, b| {
            a.p_value
                .partial_cmp(&b.p_value)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted
    }

    /// Get significant results (q < 0.05).
    pub fn significant(&self) -> Vec<&DeResult> {
        self.results.iter().filter(|r| r.significant).collect()
    }

    /// Get significant results at a custom threshold.
    pub fn significant_at(&self, alpha: f64) -> Vec<&DeResult> {
        self.results
            .iter()
            .filter(|r| r.is_significant_at(alpha))
            .collect()
    }

    /// Get the result for one gene.
    pub fn get_gene(&self, gene_id: &str) -> Option<&DeResult> {
        self.results.iter().find(|r| r.gene_id == gene_id)
    }

    /// Count significant results at standard thresholds.
    pub fn summary(&self) -> ResultSummary {
        ResultSummary {
            total: self.len(),
            significant_001: self.results.iter().filter(|r| r.q_value < 0.001).count(),
            significant_01: self.results.iter().filter(|r| r.q_value < 0.01).count(),
            significant_05: self.results.iter().filter(|r| r.q_value < 0.05).count(),
            significant_10: self.results.iter().filter(|r| r.q_value < 0.10).count(),
        }
    }

    /// Write results to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(
            writer,
            "gene_id\tcontrast\tbase_mean\tlog2_fold_change\tstd_error\tstatistic\tp_value\tq_value\tsignificant"
        )?;
        for r in &self.results {
            writeln!(
                writer,
                "{}\t{}\t{:.4}\t{:.6}\t{:.6}\t{:.4}\t{:.4e}\t{:.4e}\t{}",
                r.gene_id,
                r.contrast,
                r.base_mean,
                r.log2_fold_change,
                r.std_error,
                r.statistic,
                r.p_value,
                r.q_value,
                r.significant
            )?;
        }

        Ok(())
    }

    /// Read results back from a TSV file written by `to_tsv`.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header = lines
            .next()
            .ok_or_else(|| DeaError::EmptyData("Empty results TSV".to_string()))??;
        if !header.starts_with("gene_id\t") {
            return Err(DeaError::InvalidParameter(
                "Results TSV is missing the expected header".to_string(),
            ));
        }

        let mut results = Vec::new();
        for line_result in lines {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 9 {
                return Err(DeaError::InvalidParameter(format!(
                    "Results TSV row has {} columns, expected 9",
                    fields.len()
                )));
            }
            let parse = |s: &str, name: &str| -> Result<f64> {
                s.parse::<f64>().map_err(|_| {
                    DeaError::InvalidParameter(format!("Bad {} value '{}' in results TSV", name, s))
                })
            };
            results.push(DeResult::new(
                fields[0].to_string(),
                fields[1].to_string(),
                parse(fields[2], "base_mean")?,
                parse(fields[3], "log2_fold_change")?,
                parse(fields[4], "std_error")?,
                parse(fields[5], "statistic")?,
                parse(fields[6], "p_value")?,
                parse(fields[7], "q_value")?,
            ));
        }

        Ok(Self::new("loaded".to_string(), results))
    }

    /// Write the persisted JSON form.
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        Ok(serde_json::to_writer_pretty(BufWriter::new(file), self)?)
    }

    /// Iterate over results.
    pub fn iter(&self) -> impl Iterator<Item = &DeResult> {
        self.results.iter()
    }
}

/// Summary statistics for a result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSummary {
    pub total: usize,
    pub significant_001: usize,
    pub significant_01: usize,
    pub significant_05: usize,
    pub significant_10: usize,
}

impl std::fmt::Display for ResultSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Total genes tested: {}", self.total)?;
        writeln!(f, "Significant at q < 0.001: {}", self.significant_001)?;
        writeln!(f, "Significant at q < 0.01:  {}", self.significant_01)?;
        writeln!(f, "Significant at q < 0.05:  {}", self.significant_05)?;
        writeln!(f, "Significant at q < 0.10:  {}", self.significant_10)?;
        Ok(())
    }
}
