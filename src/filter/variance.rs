//! Gene filtering by variance, detection rate and total count.

use crate::data::AnnotatedMatrix;
use crate::error::{DeaError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Statistics from a gene filtering pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSummary {
    /// Number of genes before filtering.
    pub n_before: usize,
    /// Number of genes after filtering.
    pub n_after: usize,
    /// Number of genes removed.
    pub n_removed: usize,
    /// Proportion of genes retained.
    pub retention_rate: f64,
}

impl FilterSummary {
    fn new(n_before: usize, n_after: usize) -> Self {
        let retention_rate = if n_before == 0 {
            1.0
        } else {
            n_after as f64 / n_before as f64
        };
        Self {
            n_before,
            n_after,
            n_removed: n_before - n_after,
            retention_rate,
        }
    }
}

impl std::fmt::Display for FilterSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Filter Summary")?;
        writeln!(f, "  Before:    {} genes", self.n_before)?;
        writeln!(f, "  After:     {} genes", self.n_after)?;
        writeln!(f, "  Removed:   {} genes", self.n_removed)?;
        writeln!(f, "  Retained:  {:.1}%", self.retention_rate * 100.0)?;
        Ok(())
    }
}

/// Drop genes whose counts are identical across all samples.
///
/// A variance of exactly zero includes the all-zero gene and the
/// constant-count gene; both carry no contrast and destabilize downstream
/// fits. Returns the filtered matrix and a summary.
pub fn filter_zero_variance(data: &AnnotatedMatrix) -> Result<(AnnotatedMatrix, FilterSummary)> {
    let counts = data.counts();
    let n_samples = counts.n_samples();

    let keep: Vec<usize> = (0..counts.n_genes())
        .into_par_iter()
        .filter(|&row| {
            if n_samples == 0 {
                return false;
            }
            let dense = counts.row_dense(row);
            dense.iter().any(|&v| v != dense[0])
        })
        .collect();

    let filtered = data.subset_genes(&keep)?;
    let summary = FilterSummary::new(counts.n_genes(), filtered.n_genes());
    Ok((filtered, summary))
}

/// Drop genes detected (non-zero) in less than `min_detection` of samples.
///
/// The boundary is inclusive: a gene detected in exactly the threshold
/// fraction of samples is retained.
pub fn filter_low_expression(
    data: &AnnotatedMatrix,
    min_detection: f64,
) -> Result<(AnnotatedMatrix, FilterSummary)> {
    if !(0.0..=1.0).contains(&min_detection) {
        return Err(DeaError::InvalidParameter(
            "Detection threshold must be between 0 and 1".to_string(),
        ));
    }

    let counts = data.counts();
    let n_samples = counts.n_samples();
    let min_samples = (min_detection * n_samples as f64).ceil() as usize;

    let keep: Vec<usize> = (0..counts.n_genes())
        .into_par_iter()
        .filter(|&row| counts.detection_count(row) >= min_samples)
        .collect();

    let filtered = data.subset_genes(&keep)?;
    let summary = FilterSummary::new(counts.n_genes(), filtered.n_genes());
    Ok((filtered, summary))
}

/// Drop genes whose total count across samples is below `min_total`.
pub fn filter_min_count(
    data: &AnnotatedMatrix,
    min_total: u64,
) -> Result<(AnnotatedMatrix, FilterSummary)> {
    let counts = data.counts();
    let totals = counts.row_sums();

    let keep: Vec<usize> = totals
        .iter()
        .enumerate()
        .filter(|(_, &total)| total >= min_total)
        .map(|(i, _)| i)
        .collect();

    let filtered = data.subset_genes(&keep)?;
    let summary = FilterSummary::new(counts.n_genes(), filtered.n_genes());
    Ok((filtered, summary))
}
