//! Counts-per-million library size scaling.

use crate::data::ExpressionMatrix;
use crate::error::{DeaError, Result};
use crate::transform::TransformedMatrix;
use nalgebra::DMatrix;

const MILLION: f64 = 1_000_000.0;

/// Scale each sample to counts per million.
///
/// A sample with a zero library size has no defined scaling and fails
/// loudly rather than silently producing zeros.
pub fn cpm(counts: &ExpressionMatrix) -> Result<TransformedMatrix> {
    cpm_inner(counts, false)
}

/// CPM followed by an elementwise log2(x + 1), the usual pre-PCA transform.
pub fn cpm_log2(counts: &ExpressionMatrix) -> Result<TransformedMatrix> {
    cpm_inner(counts, true)
}

fn cpm_inner(counts: &ExpressionMatrix, log: bool) -> Result<TransformedMatrix> {
    if counts.n_genes() == 0 || counts.n_samples() == 0 {
        return Err(DeaError::EmptyData(
            "Cannot compute CPM on an empty matrix".to_string(),
        ));
    }

    let library_sizes = counts.col_sums();
    for (col, &total) in library_sizes.iter().enumerate() {
        if total == 0 {
            return Err(DeaError::Numerical(format!(
                "Sample '{}' has a zero library size",
                counts.sample_ids()[col]
            )));
        }
    }

    let mut data = DMatrix::zeros(counts.n_genes(), counts.n_samples());
    for (row, row_vec) in counts.data().outer_iterator().enumerate() {
        for (col, &val) in row_vec.iter() {
            let scaled = val as f64 / library_sizes[col] as f64 * MILLION;
            data[(row, col)] = if log { (scaled + 1.0).log2() } else { scaled };
        }
    }

    Ok(TransformedMatrix {
        data,
        gene_ids: counts.gene_ids().to_vec(),
        sample_ids: counts.sample_ids().to_vec(),
        transformation: if log { "log2_cpm" } else { "cpm" }.to_string(),
    })
}
