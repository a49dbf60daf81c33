//! High-variance gene selection ahead of dimensionality reduction.

use crate::transform::TransformedMatrix;
use rayon::prelude::*;

/// Sample variance of each gene across samples.
///
/// Uses the unbiased (n-1) denominator; matrices with fewer than two
/// samples get zero variances.
pub fn feature_variances(transformed: &TransformedMatrix) -> Vec<f64> {
    let n_samples = transformed.n_samples();
    if n_samples < 2 {
        return vec![0.0; transformed.n_genes()];
    }

    (0..transformed.n_genes())
        .into_par_iter()
        .map(|row| {
            let values = transformed.row(row);
            let mean = values.iter().sum::<f64>() / n_samples as f64;
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n_samples - 1) as f64
        })
        .collect()
}

/// Keep the `n_top` genes with the highest variance, preserving their
/// original row order. Asking for more genes than exist keeps everything.
pub fn select_high_variance(transformed: &TransformedMatrix, n_top: usize) -> TransformedMatrix {
    let variances = feature_variances(transformed);

    let mut order: Vec<usize> = (0..variances.len()).collect();
    order.sort_by(|&a, &b| {
        variances[b]
            .partial_cmp(&variances[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order.truncate(n_top);
    order.sort_unstable();

    transformed.subset_genes(&order)
}
