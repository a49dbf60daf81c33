//! Median-of-ratios size factor estimation.
//!
//! Library sizes differ between samples for purely technical reasons; the
//! count model absorbs this through per-sample size factors estimated as
//! the median ratio of each sample's counts to a geometric-mean reference
//! gene profile. Only genes counted in every sample contribute to the
//! reference.

use crate::data::ExpressionMatrix;
use crate::error::{DeaError, Result};

/// Estimate per-sample size factors with the median-of-ratios method.
///
/// # Errors
/// Fails when no gene is detected in every sample, or when a sample ends up
/// with no usable ratios; both are degenerate inputs the caller should have
/// filtered.
pub fn median_of_ratios(counts: &ExpressionMatrix) -> Result<Vec<f64>> {
    let n_genes = counts.n_genes();
    let n_samples = counts.n_samples();
    if n_genes == 0 || n_samples == 0 {
        return Err(DeaError::EmptyData(
            "Cannot estimate size factors on an empty matrix".to_string(),
        ));
    }

    // Log geometric mean per gene, restricted to genes positive everywhere.
    let mut log_reference: Vec<Option<f64>> = Vec::with_capacity(n_genes);
    for row in 0..n_genes {
        let dense = counts.row_dense(row);
        if dense.iter().all(|&v| v > 0) {
            let mean_log =
                dense.iter().map(|&v| (v as f64).ln()).sum::<f64>() / n_samples as f64;
            log_reference.push(Some(mean_log));
        } else {
            log_reference.push(None);
        }
    }

    if log_reference.iter().all(|r| r.is_none()) {
        return Err(DeaError::Numerical(
            "No gene is detected in every sample; size factors are undefined".to_string(),
        ));
    }

    let mut factors = Vec::with_capacity(n_samples);
    for col in 0..n_samples {
        let mut log_ratios: Vec<f64> = Vec::new();
        for row in 0..n_genes {
            if let Some(reference) = log_reference[row] {
                let count = counts.get(row, col);
                log_ratios.push((count as f64).ln() - reference);
            }
        }
        if log_ratios.is_empty() {
            return Err(DeaError::Numerical(format!(
                "Sample '{}' has no usable counts for size factor estimation",
                counts.sample_ids()[col]
            )));
        }
        factors.push(median(&mut log_ratios).exp());
    }

    Ok(factors)
}

/// Mean of normalized counts per gene: mean over samples of count / factor.
pub fn normalized_means(counts: &ExpressionMatrix, size_factors: &[f64]) -> Result<Vec<f64>> {
    if size_factors.len() != counts.n_samples() {
        return Err(DeaError::DimensionMismatch {
            expected: counts.n_samples(),
            actual: size_factors.len(),
        });
    }

    let n_samples = counts.n_samples().max(1);
    let mut means = vec![0.0; counts.n_genes()];
    for (row, row_vec) in counts.data().outer_iterator().enumerate() {
        let mut sum = 0.0;
        for (col, &val) in row_vec.iter() {
            sum += val as f64 / size_factors[col];
        }
        means[row] = sum / n_samples as f64;
    }
    Ok(means)
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn counts_with_depth_difference() -> ExpressionMatrix {
        // Sample 2 is sample 1 sequenced twice as deep.
        let triplets = vec![
            (0, 0, 10),
            (0, 1, 20),
            (1, 0, 50),
            (1, 1, 100),
            (2, 0, 200),
            (2, 1, 400),
        ];
        ExpressionMatrix::from_triplets(
            (3, 2),
            &triplets,
            vec!["g1".to_string(), "g2".to_string(), "g3".to_string()],
            vec!["S1".to_string(), "S2".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_depth_ratio_recovered() {
        let counts = counts_with_depth_difference();
        let factors = median_of_ratios(&counts).unwrap();

        // Factors are defined up to a constant; their ratio is the depth ratio.
        assert_relative_eq!(factors[1] / factors[0], 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_genes_with_zeros_skipped_for_reference() {
        let triplets = vec![
            (0, 0, 10),
            (0, 1, 20),
            // g2 missing in S1, must not contribute to the reference
            (1, 1, 1000),
        ];
        let counts = ExpressionMatrix::from_triplets(
            (2, 2),
            &triplets,
            vec!["g1".to_string(), "g2".to_string()],
            vec!["S1".to_string(), "S2".to_string()],
        )
        .unwrap();

        let factors = median_of_ratios(&counts).unwrap();
        assert_relative_eq!(factors[1] / factors[0], 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_all_genes_have_zeros_fails() {
        let triplets = vec![(0, 0, 10), (1, 1, 5)];
        let counts = ExpressionMatrix::from_triplets(
            (2, 2),
            &triplets,
            vec!["g1".to_string(), "g2".to_string()],
            vec!["S1".to_string(), "S2".to_string()],
        )
        .unwrap();
        assert!(matches!(
            median_of_ratios(&counts),
            Err(DeaError::Numerical(_))
        ));
    }

    #[test]
    fn test_normalized_means() {
        let counts = counts_with_depth_difference();
        let means = normalized_means(&counts, &[1.0, 2.0]).unwrap();
        assert_relative_eq!(means[0], 10.0, epsilon = 1e-9);
        assert_relative_eq!(means[1], 50.0, epsilon = 1e-9);
        assert_relative_eq!(means[2], 200.0, epsilon = 1e-9);
    }
}
