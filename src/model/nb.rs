//! Negative binomial GLM for count data.
//!
//! Per-gene negative binomial regression with a log link and per-sample
//! size factor offsets, the standard model for overdispersed RNA-seq
//! counts. Dispersion is estimated per gene by method of moments inside
//! the IRLS loop.

use crate::data::{DesignMatrix, ExpressionMatrix};
use crate::error::{DeaError, Result};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::function::gamma::ln_gamma;

/// Maximum IRLS iterations.
const MAX_ITER: usize = 50;

/// Convergence tolerance on the relative coefficient change.
const TOL: f64 = 1e-8;

/// Floor for fitted means, keeps the log link finite.
const MIN_MU: f64 = 1e-10;

/// Fit of the negative binomial model to a single gene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbFitSingle {
    /// Gene identifier.
    pub gene_id: String,
    /// Estimated coefficients (natural log scale).
    pub coefficients: Vec<f64>,
    /// Standard errors of the coefficients.
    pub std_errors: Vec<f64>,
    /// Estimated dispersion parameter (theta); variance = mu + mu^2/theta.
    pub dispersion: f64,
    /// Log-likelihood at convergence.
    pub log_likelihood: f64,
    /// Residual degrees of freedom.
    pub df_residual: usize,
    /// Iterations used.
    pub iterations: usize,
    /// Whether the fit converged.
    pub converged: bool,
    /// Fitted means.
    #[serde(skip)]
    pub fitted_values: Vec<f64>,
}

/// Fits of the negative binomial model across all genes.
#[derive(Debug, Clone)]
pub struct NbFit {
    /// Per-gene fits, in matrix row order.
    pub fits: Vec<NbFitSingle>,
    /// Coefficient names from the design matrix.
    pub coefficient_names: Vec<String>,
    /// Number of samples.
    pub n_samples: usize,
}

impl NbFit {
    /// Get the fit for a specific gene by ID.
    pub fn get_gene(&self, gene_id: &str) -> Option<&NbFitSingle> {
        self.fits.iter().find(|f| f.gene_id == gene_id)
    }

    /// Index of a coefficient by name.
    pub fn coefficient_index(&self, name: &str) -> Option<usize> {
        self.coefficient_names.iter().position(|n| n == name)
    }

    /// Number of genes.
    pub fn n_genes(&self) -> usize {
        self.fits.len()
    }

    /// Count of converged fits.
    pub fn n_converged(&self) -> usize {
        self.fits.iter().filter(|f| f.converged).count()
    }

    /// Check if all fits converged.
    pub fn all_converged(&self) -> bool {
        self.fits.iter().all(|f| f.converged)
    }
}

/// Fit the negative binomial GLM to every gene.
///
/// `size_factors` enter as log offsets, so coefficients describe normalized
/// expression. Genes with zero counts in every sample have no estimable
/// mean and produce an error naming the gene; such genes must be removed by
/// the filtering stage first.
pub fn model_nb(
    counts: &ExpressionMatrix,
    design: &DesignMatrix,
    size_factors: &[f64],
) -> Result<NbFit> {
    let n_genes = counts.n_genes();
    let n_samples = counts.n_samples();
    let n_coef = design.n_coefficients();

    if n_genes == 0 {
        return Err(DeaError::EmptyData(
            "Cannot fit a model to zero genes".to_string(),
        ));
    }
    if design.n_samples() != n_samples {
        return Err(DeaError::DimensionMismatch {
            expected: n_samples,
            actual: design.n_samples(),
        });
    }
    if size_factors.len() != n_samples {
        return Err(DeaError::DimensionMismatch {
            expected: n_samples,
            actual: size_factors.len(),
        });
    }
    if size_factors.iter().any(|&s| !(s > 0.0)) {
        return Err(DeaError::InvalidParameter(
            "Size factors must be positive".to_string(),
        ));
    }

    let df_residual = n_samples.saturating_sub(n_coef);
    if df_residual == 0 {
        return Err(DeaError::Numerical(
            "Model is saturated (n_samples <= n_coefficients)".to_string(),
        ));
    }

    // Degenerate genes fail loudly instead of producing misleading estimates.
    for row in 0..n_genes {
        if counts.detection_count(row) == 0 {
            return Err(DeaError::Numerical(format!(
                "Gene '{}' has zero counts in every sample; filter it before modeling",
                counts.gene_ids()[row]
            )));
        }
    }

    let x = design.matrix();
    let offsets: Vec<f64> = size_factors.iter().map(|s| s.ln()).collect();

    let fits: Vec<NbFitSingle> = (0..n_genes)
        .into_par_iter()
        .map(|row| {
            let y: Vec<f64> = (0..n_samples).map(|col| counts.get(row, col) as f64).collect();
            fit_single(&y, &counts.gene_ids()[row], x, &offsets, df_residual)
        })
        .collect();

    Ok(NbFit {
        fits,
        coefficient_names: design.coefficient_names().to_vec(),
        n_samples,
    })
}

/// One IRLS fit.
fn fit_single(
    y: &[f64],
    gene_id: &str,
    x: &DMatrix<f64>,
    offsets: &[f64],
    df_residual: usize,
) -> NbFitSingle {
    let n_samples = y.len();
    let n_coef = x.ncols();
    let y_vec = DVector::from_column_slice(y);

    // Start from an intercept at the mean of offset-corrected counts.
    let mut beta = DVector::zeros(n_coef);
    let norm_mean = y
        .iter()
        .zip(offsets)
        .map(|(&yi, &o)| yi / o.exp())
        .sum::<f64>()
        / n_samples as f64;
    beta[0] = norm_mean.max(MIN_MU).ln();

    let mut mu = fitted_means(x, &beta, offsets);
    let mut theta = dispersion_mom(&y_vec, &mu);

    let mut converged = false;
    let mut iterations = 0;

    for iter in 0..MAX_ITER {
        iterations = iter + 1;

        // IRLS weights and working response on the linear predictor scale,
        // with the offset subtracted so beta alone is regressed.
        let mut xw = x.clone();
        let mut zw = DVector::zeros(n_samples);
        for i in 0..n_samples {
            let m = mu[i].max(MIN_MU);
            let w = m / (1.0 + m / theta);
            let w_sqrt = w.sqrt();
            let working = (m.ln() - offsets[i]) + (y_vec[i] - m) / m;
            for j in 0..n_coef {
                xw[(i, j)] *= w_sqrt;
            }
            zw[i] = working * w_sqrt;
        }

        let xtwx = xw.transpose() * &xw;
        let xtwz = xw.transpose() * &zw;
        let beta_new = match xtwx.try_inverse() {
            Some(inv) => inv * xtwz,
            None => {
                return NbFitSingle {
                    gene_id: gene_id.to_string(),
                    coefficients: beta.iter().cloned().collect(),
                    std_errors: vec![f64::NAN; n_coef],
                    dispersion: theta,
                    log_likelihood: f64::NAN,
                    df_residual,
                    iterations,
                    converged: false,
                    fitted_values: mu.iter().cloned().collect(),
                };
            }
        };

        let delta: f64 = (&beta_new - &beta).iter().map(|d| d.abs()).sum();
        let scale: f64 = beta.iter().map(|b| b.abs()).sum::<f64>().max(1.0);

        beta = beta_new;
        mu = fitted_means(x, &beta, offsets);
        theta = dispersion_mom(&y_vec, &mu);

        if delta / scale < TOL {
            converged = true;
            break;
        }
    }

    // Standard errors from the Fisher information at the final weights.
    let mut xw = x.clone();
    for i in 0..n_samples {
        let m = mu[i].max(MIN_MU);
        let w_sqrt = (m / (1.0 + m / theta)).sqrt();
        for j in 0..n_coef {
            xw[(i, j)] *= w_sqrt;
        }
    }
    let fisher = xw.transpose() * &xw;
    let std_errors: Vec<f64> = match fisher.try_inverse() {
        Some(inv) => (0..n_coef).map(|j| inv[(j, j)].max(0.0).sqrt()).collect(),
        None => vec![f64::NAN; n_coef],
    };

    NbFitSingle {
        gene_id: gene_id.to_string(),
        coefficients: beta.iter().cloned().collect(),
        std_errors,
        dispersion: theta,
        log_likelihood: nb_log_likelihood(&y_vec, &mu, theta),
        df_residual,
        iterations,
        converged,
        fitted_values: mu.iter().cloned().collect(),
    }
}

/// mu = exp(X beta + offset).
fn fitted_means(x: &DMatrix<f64>, beta: &DVector<f64>, offsets: &[f64]) -> DVector<f64> {
    let eta = x * beta;
    DVector::from_iterator(
        eta.len(),
        eta.iter()
            .zip(offsets)
            .map(|(e, o)| (e + o).exp().max(MIN_MU)),
    )
}

/// Method-of-moments dispersion from the Pearson chi-squared excess.
fn dispersion_mom(y: &DVector<f64>, mu: &DVector<f64>) -> f64 {
    let n = y.len() as f64;
    let chi_sq: f64 = y
        .iter()
        .zip(mu.iter())
        .map(|(&yi, &mi)| {
            let m = mi.max(MIN_MU);
            (yi - m) * (yi - m) / m
        })
        .sum();

    let excess = chi_sq - n;
    if excess > 0.0 {
        n / excess
    } else {
        // no overdispersion detected; effectively Poisson
        1e6
    }
}

fn nb_log_likelihood(y: &DVector<f64>, mu: &DVector<f64>, theta: f64) -> f64 {
    y.iter()
        .zip(mu.iter())
        .map(|(&yi, &mi)| {
            let m = mi.max(MIN_MU);
            ln_gamma(yi + theta) - ln_gamma(theta) - ln_gamma(yi + 1.0)
                + theta * (theta / (theta + m)).ln()
                + yi * (m / (theta + m)).ln()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Formula, SampleMetadata};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_counts() -> ExpressionMatrix {
        // 2 genes × 8 samples, alternating normal/tumor
        // flat: ~100 everywhere; induced: ~50 in normal, ~200 in tumor
        let values: [[u64; 8]; 2] = [
            [95, 105, 98, 102, 97, 103, 99, 101],
            [48, 195, 52, 205, 47, 198, 53, 202],
        ];
        let mut triplets = Vec::new();
        for (row, row_vals) in values.iter().enumerate() {
            for (col, &v) in row_vals.iter().enumerate() {
                triplets.push((row, col, v));
            }
        }
        ExpressionMatrix::from_triplets(
            (2, 8),
            &triplets,
            vec!["flat".to_string(), "induced".to_string()],
            (1..=8).map(|i| format!("S{}", i)).collect(),
        )
        .unwrap()
    }

    fn create_test_design() -> DesignMatrix {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample_id\ttissue").unwrap();
        for i in 1..=8 {
            let tissue = if i % 2 == 1 { "normal" } else { "tumor" };
            writeln!(file, "S{}\t{}", i, tissue).unwrap();
        }
        file.flush().unwrap();
        let meta = SampleMetadata::from_tsv(file.path()).unwrap();
        let formula = Formula::parse("~ tissue").unwrap();
        DesignMatrix::from_formula(&meta, &formula).unwrap()
    }

    fn unit_factors(n: usize) -> Vec<f64> {
        vec![1.0; n]
    }

    #[test]
    fn test_fit_basics() {
        let counts = create_test_counts();
        let design = create_test_design();
        let fit = model_nb(&counts, &design, &unit_factors(8)).unwrap();

        assert_eq!(fit.n_genes(), 2);
        assert_eq!(fit.coefficient_names, vec!["(Intercept)", "tissuetumor"]);
        assert!(fit.all_converged());
    }

    #[test]
    fn test_effect_direction_and_size() {
        let counts = create_test_counts();
        let design = create_test_design();
        let fit = model_nb(&counts, &design, &unit_factors(8)).unwrap();

        let flat = fit.get_gene("flat").unwrap();
        assert!(
            flat.coefficients[1].abs() < 0.2,
            "flat gene should have near-zero effect, got {}",
            flat.coefficients[1]
        );

        // ln(200/50) ~ 1.39
        let induced = fit.get_gene("induced").unwrap();
        assert!(
            induced.coefficients[1] > 1.0,
            "induced gene should have a large positive effect, got {}",
            induced.coefficients[1]
        );
    }

    #[test]
    fn test_std_errors_finite() {
        let counts = create_test_counts();
        let design = create_test_design();
        let fit = model_nb(&counts, &design, &unit_factors(8)).unwrap();

        for f in &fit.fits {
            for &se in &f.std_errors {
                assert!(se > 0.0 && se.is_finite());
            }
            assert!(f.dispersion > 0.0);
        }
    }

    #[test]
    fn test_size_factor_offsets_absorb_depth() {
        let counts = create_test_counts();
        let design = create_test_design();

        // Doubling every sample's size factor shifts the intercept, not the contrast.
        let fit_unit = model_nb(&counts, &design, &unit_factors(8)).unwrap();
        let fit_double = model_nb(&counts, &design, &vec![2.0; 8]).unwrap();

        let a = fit_unit.get_gene("induced").unwrap().coefficients[1];
        let b = fit_double.get_gene("induced").unwrap().coefficients[1];
        assert!((a - b).abs() < 1e-6, "contrast changed: {} vs {}", a, b);
    }

    #[test]
    fn test_all_zero_gene_rejected() {
        let triplets = vec![(0, 0, 5), (0, 1, 8), (0, 2, 6), (0, 3, 9)];
        let counts = ExpressionMatrix::from_triplets(
            (2, 4),
            &triplets,
            vec!["ok".to_string(), "silent".to_string()],
            (1..=4).map(|i| format!("S{}", i)).collect(),
        )
        .unwrap();

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample_id\ttissue").unwrap();
        writeln!(file, "S1\tnormal").unwrap();
        writeln!(file, "S2\ttumor").unwrap();
        writeln!(file, "S3\tnormal").unwrap();
        writeln!(file, "S4\ttumor").unwrap();
        file.flush().unwrap();
        let meta = SampleMetadata::from_tsv(file.path()).unwrap();
        let design =
            DesignMatrix::from_formula(&meta, &Formula::parse("~ tissue").unwrap()).unwrap();

        let err = model_nb(&counts, &design, &unit_factors(4)).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("silent"), "unexpected error: {}", message);
    }

    #[test]
    fn test_empty_input_rejected() {
        let counts = ExpressionMatrix::from_triplets(
            (0, 4),
            &[],
            vec![],
            (1..=4).map(|i| format!("S{}", i)).collect(),
        )
        .unwrap();
        let design = create_test_design();
        // design has 8 samples, counts 4: dimension error either way; the
        // empty-genes case must not panic.
        assert!(model_nb(&counts, &design, &unit_factors(4)).is_err());
    }

    #[test]
    fn test_saturated_model_rejected() {
        let triplets = vec![(0, 0, 5), (0, 1, 8)];
        let counts = ExpressionMatrix::from_triplets(
            (1, 2),
            &triplets,
            vec!["g".to_string()],
            vec!["S1".to_string(), "S2".to_string()],
        )
        .unwrap();

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample_id\ttissue").unwrap();
        writeln!(file, "S1\tnormal").unwrap();
        writeln!(file, "S2\ttumor").unwrap();
        file.flush().unwrap();
        let meta = SampleMetadata::from_tsv(file.path()).unwrap();
        let design =
            DesignMatrix::from_formula(&meta, &Formula::parse("~ tissue").unwrap()).unwrap();

        assert!(model_nb(&counts, &design, &unit_factors(2)).is_err());
    }
}
