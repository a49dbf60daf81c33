//! Principal component analysis over transformed expression values.

use crate::error::{DeaError, Result};
use crate::transform::TransformedMatrix;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Configuration for PCA.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcaConfig {
    /// Maximum number of components to keep.
    pub n_components: usize,
    /// Scale each gene to unit variance after centering.
    pub scale: bool,
}

impl Default for PcaConfig {
    fn default() -> Self {
        Self {
            n_components: 10,
            scale: false,
        }
    }
}

/// Principal component scores and variance summary.
#[derive(Debug, Clone)]
pub struct PcaResult {
    /// Per-sample component scores (samples × components).
    pub scores: DMatrix<f64>,
    /// Sample identifiers (row order of `scores`).
    pub sample_ids: Vec<String>,
    /// Variance explained by each component, descending.
    pub explained_variance: Vec<f64>,
    /// Proportion of total variance explained by each component.
    pub proportion_variance: Vec<f64>,
    /// Number of components kept.
    pub n_components: usize,
}

impl PcaResult {
    /// Score of one sample on one component.
    pub fn score(&self, sample: usize, component: usize) -> f64 {
        self.scores[(sample, component)]
    }

    /// Cumulative proportion of variance explained by the first k components.
    pub fn cumulative_proportion(&self, k: usize) -> f64 {
        self.proportion_variance.iter().take(k).sum()
    }

    /// Write scores as a TSV table: one row per sample, one column per PC.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "sample_id")?;
        for c in 1..=self.n_components {
            write!(writer, "\tPC{}", c)?;
        }
        writeln!(writer)?;

        for (row, sample_id) in self.sample_ids.iter().enumerate() {
            write!(writer, "{}", sample_id)?;
            for col in 0..self.n_components {
                write!(writer, "\t{:.6}", self.scores[(row, col)])?;
            }
            writeln!(writer)?;
        }

        Ok(())
    }
}

/// Run PCA on a transformed matrix (genes × samples).
///
/// Genes are centered across samples, optionally scaled to unit variance,
/// and the per-sample scores of the leading components are computed via a
/// singular value decomposition. Components are ordered by descending
/// explained variance, and each component's sign is fixed by forcing its
/// largest-magnitude gene loading positive, so results are deterministic
/// for a given input and configuration.
pub fn run_pca(transformed: &TransformedMatrix, config: &PcaConfig) -> Result<PcaResult> {
    let n_genes = transformed.n_genes();
    let n_samples = transformed.n_samples();

    if n_genes == 0 || n_samples == 0 {
        return Err(DeaError::EmptyData(
            "Cannot run PCA on an empty matrix".to_string(),
        ));
    }
    if n_samples < 2 {
        return Err(DeaError::Numerical(
            "PCA requires at least two samples".to_string(),
        ));
    }
    if config.n_components == 0 {
        return Err(DeaError::InvalidParameter(
            "n_components must be at least 1".to_string(),
        ));
    }

    // Samples as rows, genes as columns.
    let mut x = transformed.matrix().transpose();

    // Center (and optionally scale) each gene column.
    for col in 0..n_genes {
        let mean = x.column(col).sum() / n_samples as f64;
        for row in 0..n_samples {
            x[(row, col)] -= mean;
        }
        if config.scale {
            let var = x.column(col).iter().map(|v| v * v).sum::<f64>() / (n_samples - 1) as f64;
            if var <= f64::EPSILON {
                return Err(DeaError::Numerical(format!(
                    "Gene '{}' has zero variance and cannot be scaled; filter it first",
                    transformed.gene_ids[col]
                )));
            }
            let sd = var.sqrt();
            for row in 0..n_samples {
                x[(row, col)] /= sd;
            }
        }
    }

    let svd = x.svd(true, true);
    let u = svd
        .u
        .as_ref()
        .ok_or_else(|| DeaError::Numerical("SVD did not produce U".to_string()))?;
    let v_t = svd
        .v_t
        .as_ref()
        .ok_or_else(|| DeaError::Numerical("SVD did not produce V^T".to_string()))?;
    let singular = &svd.singular_values;

    // Order components by singular value, largest first.
    let mut order: Vec<usize> = (0..singular.len()).collect();
    order.sort_by(|&a, &b| {
        singular[b]
            .partial_cmp(&singular[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let denom = (n_samples - 1) as f64;
    let total_variance: f64 = singular.iter().map(|s| s * s / denom).sum();

    // Centering leaves at most n_samples - 1 informative components.
    let k = config
        .n_components
        .min(n_samples - 1)
        .min(n_genes)
        .min(order.len());

    let mut scores = DMatrix::zeros(n_samples, k);
    let mut explained_variance = Vec::with_capacity(k);
    let mut proportion_variance = Vec::with_capacity(k);

    for (c, &idx) in order.iter().take(k).enumerate() {
        let sigma = singular[idx];

        // Sign convention: largest-magnitude loading positive.
        let mut max_abs = 0.0;
        let mut sign = 1.0;
        for j in 0..n_genes {
            let loading = v_t[(idx, j)];
            if loading.abs() > max_abs {
                max_abs = loading.abs();
                sign = if loading < 0.0 { -1.0 } else { 1.0 };
            }
        }

        for row in 0..n_samples {
            scores[(row, c)] = sign * u[(row, idx)] * sigma;
        }

        let ev = sigma * sigma / denom;
        explained_variance.push(ev);
        proportion_variance.push(if total_variance > 0.0 {
            ev / total_variance
        } else {
            0.0
        });
    }

    Ok(PcaResult {
        scores,
        sample_ids: transformed.sample_ids.clone(),
        explained_variance,
        proportion_variance,
        n_components: k,
    })
}
