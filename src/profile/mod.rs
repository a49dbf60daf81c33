//! Data profiling: library sizes and matrix sparsity.

use crate::data::ExpressionMatrix;
use serde::{Deserialize, Serialize};

/// Per-sample sequencing depth summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibrarySizeProfile {
    /// Total counts per sample, in column order.
    pub totals: Vec<u64>,
    pub min: u64,
    pub median: f64,
    pub max: u64,
    pub mean: f64,
}

/// Profile sequencing depth across samples.
pub fn profile_library_size(counts: &ExpressionMatrix) -> LibrarySizeProfile {
    let totals = counts.col_sums();
    if totals.is_empty() {
        return LibrarySizeProfile {
            totals,
            min: 0,
            median: 0.0,
            max: 0,
            mean: 0.0,
        };
    }

    let mut sorted = totals.clone();
    sorted.sort_unstable();
    let n = sorted.len();
    let median = if n % 2 == 1 {
        sorted[n / 2] as f64
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) as f64 / 2.0
    };
    let mean = totals.iter().sum::<u64>() as f64 / n as f64;

    LibrarySizeProfile {
        min: sorted[0],
        max: sorted[n - 1],
        median,
        mean,
        totals,
    }
}

impl std::fmt::Display for LibrarySizeProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Library Size Profile")?;
        writeln!(f, "  Samples: {}", self.totals.len())?;
        writeln!(f, "  Min:     {}", self.min)?;
        writeln!(f, "  Median:  {:.1}", self.median)?;
        writeln!(f, "  Mean:    {:.1}", self.mean)?;
        writeln!(f, "  Max:     {}", self.max)?;
        Ok(())
    }
}

/// Matrix-level expression summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionProfile {
    pub n_genes: usize,
    pub n_samples: usize,
    /// Fraction of matrix entries that are zero.
    pub sparsity: f64,
    /// Fraction of genes with zero counts in every sample.
    pub fraction_silent_genes: f64,
    /// Median per-gene detection rate.
    pub median_detection: f64,
}

/// Profile sparsity and detection across the matrix.
pub fn profile_expression(counts: &ExpressionMatrix) -> ExpressionProfile {
    let n_genes = counts.n_genes();
    let n_samples = counts.n_samples();
    let cells = n_genes * n_samples;

    let sparsity = if cells == 0 {
        0.0
    } else {
        1.0 - counts.nnz() as f64 / cells as f64
    };

    let mut detections: Vec<f64> = (0..n_genes)
        .map(|row| {
            if n_samples == 0 {
                0.0
            } else {
                counts.detection_count(row) as f64 / n_samples as f64
            }
        })
        .collect();
    let n_silent = detections.iter().filter(|&&d| d == 0.0).count();

    detections.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median_detection = if detections.is_empty() {
        0.0
    } else if detections.len() % 2 == 1 {
        detections[detections.len() / 2]
    } else {
        (detections[detections.len() / 2 - 1] + detections[detections.len() / 2]) / 2.0
    };

    ExpressionProfile {
        n_genes,
        n_samples,
        sparsity,
        fraction_silent_genes: if n_genes == 0 {
            0.0
        } else {
            n_silent as f64 / n_genes as f64
        },
        median_detection,
    }
}

impl std::fmt::Display for ExpressionProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Expression Profile")?;
        writeln!(f, "  Genes:            {}", self.n_genes)?;
        writeln!(f, "  Samples:          {}", self.n_samples)?;
        writeln!(f, "  Sparsity:         {:.1}%", self.sparsity * 100.0)?;
        writeln!(
            f,
            "  Silent genes:     {:.1}%",
            self.fraction_silent_genes * 100.0
        )?;
        writeln!(
            f,
            "  Median detection: {:.1}%",
            self.median_detection * 100.0
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn counts() -> ExpressionMatrix {
        let triplets = vec![(0, 0, 10), (0, 1, 30), (1, 0, 60)];
        ExpressionMatrix::from_triplets(
            (3, 2),
            &triplets,
            vec!["g1".to_string(), "g2".to_string(), "g3".to_string()],
            vec!["S1".to_string(), "S2".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_library_size() {
        let profile = profile_library_size(&counts());
        assert_eq!(profile.totals, vec![70, 30]);
        assert_eq!(profile.min, 30);
        assert_eq!(profile.max, 70);
        assert_relative_eq!(profile.median, 50.0, epsilon = 1e-12);
    }

    #[test]
    fn test_expression_profile() {
        let profile = profile_expression(&counts());
        assert_eq!(profile.n_genes, 3);
        // 3 of 6 cells populated
        assert_relative_eq!(profile.sparsity, 0.5, epsilon = 1e-12);
        // g3 is silent
        assert_relative_eq!(profile.fraction_silent_genes, 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(profile.median_detection, 0.5, epsilon = 1e-12);
    }
}
