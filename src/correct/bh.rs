//! Benjamini-Hochberg false discovery rate correction.

use crate::data::{DeResult, DeResultSet};
use crate::test::WaldResult;
use serde::{Deserialize, Serialize};

/// Result of BH correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BhCorrected {
    /// Gene IDs in original order.
    pub gene_ids: Vec<String>,
    /// Original p-values.
    pub p_values: Vec<f64>,
    /// Adjusted p-values (q-values).
    pub q_values: Vec<f64>,
    /// Number of tests.
    pub n_tests: usize,
}

impl BhCorrected {
    /// Q-value for a specific gene.
    pub fn get_qvalue(&self, gene_id: &str) -> Option<f64> {
        let idx = self.gene_ids.iter().position(|g| g == gene_id)?;
        self.q_values.get(idx).copied()
    }

    /// Count significant results at a threshold.
    pub fn n_significant(&self, alpha: f64) -> usize {
        self.q_values.iter().filter(|&&q| q < alpha).count()
    }
}

/// Apply Benjamini-Hochberg FDR correction.
///
/// Walking from the largest p-value down, each adjusted value is
/// p * n / rank clamped by the adjusted value above it, which keeps the
/// q-values monotone in p and bounded by 1.
pub fn correct_bh(p_values: &[f64], gene_ids: &[String]) -> BhCorrected {
    let n = p_values.len();
    if n == 0 {
        return BhCorrected {
            gene_ids: vec![],
            p_values: vec![],
            q_values: vec![],
            n_tests: 0,
        };
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        p_values[a]
            .partial_cmp(&p_values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut q_sorted = vec![0.0; n];
    q_sorted[n - 1] = p_values[order[n - 1]].min(1.0);
    for i in (0..n - 1).rev() {
        let rank = (i + 1) as f64;
        let adjusted = p_values[order[i]] * n as f64 / rank;
        q_sorted[i] = adjusted.min(q_sorted[i + 1]).min(1.0);
    }

    let mut q_values = vec![0.0; n];
    for (sorted_pos, &orig_idx) in order.iter().enumerate() {
        q_values[orig_idx] = q_sorted[sorted_pos];
    }

    BhCorrected {
        gene_ids: gene_ids.to_vec(),
        p_values: p_values.to_vec(),
        q_values,
        n_tests: n,
    }
}

/// Combine Wald statistics, BH q-values and per-gene mean expression into a
/// complete result set.
pub fn create_results(
    wald: &WaldResult,
    bh: &BhCorrected,
    base_means: &[f64],
    method: &str,
) -> DeResultSet {
    let results: Vec<DeResult> = wald
        .results
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let q_value = bh.q_values.get(i).copied().unwrap_or(f64::NAN);
            let base_mean = base_means.get(i).copied().unwrap_or(0.0);
            DeResult::new(
                w.gene_id.clone(),
                w.coefficient.clone(),
                base_mean,
                w.log2_fold_change,
                w.std_error,
                w.statistic,
                w.p_value,
                q_value,
            )
        })
        .collect();

    DeResultSet::new(method.to_string(), results)
}
