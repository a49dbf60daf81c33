//! Ranked gene lists for enrichment testing.

use crate::data::DeResultSet;
use serde::{Deserialize, Serialize};

/// A gene-to-score mapping sorted ascending by score.
///
/// The usual input to enrichment: significant genes scored by their log2
/// fold change, so the most down-regulated genes sit at the front and the
/// most up-regulated at the back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedList {
    gene_ids: Vec<String>,
    scores: Vec<f64>,
}

impl RankedList {
    /// Build from (gene, score) pairs; sorts ascending by score. Pairs with
    /// a NaN score are dropped.
    pub fn from_pairs(pairs: Vec<(String, f64)>) -> Self {
        let mut pairs: Vec<(String, f64)> =
            pairs.into_iter().filter(|(_, s)| !s.is_nan()).collect();
        pairs.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let (gene_ids, scores) = pairs.into_iter().unzip();
        Self { gene_ids, scores }
    }

    /// Rank the significant genes of a result set by log2 fold change.
    pub fn from_results(results: &DeResultSet, alpha: f64) -> Self {
        let pairs = results
            .iter()
            .filter(|r| r.is_significant_at(alpha))
            .map(|r| (r.gene_id.clone(), r.log2_fold_change))
            .collect();
        Self::from_pairs(pairs)
    }

    /// Number of ranked genes.
    pub fn len(&self) -> usize {
        self.gene_ids.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.gene_ids.is_empty()
    }

    /// Gene IDs in ascending score order.
    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    /// Scores in ascending order.
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    /// The score of the gene at a rank position.
    pub fn score_at(&self, position: usize) -> f64 {
        self.scores[position]
    }
}
