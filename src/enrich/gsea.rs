//! Gene set enrichment analysis over a ranked list.
//!
//! The enrichment score is the weighted Kolmogorov-Smirnov running-sum
//! statistic: walking the ranking from the highest score down, hits in the
//! set push the sum up in proportion to |score|^weight, misses push it
//! down uniformly, and the score is the largest signed deviation from
//! zero. Significance comes from permuting gene labels.

use crate::correct::bh::correct_bh;
use crate::enrich::{GeneSetCollection, RankedList};
use crate::error::{DeaError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Configuration for GSEA.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GseaConfig {
    /// Number of label permutations per set.
    pub n_permutations: usize,
    /// Random seed for reproducibility.
    pub seed: u64,
    /// Exponent on |score| for hit increments (1.0 = classic weighted ES).
    pub weight: f64,
    /// Sets with fewer overlapping genes than this are skipped.
    pub min_size: usize,
}

impl Default for GseaConfig {
    fn default() -> Self {
        Self {
            n_permutations: 1000,
            seed: 42,
            weight: 1.0,
            min_size: 2,
        }
    }
}

impl GseaConfig {
    /// Fewer permutations, for quick exploratory runs.
    pub fn quick() -> Self {
        Self {
            n_permutations: 100,
            ..Default::default()
        }
    }
}

/// Enrichment result for a single gene set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GseaResult {
    /// Gene set name.
    pub set_name: String,
    /// Enrichment score; NaN when the set is degenerate for this ranking.
    pub es: f64,
    /// Permutation p-value.
    pub p_value: f64,
    /// BH-adjusted p-value across all tested sets.
    pub q_value: f64,
    /// Number of set members present in the ranked list.
    pub n_overlap: usize,
    /// Permutations with |ES| at least as extreme as observed.
    pub n_extreme: usize,
}

impl GseaResult {
    fn degenerate(set_name: String, n_overlap: usize) -> Self {
        Self {
            set_name,
            es: f64::NAN,
            p_value: 1.0,
            q_value: 1.0,
            n_overlap,
            n_extreme: 0,
        }
    }
}

/// Enrichment results across a collection, ordered by ascending p-value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GseaResults {
    /// Per-set results, sorted by p-value.
    pub results: Vec<GseaResult>,
    /// Configuration used.
    pub config: GseaConfig,
    /// Size of the ranked universe.
    pub n_ranked: usize,
}

impl GseaResults {
    /// Number of sets tested.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Result for one set.
    pub fn get_set(&self, name: &str) -> Option<&GseaResult> {
        self.results.iter().find(|r| r.set_name == name)
    }

    /// Sets significant at a q-value threshold.
    pub fn significant(&self, alpha: f64) -> Vec<&GseaResult> {
        self.results.iter().filter(|r| r.q_value < alpha).collect()
    }

    /// Write results as a TSV table.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "set_name\tes\tp_value\tq_value\tn_overlap")?;
        for r in &self.results {
            writeln!(
                writer,
                "{}\t{:.4}\t{:.4e}\t{:.4e}\t{}",
                r.set_name, r.es, r.p_value, r.q_value, r.n_overlap
            )?;
        }
        Ok(())
    }
}

impl std::fmt::Display for GseaResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "GSEA: {} sets against {} ranked genes ({} permutations)",
            self.len(),
            self.n_ranked,
            self.config.n_permutations
        )?;
        for r in self.results.iter().take(10) {
            writeln!(
                f,
                "  {:<40} ES={:>7.3} p={:.3e} q={:.3e} ({} genes)",
                r.set_name, r.es, r.p_value, r.q_value, r.n_overlap
            )?;
        }
        Ok(())
    }
}

/// xorshift64 generator; deterministic permutations without an RNG crate.
struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        // avoid the all-zero fixed point
        Self {
            state: seed.max(1),
        }
    }

    fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Choose `k` distinct positions out of `n` via a partial Fisher-Yates.
    fn sample_positions(&mut self, n: usize, k: usize, scratch: &mut Vec<usize>) {
        scratch.clear();
        scratch.extend(0..n);
        for i in 0..k.min(n) {
            let j = i + (self.next_u64() as usize) % (n - i);
            scratch.swap(i, j);
        }
        scratch.truncate(k.min(n));
    }
}

/// Run GSEA for every set in the collection.
///
/// Sets whose intersection with the ranked universe is smaller than
/// `min_size` (including the empty intersection) score as degenerate:
/// `es = NaN`, `p = 1.0`. They are reported, not dropped, and never abort
/// the stage.
pub fn run_gsea(
    ranked: &RankedList,
    collection: &GeneSetCollection,
    config: &GseaConfig,
) -> Result<GseaResults> {
    if config.n_permutations == 0 {
        return Err(DeaError::InvalidParameter(
            "n_permutations must be at least 1".to_string(),
        ));
    }
    if collection.is_empty() {
        return Err(DeaError::EmptyData("Gene set collection is empty".to_string()));
    }

    let n = ranked.len();
    // Scores walked from the highest to the lowest.
    let descending: Vec<f64> = ranked.scores().iter().rev().cloned().collect();
    let positions: std::collections::HashMap<&str, usize> = ranked
        .gene_ids()
        .iter()
        .rev()
        .enumerate()
        .map(|(pos, gene)| (gene.as_str(), pos))
        .collect();

    let mut results: Vec<GseaResult> = collection
        .iter()
        .enumerate()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|(set_idx, set)| {
            let hits: Vec<usize> = set
                .genes
                .iter()
                .filter_map(|g| positions.get(g.as_str()).copied())
                .collect();
            let n_overlap = hits.len();

            if n_overlap < config.min_size.max(1) || n_overlap == n {
                return GseaResult::degenerate(set.name.clone(), n_overlap);
            }

            let hit_set: HashSet<usize> = hits.iter().copied().collect();
            let observed = enrichment_score(&descending, &hit_set, config.weight);

            let mut rng = SimpleRng::new(config.seed.wrapping_add(set_idx as u64));
            let mut scratch = Vec::with_capacity(n);
            let mut n_extreme = 0usize;
            for _ in 0..config.n_permutations {
                rng.sample_positions(n, n_overlap, &mut scratch);
                let null_hits: HashSet<usize> = scratch.iter().copied().collect();
                let null_es = enrichment_score(&descending, &null_hits, config.weight);
                if null_es.abs() >= observed.abs() {
                    n_extreme += 1;
                }
            }

            let p_value = (1 + n_extreme) as f64 / (config.n_permutations + 1) as f64;
            GseaResult {
                set_name: set.name.clone(),
                es: observed,
                p_value,
                q_value: f64::NAN,
                n_overlap,
                n_extreme,
            }
        })
        .collect();

    // BH across all tested sets, then order by ascending p.
    let p_values: Vec<f64> = results.iter().map(|r| r.p_value).collect();
    let names: Vec<String> = results.iter().map(|r| r.set_name.clone()).collect();
    let corrected = correct_bh(&p_values, &names);
    for (r, &q) in results.iter_mut().zip(corrected.q_values.iter()) {
        r.q_value = q;
    }
    results.sort_by(|a, b| {
        a.p_value
            .partial_cmp(&b.p_value)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(GseaResults {
        results,
        config: config.clone(),
        n_ranked: n,
    })
}

/// Weighted KS running-sum enrichment score.
///
/// `descending` holds the scores from the highest-ranked gene down;
/// `hits` indexes into that ordering.
fn enrichment_score(descending: &[f64], hits: &HashSet<usize>, weight: f64) -> f64 {
    let n = descending.len();
    let n_hits = hits.len();
    if n_hits == 0 || n_hits >= n {
        return f64::NAN;
    }

    let hit_norm: f64 = hits
        .iter()
        .map(|&i| descending[i].abs().powf(weight))
        .sum();
    let miss_step = 1.0 / (n - n_hits) as f64;

    let mut running = 0.0;
    let mut max_deviation: f64 = 0.0;
    for (i, score) in descending.iter().enumerate() {
        if hits.contains(&i) {
            if hit_norm > 0.0 {
                running += score.abs().powf(weight) / hit_norm;
            } else {
                // all member scores are exactly zero; spread hits uniformly
                running += 1.0 / n_hits as f64;
            }
        } else {
            running -= miss_step;
        }
        if running.abs() > max_deviation.abs() {
            max_deviation = running;
        }
    }

    max_deviation
}
