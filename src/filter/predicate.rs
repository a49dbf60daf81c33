//! Declarative sample filtering by metadata predicates.

use crate::data::AnnotatedMatrix;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Whether matching samples are kept or excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredicateAction {
    /// Keep only samples whose value matches.
    Keep,
    /// Drop samples whose value matches.
    Exclude,
}

/// A declarative predicate over one categorical metadata column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplePredicate {
    /// Metadata column to test.
    pub column: String,
    /// Values that count as a match.
    pub values: Vec<String>,
    /// Keep or exclude matching samples.
    pub action: PredicateAction,
}

impl SamplePredicate {
    /// Keep samples whose `column` value is one of `values`.
    pub fn keep(column: &str, values: &[&str]) -> Self {
        Self {
            column: column.to_string(),
            values: values.iter().map(|s| s.to_string()).collect(),
            action: PredicateAction::Keep,
        }
    }

    /// Exclude samples whose `column` value is one of `values`.
    pub fn exclude(column: &str, values: &[&str]) -> Self {
        Self {
            column: column.to_string(),
            values: values.iter().map(|s| s.to_string()).collect(),
            action: PredicateAction::Exclude,
        }
    }
}

/// Apply a sample predicate, returning a new AnnotatedMatrix.
///
/// Missing metadata values never match, so under `Keep` they are dropped and
/// under `Exclude` they are retained. A predicate matching nothing yields an
/// empty-but-valid artifact rather than an error; downstream modeling stages
/// are the ones that refuse empty input.
pub fn filter_samples(
    data: &AnnotatedMatrix,
    predicate: &SamplePredicate,
) -> Result<AnnotatedMatrix> {
    let values: Vec<&str> = predicate.values.iter().map(|s| s.as_str()).collect();
    let matching = data
        .samples()
        .sample_indices_where(&predicate.column, &values)?;

    let keep: Vec<usize> = match predicate.action {
        PredicateAction::Keep => matching,
        PredicateAction::Exclude => {
            let drop: std::collections::HashSet<usize> = matching.into_iter().collect();
            (0..data.n_samples()).filter(|i| !drop.contains(i)).collect()
        }
    };

    data.subset_samples(&keep)
}
