//! Statistical models for count data.

pub mod nb;
pub mod size_factors;

pub use nb::{model_nb, NbFit, NbFitSingle};
pub use size_factors::{median_of_ratios, normalized_means};
