//! High-variance gene selection and principal component analysis.

mod hvg;
mod pca;

pub use hvg::{feature_variances, select_high_variance};
pub use pca::{run_pca, PcaConfig, PcaResult};
