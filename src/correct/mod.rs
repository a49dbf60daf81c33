//! Multiple testing correction.

pub mod bh;

pub use bh::{correct_bh, create_results, BhCorrected};
