//! Value transforms applied ahead of visualization and reduction.
//!
//! - **log2(x+1)**: variance-stabilizing transform for counts; maps zero to
//!   zero and is monotone.
//! - **CPM**: counts-per-million library size scaling, optionally log2(x+1)
//!   transformed.

mod cpm;
mod log;

pub use cpm::{cpm, cpm_log2};
pub use log::{log2p1, TransformedMatrix};
