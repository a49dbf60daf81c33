//! Statistical hypothesis testing for differential expression.


pub use wald::{test_wald, WaldResult, WaldResultSingle};
