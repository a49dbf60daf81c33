//! Composable Differential Expression Analysis (DEA) Library
//!
//! This library provides modular primitives for differential expression
//! analysis of RNA-seq count data, from an annotated expression matrix
//! through filtering, transformation, dimensionality reduction, count-model
//! testing and gene set enrichment.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Core data structures (AnnotatedMatrix, ExpressionMatrix, metadata, results)
//! - **profile**: Data profiling (library size, sparsity)
//! - **filter**: Sample predicates and gene filtering (zero variance, low expression)
//! - **transform**: Value transforms (log2(x+1), CPM)
//! - **reduce**: High-variance gene selection and principal component analysis
//! - **model**: Size factors and the negative binomial count model
//! - **test**: Hypothesis testing (Wald test)
//! - **correct**: Multiple testing correction (Benjamini-Hochberg)
//! - **enrich**: Gene set collections and GSEA
//! - **pipeline**: Pipeline composition and execution
//!
//! # Example
//!
//! ```no_run
//! use composable_dea::prelude::*;
//!
//! // Load an annotated matrix from its three aligned tables
//! let data = AnnotatedMatrix::from_tsv_parts(
//!     "counts.tsv",
//!     "features.tsv",
//!     "samples.tsv",
//! ).unwrap();
//!
//! // Run a differential expression pipeline
//! let results = Pipeline::new()
//!     .filter_samples("tissue", &["normal", "tumor"], PredicateAction::Keep)
//!     .filter_zero_variance()
//!     .filter_low_expression(0.2)
//!     .model_nb("~ tissue")
//!     .test_wald("tissuetumor")
//!     .correct_bh()
//!     .run(&data)
//!     .unwrap();
//! ```

pub mod correct;
pub mod data;
pub mod enrich;
pub mod error;
pub mod filter;
pub mod model;
pub mod pipeline;
pub mod profile;
pub mod reduce;
pub mod test;
pub mod transform;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::correct::bh::{correct_bh, create_results, BhCorrected};
    pub use crate::data::{
        AnnotatedMatrix, DeResult, DeResultSet, DesignMatrix, ExpressionMatrix,
        FeatureAnnotations, Formula, SampleMetadata, Term, Variable,
    };
    pub use crate::enrich::{
        run_gsea, GeneSet, GeneSetCollection, GseaConfig, GseaResult, GseaResults, RankedList,
    };
    pub use crate::error::{DeaError, Result};
    pub use crate::filter::{
        filter_low_expression, filter_min_count, filter_samples, filter_zero_variance,
        FilterSummary, PredicateAction, SamplePredicate,
    };
    pub use crate::model::nb::{model_nb, NbFit};
    pub use crate::model::size_factors::{median_of_ratios, normalized_means};
    pub use crate::pipeline::{Pipeline, PipelineConfig, PipelineStep};
    pub use crate::profile::{
        profile_expression, profile_library_size, ExpressionProfile, LibrarySizeProfile,
    };
    pub use crate::reduce::{
        feature_variances, run_pca, select_high_variance, PcaConfig, PcaResult,
    };
    pub use crate::test::wald::{test_wald, WaldResult};
    pub use crate::transform::{cpm, log2p1, TransformedMatrix};
}
