//! Data structures for differential expression analysis.

mod annotated;
mod design;
mod expression_matrix;
mod features;
mod formula;
mod metadata;
mod result;

pub use annotated::AnnotatedMatrix;
pub use design::DesignMatrix;
pub use expression_matrix::ExpressionMatrix;
pub use features::FeatureAnnotations;
pub use formula::{Formula, Term};
pub use metadata::{SampleMetadata, Variable, VariableType};
pub use result::{DeResult, DeResultSet, ResultSummary, SIGNIFICANCE_ALPHA};
