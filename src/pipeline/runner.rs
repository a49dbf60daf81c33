//! Pipeline runner for composing and executing analysis steps.

use crate::correct::bh::{correct_bh, BhCorrected};
use crate::data::{AnnotatedMatrix, DeResultSet, DesignMatrix, Formula};
use crate::error::{DeaError, Result};
use crate::filter::{
    filter_low_expression, filter_min_count, filter_samples, filter_zero_variance,
    PredicateAction, SamplePredicate,
};
use crate::model::nb::{model_nb, NbFit};
use crate::model::size_factors::{median_of_ratios, normalized_means};
use crate::test::wald::{test_wald, WaldResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A step in the analysis pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineStep {
    // === Sample Filtering ===
    /// Keep or exclude samples by a categorical metadata value.
    FilterSamples {
        column: String,
        values: Vec<String>,
        action: PredicateAction,
    },
    /// Remap the levels of a categorical metadata column.
    RecodeVariable {
        column: String,
        mapping: HashMap<String, String>,
    },

    // === Gene Filtering ===
    /// Drop genes with identical counts in every sample.
    FilterZeroVariance,
    /// Drop genes detected in less than the given fraction of samples.
    FilterLowExpression { min_detection: f64 },
    /// Drop genes with a total count below the minimum.
    FilterMinCount { min_total: u64 },

    // === Model Fitting ===
    /// Fit the negative binomial model with size factor offsets.
    ModelNb {
        formula: String,
        #[serde(default)]
        reference_levels: HashMap<String, String>,
    },

    // === Testing ===
    /// Wald test for a coefficient.
    TestWald { coefficient: String },

    // === Multiple Testing Correction ===
    /// Benjamini-Hochberg correction.
    CorrectBh,
}

/// Pipeline configuration for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Name of the pipeline.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Steps to execute.
    pub steps: Vec<PipelineStep>,
}

impl PipelineConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(DeaError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(DeaError::from)
    }
}

/// Builder for constructing and running analysis pipelines.
#[derive(Debug, Clone)]
pub struct Pipeline {
    steps: Vec<PipelineStep>,
    name: String,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Create a new empty pipeline.
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            name: "unnamed".to_string(),
        }
    }

    /// Create from a config.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            steps: config.steps.clone(),
            name: config.name.clone(),
        }
    }

    /// Set the pipeline name.
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Keep or exclude samples by metadata value.
    pub fn filter_samples(
        mut self,
        column: &str,
        values: &[&str],
        action: PredicateAction,
    ) -> Self {
        self.steps.push(PipelineStep::FilterSamples {
            column: column.to_string(),
            values: values.iter().map(|s| s.to_string()).collect(),
            action,
        });
        self
    }

    /// Remap categorical levels in a metadata column.
    pub fn recode_variable(mut self, column: &str, mapping: HashMap<String, String>) -> Self {
        self.steps.push(PipelineStep::RecodeVariable {
            column: column.to_string(),
            mapping,
        });
        self
    }

    /// Drop zero-variance genes.
    pub fn filter_zero_variance(mut self) -> Self {
        self.steps.push(PipelineStep::FilterZeroVariance);
        self
    }

    /// Drop genes below a detection-rate threshold (boundary inclusive).
    pub fn filter_low_expression(mut self, min_detection: f64) -> Self {
        self.steps
            .push(PipelineStep::FilterLowExpression { min_detection });
        self
    }

    /// Drop genes below a total-count threshold.
    pub fn filter_min_count(mut self, min_total: u64) -> Self {
        self.steps.push(PipelineStep::FilterMinCount { min_total });
        self
    }

    /// Fit the negative binomial model.
    pub fn model_nb(mut self, formula: &str) -> Self {
        self.steps.push(PipelineStep::ModelNb {
            formula: formula.to_string(),
            reference_levels: HashMap::new(),
        });
        self
    }

    /// Fit the negative binomial model with an explicit reference level.
    pub fn model_nb_with_reference(mut self, formula: &str, variable: &str, level: &str) -> Self {
        let mut reference_levels = HashMap::new();
        reference_levels.insert(variable.to_string(), level.to_string());
        self.steps.push(PipelineStep::ModelNb {
            formula: formula.to_string(),
            reference_levels,
        });
        self
    }

    /// Add a Wald test.
    pub fn test_wald(mut self, coefficient: &str) -> Self {
        self.steps.push(PipelineStep::TestWald {
            coefficient: coefficient.to_string(),
        });
        self
    }

    /// Add BH correction.
    pub fn correct_bh(mut self) -> Self {
        self.steps.push(PipelineStep::CorrectBh);
        self
    }

    /// Convert to a config for serialization.
    pub fn to_config(&self, description: Option<&str>) -> PipelineConfig {
        PipelineConfig {
            name: self.name.clone(),
            description: description.map(String::from),
            steps: self.steps.clone(),
        }
    }

    /// Run the pipeline on an annotated matrix.
    pub fn run(&self, data: &AnnotatedMatrix) -> Result<DeResultSet> {
        let mut state = PipelineState::new(data.clone());

        for (i, step) in self.steps.iter().enumerate() {
            state = state.apply(step).map_err(|e| {
                DeaError::Pipeline(format!("Step {} ({:?}) failed: {}", i + 1, step, e))
            })?;
        }

        state.finalize(&self.name)
    }
}

/// Internal state during pipeline execution.
struct PipelineState {
    data: AnnotatedMatrix,
    base_means: Option<Vec<f64>>,
    nb_fit: Option<NbFit>,
    wald: Option<WaldResult>,
    bh: Option<BhCorrected>,
}

impl PipelineState {
    fn new(data: AnnotatedMatrix) -> Self {
        Self {
            data,
            base_means: None,
            nb_fit: None,
            wald: None,
            bh: None,
        }
    }

    fn apply(mut self, step: &PipelineStep) -> Result<Self> {
        match step {
            PipelineStep::FilterSamples {
                column,
                values,
                action,
            } => {
                let predicate = SamplePredicate {
                    column: column.clone(),
                    values: values.clone(),
                    action: *action,
                };
                self.data = filter_samples(&self.data, &predicate)?;
            }
            PipelineStep::RecodeVariable { column, mapping } => {
                let samples = self.data.samples().recode(column, mapping)?;
                self.data = self.data.with_samples(samples)?;
            }
            PipelineStep::FilterZeroVariance => {
                let (filtered, _) = filter_zero_variance(&self.data)?;
                self.data = filtered;
            }
            PipelineStep::FilterLowExpression { min_detection } => {
                let (filtered, _) = filter_low_expression(&self.data, *min_detection)?;
                self.data = filtered;
            }
            PipelineStep::FilterMinCount { min_total } => {
                let (filtered, _) = filter_min_count(&self.data, *min_total)?;
                self.data = filtered;
            }
            PipelineStep::ModelNb {
                formula,
                reference_levels,
            } => {
                let parsed = Formula::parse(formula)?;
                let design = DesignMatrix::from_formula_with_references(
                    self.data.samples(),
                    &parsed,
                    reference_levels,
                )?;
                let size_factors = median_of_ratios(self.data.counts())?;
                self.base_means = Some(normalized_means(self.data.counts(), &size_factors)?);
                self.nb_fit = Some(model_nb(self.data.counts(), &design, &size_factors)?);
            }
            PipelineStep::TestWald { coefficient } => {
                let fit = self.nb_fit.as_ref().ok_or_else(|| {
                    DeaError::Pipeline("TestWald requires a fitted model".to_string())
                })?;
                self.wald = Some(test_wald(fit, coefficient)?);
            }
            PipelineStep::CorrectBh => {
                let wald = self.wald.as_ref().ok_or_else(|| {
                    DeaError::Pipeline("CorrectBh requires test results".to_string())
                })?;
                self.bh = Some(correct_bh(&wald.p_values(), &wald.gene_ids()));
            }
        }
        Ok(self)
    }

    fn finalize(self, name: &str) -> Result<DeResultSet> {
        let wald = self.wald.ok_or_else(|| {
            DeaError::Pipeline("Pipeline produced no test results; add TestWald".to_string())
        })?;
        let bh = self.bh.ok_or_else(|| {
            DeaError::Pipeline("Pipeline has uncorrected p-values; add CorrectBh".to_string())
        })?;
        let base_means = self.base_means.unwrap_or_default();

        Ok(crate::correct::bh::create_results(
            &wald,
            &bh,
            &base_means,
            name,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_yaml_roundtrip() {
        let pipeline = Pipeline::new()
            .name("tumor-vs-normal")
            .filter_samples("tissue", &["normal", "tumor"], PredicateAction::Keep)
            .filter_zero_variance()
            .filter_low_expression(0.2)
            .model_nb("~ tissue")
            .test_wald("tissuetumor")
            .correct_bh();

        let config = pipeline.to_config(Some("standard two-group comparison"));
        let yaml = config.to_yaml().unwrap();
        let reloaded = PipelineConfig::from_yaml(&yaml).unwrap();

        assert_eq!(reloaded.name, "tumor-vs-normal");
        assert_eq!(reloaded.steps.len(), 6);
        assert!(matches!(
            reloaded.steps[0],
            PipelineStep::FilterSamples { .. }
        ));
    }

    #[test]
    fn test_wald_without_model_fails() {
        use crate::data::{AnnotatedMatrix, ExpressionMatrix, SampleMetadata};
        use std::io::Write;

        let config = PipelineConfig::from_yaml(
            "name: broken\ndescription: null\nsteps:\n  - !TestWald\n    coefficient: tissuetumor\n",
        )
        .unwrap();

        let counts = ExpressionMatrix::from_triplets(
            (1, 2),
            &[(0, 0, 3), (0, 1, 5)],
            vec!["g1".to_string()],
            vec!["S1".to_string(), "S2".to_string()],
        )
        .unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sample_id\ttissue").unwrap();
        writeln!(file, "S1\tnormal").unwrap();
        writeln!(file, "S2\ttumor").unwrap();
        file.flush().unwrap();
        let samples = SampleMetadata::from_tsv(file.path()).unwrap();
        let data = AnnotatedMatrix::from_counts_and_samples(counts, samples).unwrap();

        let err = Pipeline::from_config(&config).run(&data).unwrap_err();
        assert!(err.to_string().contains("fitted model"));
    }
}
