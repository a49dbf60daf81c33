//! Design matrix construction from sample metadata and a formula.

use crate::data::{Formula, SampleMetadata, Term, Variable, VariableType};
use crate::error::{DeaError, Result};
use nalgebra::DMatrix;
use std::collections::HashMap;

/// A design matrix for model fitting.
///
/// Categorical variables are dummy-coded against a reference level; with an
/// intercept present the reference level's column is omitted, so each
/// remaining coefficient is the contrast of that level against the
/// reference.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    /// The design matrix (samples × coefficients).
    matrix: DMatrix<f64>,
    /// Names of the coefficients (columns).
    coefficient_names: Vec<String>,
    /// Sample IDs (rows).
    sample_ids: Vec<String>,
    /// Reference levels actually used for categorical variables.
    reference_levels: HashMap<String, String>,
}

impl DesignMatrix {
    /// Build a design matrix from metadata and a formula, with the default
    /// reference level (alphabetically first) for every categorical variable.
    pub fn from_formula(metadata: &SampleMetadata, formula: &Formula) -> Result<Self> {
        Self::from_formula_with_references(metadata, formula, &HashMap::new())
    }

    /// Build a design matrix with explicit reference levels for some or all
    /// categorical variables. Variables absent from `references` fall back
    /// to the alphabetically first level.
    pub fn from_formula_with_references(
        metadata: &SampleMetadata,
        formula: &Formula,
        references: &HashMap<String, String>,
    ) -> Result<Self> {
        let sample_ids = metadata.sample_ids().to_vec();
        let n_samples = sample_ids.len();
        if n_samples == 0 {
            return Err(DeaError::EmptyData(
                "Cannot build a design matrix with no samples".to_string(),
            ));
        }

        for var in formula.variables() {
            if !metadata.has_column(var) {
                return Err(DeaError::MissingColumn(var.to_string()));
            }
        }

        // Resolve the reference level of each categorical variable.
        let mut reference_levels = HashMap::new();
        for var in formula.variables() {
            if metadata.column_type(var) == Some(VariableType::Categorical) {
                let levels = metadata.levels(var)?;
                if levels.is_empty() {
                    return Err(DeaError::EmptyData(format!(
                        "Column '{}' has no observed levels",
                        var
                    )));
                }
                let reference = match references.get(var) {
                    Some(level) => {
                        if !levels.contains(level) {
                            return Err(DeaError::InvalidParameter(format!(
                                "Reference level '{}' not found for variable '{}' (levels: {:?})",
                                level, var, levels
                            )));
                        }
                        level.clone()
                    }
                    None => levels[0].clone(),
                };
                reference_levels.insert(var.to_string(), reference);
            }
        }

        let mut coefficient_names = Vec::new();
        let mut columns: Vec<Vec<f64>> = Vec::new();

        if formula.intercept {
            coefficient_names.push("(Intercept)".to_string());
            columns.push(vec![1.0; n_samples]);
        }

        for term in &formula.terms {
            let var_name = match term {
                Term::Intercept => continue,
                Term::Main(v) => v,
            };
            let values = metadata.column(var_name)?;

            match metadata.column_type(var_name) {
                Some(VariableType::Continuous) | Some(VariableType::Ordinal) => {
                    coefficient_names.push(var_name.clone());
                    columns.push(numeric_column(&values));
                }
                Some(VariableType::Categorical) | None => {
                    let levels = metadata.levels(var_name)?;
                    let reference = reference_levels.get(var_name);

                    for level in &levels {
                        // With an intercept, the reference level is absorbed.
                        if formula.intercept && Some(level) == reference {
                            continue;
                        }
                        coefficient_names.push(format!("{}{}", var_name, level));
                        columns.push(indicator_column(&values, level));
                    }
                }
            }
        }

        let n_coef = columns.len();
        let mut matrix = DMatrix::zeros(n_samples, n_coef);
        for (col_idx, col) in columns.iter().enumerate() {
            for (row_idx, &val) in col.iter().enumerate() {
                matrix[(row_idx, col_idx)] = val;
            }
        }

        Ok(Self {
            matrix,
            coefficient_names,
            sample_ids,
            reference_levels,
        })
    }

    /// Get the design matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Get coefficient names.
    pub fn coefficient_names(&self) -> &[String] {
        &self.coefficient_names
    }

    /// Get sample IDs.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Number of samples (rows).
    pub fn n_samples(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of coefficients (columns).
    pub fn n_coefficients(&self) -> usize {
        self.matrix.ncols()
    }

    /// The reference level used for a categorical variable.
    pub fn reference_level(&self, variable: &str) -> Option<&str> {
        self.reference_levels.get(variable).map(|s| s.as_str())
    }

    /// Index of a coefficient by name.
    pub fn coefficient_index(&self, name: &str) -> Option<usize> {
        self.coefficient_names.iter().position(|n| n == name)
    }

    /// Check if the matrix has an intercept.
    pub fn has_intercept(&self) -> bool {
        self.coefficient_names.first().map(|s| s.as_str()) == Some("(Intercept)")
    }
}

fn numeric_column(values: &[&Variable]) -> Vec<f64> {
    values
        .iter()
        .map(|v| match v {
            Variable::Continuous(x) => *x,
            Variable::Ordinal(x) => *x as f64,
            _ => 0.0,
        })
        .collect()
}

fn indicator_column(values: &[&Variable], level: &str) -> Vec<f64> {
    values
        .iter()
        .map(|v| match v.as_categorical() {
            Some(s) if s == level => 1.0,
            _ => 0.0,
        })
        .collect()
}
