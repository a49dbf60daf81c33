//! Per-sample metadata for an annotated expression matrix.

use crate::error::{DeaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A variable value that can be categorical, continuous, or ordinal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variable {
    /// Categorical variable with string levels.
    Categorical(String),
    /// Continuous numeric variable.
    Continuous(f64),
    /// Ordinal variable with integer rank.
    Ordinal(i64),
    /// Missing value.
    Missing,
}

impl Variable {
    /// Check if this is a missing value.
    pub fn is_missing(&self) -> bool {
        matches!(self, Variable::Missing)
    }

    /// Try to get as categorical string.
    pub fn as_categorical(&self) -> Option<&str> {
        match self {
            Variable::Categorical(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as continuous f64.
    pub fn as_continuous(&self) -> Option<f64> {
        match self {
            Variable::Continuous(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as ordinal i64.
    pub fn as_ordinal(&self) -> Option<i64> {
        match self {
            Variable::Ordinal(v) => Some(*v),
            _ => None,
        }
    }
}

/// Type hint for columns when loading metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableType {
    Categorical,
    Continuous,
    Ordinal,
}

/// Sample metadata: one typed record per sample, aligned to the columns of
/// an expression matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleMetadata {
    /// Sample IDs in order.
    sample_ids: Vec<String>,
    /// Column names.
    column_names: Vec<String>,
    /// Data stored as sample_id -> column_name -> Variable.
    data: HashMap<String, HashMap<String, Variable>>,
    /// Type hints for each column.
    column_types: HashMap<String, VariableType>,
}

impl SampleMetadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self {
            sample_ids: Vec::new(),
            column_names: Vec::new(),
            data: HashMap::new(),
            column_types: HashMap::new(),
        }
    }

    /// Load metadata from a TSV file.
    ///
    /// Expected format:
    /// - First row: header with column names (first column is sample ID)
    /// - Subsequent rows: sample ID followed by variable values
    ///
    /// Columns are inferred as continuous if every value parses as a number,
    /// otherwise categorical. Use `with_column_types` to override.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| DeaError::EmptyData("Empty metadata file".to_string()))??;
        let header: Vec<&str> = header_line.split('\t').collect();
        if header.len() < 2 {
            return Err(DeaError::EmptyData(
                "Metadata must have at least one variable column".to_string(),
            ));
        }
        let column_names: Vec<String> = header[1..].iter().map(|s| s.to_string()).collect();

        // First pass: raw values, so column types can be inferred over all rows
        let mut raw_rows: Vec<(String, Vec<String>)> = Vec::new();
        for line_result in lines {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let sample_id = fields[0].to_string();
            let values: Vec<String> = fields[1..].iter().map(|s| s.to_string()).collect();
            raw_rows.push((sample_id, values));
        }

        if raw_rows.is_empty() {
            return Err(DeaError::EmptyData("No samples in metadata".to_string()));
        }

        let mut column_types = HashMap::new();
        for (col_idx, col_name) in column_names.iter().enumerate() {
            let all_numeric = raw_rows.iter().all(|(_, values)| {
                match values.get(col_idx) {
                    None => true,
                    Some(v) => {
                        let v = v.trim();
                        v.is_empty() || v == "NA" || v == "na" || v.parse::<f64>().is_ok()
                    }
                }
            });
            let var_type = if all_numeric {
                VariableType::Continuous
            } else {
                VariableType::Categorical
            };
            column_types.insert(col_name.clone(), var_type);
        }

        let mut sample_ids = Vec::new();
        let mut data = HashMap::new();

        for (sample_id, values) in raw_rows {
            sample_ids.push(sample_id.clone());
            let mut record = HashMap::new();
            for (col_idx, col_name) in column_names.iter().enumerate() {
                let raw = values.get(col_idx).map(|s| s.trim()).unwrap_or("");
                let var = parse_value(raw, column_types[col_name]);
                record.insert(col_name.clone(), var);
            }
            data.insert(sample_id, record);
        }

        Ok(Self {
            sample_ids,
            column_names,
            data,
            column_types,
        })
    }

    /// Set type hints for specific columns, re-interpreting stored values.
    pub fn with_column_types(mut self, types: HashMap<String, VariableType>) -> Self {
        for (col_name, var_type) in &types {
            self.column_types.insert(col_name.clone(), *var_type);
            for record in self.data.values_mut() {
                if let Some(var) = record.get_mut(col_name) {
                    *var = coerce_value(var, *var_type);
                }
            }
        }
        self
    }

    /// Sample IDs in order.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Column names.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Number of columns (variables).
    pub fn n_columns(&self) -> usize {
        self.column_names.len()
    }

    /// Get a variable value for a specific sample and column.
    pub fn get(&self, sample_id: &str, column: &str) -> Option<&Variable> {
        self.data.get(sample_id).and_then(|m| m.get(column))
    }

    /// Get all values for a column, in sample order.
    pub fn column(&self, column: &str) -> Result<Vec<&Variable>> {
        if !self.has_column(column) {
            return Err(DeaError::MissingColumn(column.to_string()));
        }
        Ok(self
            .sample_ids
            .iter()
            .map(|sid| {
                self.data
                    .get(sid)
                    .and_then(|m| m.get(column))
                    .unwrap_or(&Variable::Missing)
            })
            .collect())
    }

    /// Get the type of a column.
    pub fn column_type(&self, column: &str) -> Option<VariableType> {
        self.column_types.get(column).copied()
    }

    /// Get unique levels for a categorical column, sorted.
    pub fn levels(&self, column: &str) -> Result<Vec<String>> {
        let values = self.column(column)?;
        let mut levels: Vec<String> = values
            .iter()
            .filter_map(|v| v.as_categorical().map(String::from))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        levels.sort();
        Ok(levels)
    }

    /// Remap the levels of a categorical column via a renaming table.
    ///
    /// Values present as keys in `mapping` are replaced by the mapped value;
    /// everything else (including missing values) is left untouched. Returns
    /// a new metadata table.
    pub fn recode(&self, column: &str, mapping: &HashMap<String, String>) -> Result<Self> {
        if !self.has_column(column) {
            return Err(DeaError::MissingColumn(column.to_string()));
        }
        if self.column_type(column) != Some(VariableType::Categorical) {
            return Err(DeaError::InvalidVariableType {
                column: column.to_string(),
                reason: "Only categorical columns can be recoded".to_string(),
            });
        }

        let mut recoded = self.clone();
        for record in recoded.data.values_mut() {
            if let Some(Variable::Categorical(level)) = record.get_mut(column) {
                if let Some(new_level) = mapping.get(level.as_str()) {
                    *level = new_level.clone();
                }
            }
        }
        Ok(recoded)
    }

    /// Indices of samples whose categorical value in `column` is in `values`.
    ///
    /// Missing values never match.
    pub fn sample_indices_where(&self, column: &str, values: &[&str]) -> Result<Vec<usize>> {
        let col = self.column(column)?;
        Ok(col
            .iter()
            .enumerate()
            .filter(|(_, v)| {
                v.as_categorical()
                    .map(|s| values.contains(&s))
                    .unwrap_or(false)
            })
            .map(|(i, _)| i)
            .collect())
    }

    /// Subset metadata to the specified samples, in the given order.
    pub fn subset_samples(&self, sample_ids: &[String]) -> Result<Self> {
        let mut new_data = HashMap::new();
        let mut new_sample_ids = Vec::new();

        for sid in sample_ids {
            match self.data.get(sid) {
                Some(record) => {
                    new_data.insert(sid.clone(), record.clone());
                    new_sample_ids.push(sid.clone());
                }
                None => {
                    return Err(DeaError::SampleMismatch(format!(
                        "Sample '{}' not found in metadata",
                        sid
                    )));
                }
            }
        }

        Ok(Self {
            sample_ids: new_sample_ids,
            column_names: self.column_names.clone(),
            data: new_data,
            column_types: self.column_types.clone(),
        })
    }

    /// Align metadata to match the sample order of a count matrix.
    pub fn align_to(&self, sample_ids: &[String]) -> Result<Self> {
        self.subset_samples(sample_ids)
    }

    /// Check if a sample exists.
    pub fn has_sample(&self, sample_id: &str) -> bool {
        self.data.contains_key(sample_id)
    }

    /// Check if a column exists.
    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }
}

impl Default for SampleMetadata {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_value(raw: &str, var_type: VariableType) -> Variable {
    if raw.is_empty() || raw == "NA" || raw == "na" {
        return Variable::Missing;
    }
    match var_type {
        VariableType::Continuous => raw
            .parse::<f64>()
            .map(Variable::Continuous)
            .unwrap_or(Variable::Missing),
        VariableType::Ordinal => raw
            .parse::<i64>()
            .map(Variable::Ordinal)
            .unwrap_or(Variable::Missing),
        VariableType::Categorical => Variable::Categorical(raw.to_string()),
    }
}

fn coerce_value(var: &Variable, target: VariableType) -> Variable {
    match var {
        Variable::Categorical(s) => parse_value(s.trim(), target),
        Variable::Continuous(v) => match target {
            VariableType::Continuous => Variable::Continuous(*v),
            VariableType::Ordinal => Variable::Ordinal(*v as i64),
            VariableType::Categorical => Variable::Categorical(v.to_string()),
        },
        Variable::Ordinal(v) => match target {
            VariableType::Continuous => Variable::Continuous(*v as f64),
            VariableType::Ordinal => Variable::Ordinal(*v),
            VariableType::Categorical => Variable::Categorical(v.to_string()),
        },
        Variable::Missing => Variable::Missing,
    }
}
