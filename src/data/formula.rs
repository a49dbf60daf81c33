//! Formula parsing for model specification.

use crate::error::{DeaError, Result};
use serde::{Deserialize, Serialize};

/// A term in a formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Term {
    /// Intercept term (constant).
    Intercept,
    /// Main effect of a variable.
    Main(String),
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Intercept => write!(f, "1"),
            Term::Main(v) => write!(f, "{}", v),
        }
    }
}

/// A parsed formula specifying the model design.
///
/// Supports R-style formula syntax with main effects:
/// - `~ tissue` - intercept + tissue
/// - `~ tissue + age` - intercept + tissue + age
/// - `~ 0 + tissue` - tissue, no intercept
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formula {
    /// Whether to include an intercept.
    pub intercept: bool,
    /// Terms in the formula (excluding intercept).
    pub terms: Vec<Term>,
    /// Original formula string.
    pub formula_str: String,
}

impl Formula {
    /// Parse a formula string.
    ///
    /// # Examples
    /// ```
    /// use composable_dea::data::Formula;
    /// let f = Formula::parse("~ tissue + age").unwrap();
    /// assert!(f.intercept);
    /// assert_eq!(f.terms.len(), 2);
    /// ```
    pub fn parse(formula: &str) -> Result<Self> {
        let formula_str = formula.to_string();
        let trimmed = formula.trim();

        let rhs = trimmed
            .strip_prefix('~')
            .ok_or_else(|| DeaError::FormulaParse("Formula must start with '~'".to_string()))?
            .trim();
        if rhs.is_empty() {
            return Err(DeaError::FormulaParse(
                "Formula right-hand side is empty".to_string(),
            ));
        }

        let mut intercept = true;
        let mut terms = Vec::new();

        for part in rhs.split('+') {
            let token = part.trim();
            match token {
                "" => {
                    return Err(DeaError::FormulaParse(format!(
                        "Empty term in formula '{}'",
                        formula_str
                    )));
                }
                "0" | "-1" => intercept = false,
                "1" => {}
                name => {
                    if !name
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
                    {
                        return Err(DeaError::FormulaParse(format!(
                            "Invalid variable name '{}'",
                            name
                        )));
                    }
                    let term = Term::Main(name.to_string());
                    if !terms.contains(&term) {
                        terms.push(term);
                    }
                }
            }
        }

        if terms.is_empty() && !intercept {
            return Err(DeaError::FormulaParse(
                "Formula has neither intercept nor terms".to_string(),
            ));
        }

        Ok(Self {
            intercept,
            terms,
            formula_str,
        })
    }

    /// Variable names referenced by the formula.
    pub fn variables(&self) -> Vec<&str> {
        self.terms
            .iter()
            .filter_map(|t| match t {
                Term::Main(v) => Some(v.as_str()),
                Term::Intercept => None,
            })
            .collect()
    }
}

impl std::fmt::Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.formula_str)
    }
}
