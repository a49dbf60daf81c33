//! Named gene set collections in GMT format.
//!
//! GMT is the interchange format of the curated pathway databases: one set
//! per line, tab-separated as `name <tab> description <tab> gene ...`.

use crate::error::{DeaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// A named set of gene identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneSet {
    /// Pathway / set name.
    pub name: String,
    /// Free-text description (often a URL in public collections).
    pub description: String,
    /// Member gene identifiers, deduplicated, original order preserved.
    pub genes: Vec<String>,
}

impl GeneSet {
    /// Number of member genes.
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    /// Check if the set has no members.
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Check membership.
    pub fn contains(&self, gene_id: &str) -> bool {
        self.genes.iter().any(|g| g == gene_id)
    }
}

/// An ordered collection of named gene sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneSetCollection {
    sets: Vec<GeneSet>,
}

impl GeneSetCollection {
    /// Build from parts, rejecting duplicate set names.
    pub fn new(sets: Vec<GeneSet>) -> Result<Self> {
        let mut seen = HashSet::new();
        for set in &sets {
            if !seen.insert(set.name.as_str()) {
                return Err(DeaError::GeneSetParse(format!(
                    "Duplicate gene set name '{}'",
                    set.name
                )));
            }
        }
        Ok(Self { sets })
    }

    /// Load a collection from a GMT file.
    pub fn from_gmt<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        Self::from_gmt_str(&content, &path.as_ref().display().to_string())
    }

    /// Parse GMT content; `source` labels parse errors.
    pub fn from_gmt_str(content: &str, source: &str) -> Result<Self> {
        let mut sets = Vec::new();

        for (idx, line) in content.lines().enumerate() {
            let line_no = idx + 1;
            let trimmed = line.trim_end();
            if trimmed.is_empty() {
                continue;
            }
            let parts: Vec<&str> = trimmed.split('\t').collect();
            if parts.len() < 3 {
                return Err(DeaError::GeneSetParse(format!(
                    "{}:{}: expected at least 3 tab-separated fields, got {}",
                    source,
                    line_no,
                    parts.len()
                )));
            }

            let name = parts[0].trim();
            if name.is_empty() {
                return Err(DeaError::GeneSetParse(format!(
                    "{}:{}: empty set name",
                    source, line_no
                )));
            }

            let mut seen = HashSet::new();
            let genes: Vec<String> = parts[2..]
                .iter()
                .map(|g| g.trim())
                .filter(|g| !g.is_empty())
                .filter(|g| seen.insert(g.to_string()))
                .map(|g| g.to_string())
                .collect();

            sets.push(GeneSet {
                name: name.to_string(),
                description: parts[1].trim().to_string(),
                genes,
            });
        }

        if sets.is_empty() {
            return Err(DeaError::EmptyData(format!(
                "No gene sets found in {}",
                source
            )));
        }

        Self::new(sets)
    }

    /// Number of sets.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Check if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Look up a set by name.
    pub fn get(&self, name: &str) -> Option<&GeneSet> {
        self.sets.iter().find(|s| s.name == name)
    }

    /// Iterate over the sets.
    pub fn iter(&self) -> impl Iterator<Item = &GeneSet> {
        self.sets.iter()
    }

    /// Restrict every set to a gene universe, keeping sets (possibly empty)
    /// in order. Enrichment treats empty intersections as non-significant
    /// rather than dropping them silently.
    pub fn restrict_to(&self, universe: &HashSet<&str>) -> Self {
        let sets = self
            .sets
            .iter()
            .map(|s| GeneSet {
                name: s.name.clone(),
                description: s.description.clone(),
                genes: s
                    .genes
                    .iter()
                    .filter(|g| universe.contains(g.as_str()))
                    .cloned()
                    .collect(),
            })
            .collect();
        Self { sets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GMT: &str = "\
HALLMARK_APOPTOSIS\thttp://example.org/apoptosis\tBAX\tCASP3\tTP53\tBAX
HALLMARK_E2F_TARGETS\thttp://example.org/e2f\tE2F1\tCCNE1
";

    #[test]
    fn test_parse_gmt() {
        let collection = GeneSetCollection::from_gmt_str(GMT, "test.gmt").unwrap();
        assert_eq!(collection.len(), 2);

        let apoptosis = collection.get("HALLMARK_APOPTOSIS").unwrap();
        // duplicate BAX dropped
        assert_eq!(apoptosis.genes, vec!["BAX", "CASP3", "TP53"]);
        assert!(apoptosis.contains("CASP3"));
    }

    #[test]
    fn test_short_line_rejected() {
        let bad = "SET1\tdesc_only\n";
        assert!(GeneSetCollection::from_gmt_str(bad, "bad.gmt").is_err());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let dup = "S\td\tA\tB\nS\td\tC\n";
        assert!(GeneSetCollection::from_gmt_str(dup, "dup.gmt").is_err());
    }

    #[test]
    fn test_empty_content_rejected() {
        assert!(GeneSetCollection::from_gmt_str("\n\n", "empty.gmt").is_err());
    }

    #[test]
    fn test_restrict_to_universe() {
        let collection = GeneSetCollection::from_gmt_str(GMT, "test.gmt").unwrap();
        let universe: HashSet<&str> = ["TP53", "E2F1"].into_iter().collect();
        let restricted = collection.restrict_to(&universe);

        assert_eq!(restricted.get("HALLMARK_APOPTOSIS").unwrap().genes, vec!["TP53"]);
        assert_eq!(restricted.get("HALLMARK_E2F_TARGETS").unwrap().genes, vec!["E2F1"]);
    }
}
