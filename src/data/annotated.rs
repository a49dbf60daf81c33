//! Annotated expression matrix: counts plus aligned row and column metadata.

use crate::data::{ExpressionMatrix, FeatureAnnotations, SampleMetadata};
use crate::error::{DeaError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// A count matrix bundled with feature annotations and sample metadata.
///
/// Invariant: the matrix rows match the annotation table (same gene IDs in
/// the same order) and the matrix columns match the metadata (same sample
/// IDs in the same order). Every subsetting operation returns a new
/// AnnotatedMatrix with the invariant re-established.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatedMatrix {
    counts: ExpressionMatrix,
    features: FeatureAnnotations,
    samples: SampleMetadata,
}

impl AnnotatedMatrix {
    /// Bundle the three parts, validating alignment.
    pub fn new(
        counts: ExpressionMatrix,
        features: FeatureAnnotations,
        samples: SampleMetadata,
    ) -> Result<Self> {
        if counts.gene_ids() != features.gene_ids() {
            return Err(DeaError::Alignment(format!(
                "Matrix rows ({}) and feature annotations ({}) disagree",
                counts.n_genes(),
                features.n_genes()
            )));
        }
        if counts.sample_ids() != samples.sample_ids() {
            return Err(DeaError::Alignment(format!(
                "Matrix columns ({}) and sample metadata ({}) disagree",
                counts.n_samples(),
                samples.n_samples()
            )));
        }
        Ok(Self {
            counts,
            features,
            samples,
        })
    }

    /// Load from three aligned TSV tables: counts, feature annotations and
    /// sample metadata. Annotations and metadata are reordered to match the
    /// count matrix.
    pub fn from_tsv_parts<P: AsRef<Path>>(
        counts_path: P,
        features_path: P,
        samples_path: P,
    ) -> Result<Self> {
        let counts = ExpressionMatrix::from_tsv(counts_path)?;
        let features = FeatureAnnotations::from_tsv(features_path)?.align_to(counts.gene_ids())?;
        let samples = SampleMetadata::from_tsv(samples_path)?.align_to(counts.sample_ids())?;
        Self::new(counts, features, samples)
    }

    /// Load from counts and sample metadata only, synthesizing an empty
    /// annotation table from the matrix gene IDs.
    pub fn from_counts_and_samples(
        counts: ExpressionMatrix,
        samples: SampleMetadata,
    ) -> Result<Self> {
        let samples = samples.align_to(counts.sample_ids())?;
        let features = FeatureAnnotations::from_ids(counts.gene_ids().to_vec());
        Self::new(counts, features, samples)
    }

    /// Read the persisted JSON form.
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Write the persisted JSON form.
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(serde_json::to_writer(writer, self)?)
    }

    /// The count matrix.
    pub fn counts(&self) -> &ExpressionMatrix {
        &self.counts
    }

    /// The feature annotation table.
    pub fn features(&self) -> &FeatureAnnotations {
        &self.features
    }

    /// The sample metadata table.
    pub fn samples(&self) -> &SampleMetadata {
        &self.samples
    }

    /// Number of genes (rows).
    pub fn n_genes(&self) -> usize {
        self.counts.n_genes()
    }

    /// Number of samples (columns).
    pub fn n_samples(&self) -> usize {
        self.counts.n_samples()
    }

    /// Gene IDs in row order.
    pub fn gene_ids(&self) -> &[String] {
        self.counts.gene_ids()
    }

    /// Sample IDs in column order.
    pub fn sample_ids(&self) -> &[String] {
        self.counts.sample_ids()
    }

    /// Subset to the given genes by row index; annotations follow.
    pub fn subset_genes(&self, indices: &[usize]) -> Result<Self> {
        let counts = self.counts.subset_genes(indices)?;
        let features = self.features.subset_genes(counts.gene_ids())?;
        Self::new(counts, features, self.samples.clone())
    }

    /// Subset to the given samples by column index; metadata follows. An
    /// empty selection is a valid derived artifact: the metadata keeps its
    /// columns and loses its rows.
    pub fn subset_samples(&self, indices: &[usize]) -> Result<Self> {
        let counts = self.counts.subset_samples(indices)?;
        let samples = self.samples.subset_samples(counts.sample_ids())?;
        Self::new(counts, self.features.clone(), samples)
    }

    /// Replace the sample metadata (e.g. after recoding a column). The new
    /// table must cover the same samples in the same order.
    pub fn with_samples(&self, samples: SampleMetadata) -> Result<Self> {
        Self::new(self.counts.clone(), self.features.clone(), samples)
    }
}
