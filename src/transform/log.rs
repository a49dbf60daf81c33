//! log2(x+1) transform over an expression matrix.

use crate::data::ExpressionMatrix;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// A dense transformed matrix with identifiers and a transformation tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformedMatrix {
    /// The transformed data (genes × samples).
    #[serde(skip)]
    pub data: DMatrix<f64>,
    /// Gene identifiers.
    pub gene_ids: Vec<String>,
    /// Sample identifiers.
    pub sample_ids: Vec<String>,
    /// Name of the transformation applied.
    pub transformation: String,
}

impl TransformedMatrix {
    /// Get the transformed value for a gene and sample.
    pub fn get(&self, gene: usize, sample: usize) -> f64 {
        self.data[(gene, sample)]
    }

    /// Number of genes.
    pub fn n_genes(&self) -> usize {
        self.data.nrows()
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// Get a row (gene) as a vector.
    pub fn row(&self, gene: usize) -> Vec<f64> {
        self.data.row(gene).iter().cloned().collect()
    }

    /// Get a column (sample) as a vector.
    pub fn col(&self, sample: usize) -> Vec<f64> {
        self.data.column(sample).iter().cloned().collect()
    }

    /// Reference to the underlying matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Subset to the given genes by row index, preserving order.
    pub fn subset_genes(&self, indices: &[usize]) -> Self {
        let mut data = DMatrix::zeros(indices.len(), self.n_samples());
        let mut gene_ids = Vec::with_capacity(indices.len());
        for (new_row, &old_row) in indices.iter().enumerate() {
            gene_ids.push(self.gene_ids[old_row].clone());
            for col in 0..self.n_samples() {
                data[(new_row, col)] = self.data[(old_row, col)];
            }
        }
        Self {
            data,
            gene_ids,
            sample_ids: self.sample_ids.clone(),
            transformation: self.transformation.clone(),
        }
    }
}

/// Apply an elementwise log2(x + 1) transform.
///
/// The +1 offset keeps zeros finite: log2(0 + 1) = 0. The transform is
/// monotone, so ordering of counts is preserved within and across genes.
pub fn log2p1(counts: &ExpressionMatrix) -> TransformedMatrix {
    let mut data = DMatrix::zeros(counts.n_genes(), counts.n_samples());
    for (row, row_vec) in counts.data().outer_iterator().enumerate() {
        for (col, &val) in row_vec.iter() {
            data[(row, col)] = (val as f64 + 1.0).log2();
        }
    }

    TransformedMatrix {
        data,
        gene_ids: counts.gene_ids().to_vec(),
        sample_ids: counts.sample_ids().to_vec(),
        transformation: "log2p1".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn counts() -> ExpressionMatrix {
        let triplets = vec![(0, 0, 1), (0, 1, 3), (1, 0, 7), (1, 1, 15)];
        ExpressionMatrix::from_triplets(
            (2, 2),
            &triplets,
            vec!["g1".to_string(), "g2".to_string()],
            vec!["S1".to_string(), "S2".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_values() {
        let t = log2p1(&counts());
        assert_relative_eq!(t.get(0, 0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(t.get(0, 1), 2.0, epsilon = 1e-12);
        assert_relative_eq!(t.get(1, 0), 3.0, epsilon = 1e-12);
        assert_relative_eq!(t.get(1, 1), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_maps_to_zero() {
        let triplets = vec![(0, 1, 5)];
        let counts = ExpressionMatrix::from_triplets(
            (1, 2),
            &triplets,
            vec!["g1".to_string()],
            vec!["S1".to_string(), "S2".to_string()],
        )
        .unwrap();
        let t = log2p1(&counts);
        assert_eq!(t.get(0, 0), 0.0);
        assert!(t.get(0, 0).is_finite());
    }

    #[test]
    fn test_monotone() {
        let t = log2p1(&counts());
        // counts 1 <= 3 <= 7 <= 15 transform in the same order
        assert!(t.get(0, 0) <= t.get(0, 1));
        assert!(t.get(0, 1) <= t.get(1, 0));
        assert!(t.get(1, 0) <= t.get(1, 1));
    }

    #[test]
    fn test_subset_genes() {
        let t = log2p1(&counts());
        let sub = t.subset_genes(&[1]);
        assert_eq!(sub.gene_ids, vec!["g2".to_string()]);
        assert_relative_eq!(sub.get(0, 1), 4.0, epsilon = 1e-12);
    }
}
