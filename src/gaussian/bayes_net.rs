//! Ordered sets of Gaussian conditionals

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::conditional::GaussianConditional;
use crate::common::values::VectorValues;
use crate::errors::HybridError;

/// Gaussian Bayes net in elimination order
///
/// Conditionals are stored children first, so every conditional's parents are
/// frontal in some later conditional (or absent, when elimination was partial).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GaussianBayesNet {
    conditionals: Vec<Arc<GaussianConditional>>,
}

impl GaussianBayesNet {
    /// Empty net
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a conditional
    pub fn push(&mut self, conditional: Arc<GaussianConditional>) {
        self.conditionals.push(conditional);
    }

    /// Number of conditionals
    pub fn len(&self) -> usize {
        self.conditionals.len()
    }

    /// True if the net has no conditionals
    pub fn is_empty(&self) -> bool {
        self.conditionals.is_empty()
    }

    /// Conditional at `index`
    pub fn at(&self, index: usize) -> Result<&Arc<GaussianConditional>, HybridError> {
        self.conditionals.get(index).ok_or(HybridError::IndexOutOfBounds {
            index,
            len: self.conditionals.len(),
        })
    }

    /// Iterate in stored order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<GaussianConditional>> {
        self.conditionals.iter()
    }

    /// Back-substitution starting from known values
    ///
    /// Conditionals are solved last to first; `given` must hold every parent
    /// that is not frontal in this net.
    pub fn optimize_from(&self, given: VectorValues) -> Result<VectorValues, HybridError> {
        let mut values = given;
        for conditional in self.conditionals.iter().rev() {
            let x = conditional.solve(&values)?;
            values.insert(conditional.frontal(), x);
        }
        Ok(values)
    }

    /// Maximum-likelihood solution by back-substitution
    pub fn optimize(&self) -> Result<VectorValues, HybridError> {
        self.optimize_from(VectorValues::new())
    }

    /// Sum of conditional errors
    pub fn error(&self, values: &VectorValues) -> Result<f64, HybridError> {
        self.conditionals
            .iter()
            .map(|c| c.error(values))
            .sum::<Result<f64, _>>()
    }

    /// Same conditionals, in order, within `tol`
    pub fn equals(&self, other: &GaussianBayesNet, tol: f64) -> bool {
        self.len() == other.len()
            && self
                .conditionals
                .iter()
                .zip(&other.conditionals)
                .all(|(a, b)| a.equals(b, tol))
    }
}

impl FromIterator<Arc<GaussianConditional>> for GaussianBayesNet {
    fn from_iter<I: IntoIterator<Item = Arc<GaussianConditional>>>(iter: I) -> Self {
        Self {
            conditionals: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::keys::symbol;
    use nalgebra::{DMatrix, DVector};

    #[test]
    fn test_optimize_back_substitutes_in_reverse() {
        let (x1, x2) = (symbol('x', 1), symbol('x', 2));
        let child = GaussianConditional::from_mean_and_sigma(
            x1,
            DVector::from_element(1, 1.0),
            vec![(x2, DMatrix::identity(1, 1))],
            1.0,
        )
        .unwrap();
        let root =
            GaussianConditional::from_mean_and_sigma(x2, DVector::from_element(1, 4.0), Vec::new(), 2.0)
                .unwrap();
        let net: GaussianBayesNet = vec![Arc::new(child), Arc::new(root)].into_iter().collect();

        let solution = net.optimize().unwrap();
        assert!((solution.get(x2).unwrap()[0] - 4.0).abs() < 1e-12);
        assert!((solution.get(x1).unwrap()[0] - 5.0).abs() < 1e-12);
        assert!(net.error(&solution).unwrap() < 1e-20);
    }

    #[test]
    fn test_missing_parent() {
        let (x1, x2) = (symbol('x', 1), symbol('x', 2));
        let child = GaussianConditional::from_mean_and_sigma(
            x1,
            DVector::zeros(1),
            vec![(x2, DMatrix::identity(1, 1))],
            1.0,
        )
        .unwrap();
        let net: GaussianBayesNet = std::iter::once(Arc::new(child)).collect();
        assert_eq!(net.optimize(), Err(HybridError::MissingValue { key: x2 }));
    }
}
