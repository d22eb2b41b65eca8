//! Whitened linear Gaussian factors

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::common::keys::Key;
use crate::common::values::VectorValues;
use crate::errors::HybridError;

/// Linear factor with error `0.5 * ||sum_j A_j x_j - b||^2`
///
/// Blocks are stored already whitened; [`JacobianFactor::with_sigma`] applies
/// an isotropic noise model at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JacobianFactor {
    keys: Vec<Key>,
    blocks: Vec<DMatrix<f64>>,
    rhs: DVector<f64>,
}

impl JacobianFactor {
    /// Create from `(key, A_j)` terms and the right-hand side `b`
    pub fn new(terms: Vec<(Key, DMatrix<f64>)>, rhs: DVector<f64>) -> Result<Self, HybridError> {
        let mut keys = Vec::with_capacity(terms.len());
        let mut blocks = Vec::with_capacity(terms.len());
        for (key, block) in terms {
            if block.nrows() != rhs.len() {
                return Err(HybridError::DimensionMismatch {
                    expected: rhs.len(),
                    actual: block.nrows(),
                    context: "jacobian block rows".to_string(),
                });
            }
            if keys.contains(&key) {
                return Err(HybridError::InvalidOrdering {
                    key,
                    reason: "key appears twice in one factor".to_string(),
                });
            }
            keys.push(key);
            blocks.push(block);
        }
        Ok(Self { keys, blocks, rhs })
    }

    /// Create with an isotropic standard deviation `sigma`
    pub fn with_sigma(
        terms: Vec<(Key, DMatrix<f64>)>,
        rhs: DVector<f64>,
        sigma: f64,
    ) -> Result<Self, HybridError> {
        let inv = 1.0 / sigma;
        Self::new(
            terms.into_iter().map(|(k, a)| (k, a * inv)).collect(),
            rhs * inv,
        )
    }

    /// Factor without variables; its error is the constant `0.5 * ||b||^2`
    pub fn constant(rhs: DVector<f64>) -> Self {
        Self {
            keys: Vec::new(),
            blocks: Vec::new(),
            rhs,
        }
    }

    /// Variables, in block order
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Whitened Jacobian blocks, parallel to [`JacobianFactor::keys`]
    pub fn blocks(&self) -> &[DMatrix<f64>] {
        &self.blocks
    }

    /// Whitened right-hand side
    pub fn rhs(&self) -> &DVector<f64> {
        &self.rhs
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.rhs.len()
    }

    /// Block of a variable, if the factor involves it
    pub fn block(&self, key: Key) -> Option<&DMatrix<f64>> {
        self.keys
            .iter()
            .position(|k| *k == key)
            .map(|i| &self.blocks[i])
    }

    /// Dimension of a variable, if the factor involves it
    pub fn dim(&self, key: Key) -> Option<usize> {
        self.block(key).map(|b| b.ncols())
    }

    /// Whitened residual `sum_j A_j x_j - b`
    pub fn residual(&self, values: &VectorValues) -> Result<DVector<f64>, HybridError> {
        let mut r = -self.rhs.clone();
        for (key, block) in self.keys.iter().zip(&self.blocks) {
            let x = values.at(*key)?;
            if x.len() != block.ncols() {
                return Err(HybridError::DimensionMismatch {
                    expected: block.ncols(),
                    actual: x.len(),
                    context: format!("value of {}", crate::common::keys::format_key(*key)),
                });
            }
            r += block * x;
        }
        Ok(r)
    }

    /// `0.5 * ||A x - b||^2`
    pub fn error(&self, values: &VectorValues) -> Result<f64, HybridError> {
        Ok(0.5 * self.residual(values)?.norm_squared())
    }

    /// Same keys and entries within `tol`
    pub fn equals(&self, other: &JacobianFactor, tol: f64) -> bool {
        self.keys == other.keys
            && self
                .blocks
                .iter()
                .zip(&other.blocks)
                .all(|(a, b)| a.shape() == b.shape() && (a - b).amax() <= tol)
            && self.rhs.len() == other.rhs.len()
            && (&self.rhs - &other.rhs).amax() <= tol
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::keys::symbol;

    #[test]
    fn test_error_with_sigma() {
        let x1 = symbol('x', 1);
        let f = JacobianFactor::with_sigma(
            vec![(x1, DMatrix::identity(1, 1))],
            DVector::from_element(1, 1.0),
            0.1,
        )
        .unwrap();
        let mut values = VectorValues::new();
        values.insert(x1, DVector::from_element(1, 0.0));
        // 0.5 * (1 / 0.1)^2
        assert!((f.error(&values).unwrap() - 50.0).abs() < 1e-9);
        assert_eq!(f.dim(x1), Some(1));
    }

    #[test]
    fn test_rejects_row_mismatch() {
        let err = JacobianFactor::new(
            vec![(symbol('x', 1), DMatrix::identity(2, 2))],
            DVector::zeros(1),
        )
        .unwrap_err();
        assert!(matches!(err, HybridError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_missing_value() {
        let f = JacobianFactor::new(
            vec![(symbol('x', 1), DMatrix::identity(1, 1))],
            DVector::zeros(1),
        )
        .unwrap();
        assert!(matches!(
            f.error(&VectorValues::new()),
            Err(HybridError::MissingValue { .. })
        ));
        assert_eq!(JacobianFactor::constant(DVector::from_element(1, 2.0)).error(&VectorValues::new()), Ok(2.0));
    }
}
