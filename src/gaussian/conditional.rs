//! Linear-Gaussian conditionals in square-root information form
//!
//! A [`GaussianConditional`] represents `p(x_f | x_p)` through
//! `R x_f + sum_j S_j x_j = d` with unit noise, as produced by QR elimination.
//! `R` is upper triangular with a positive diagonal.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::common::keys::{format_key, Key};
use crate::common::linalg::{log_abs_det_upper, solve_upper_triangular};
use crate::common::values::VectorValues;
use crate::errors::HybridError;

/// Gaussian density of one frontal variable given continuous parents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianConditional {
    frontal: Key,
    r: DMatrix<f64>,
    parents: Vec<(Key, DMatrix<f64>)>,
    d: DVector<f64>,
}

impl GaussianConditional {
    /// Create from `R`, parent blocks `S_j` and `d`
    ///
    /// # Arguments
    /// * `frontal` - Conditioned variable
    /// * `r` - Square upper-triangular matrix
    /// * `parents` - `(key, S_j)` with `S_j` having as many rows as `r`
    /// * `d` - Right-hand side
    pub fn new(
        frontal: Key,
        r: DMatrix<f64>,
        parents: Vec<(Key, DMatrix<f64>)>,
        d: DVector<f64>,
    ) -> Result<Self, HybridError> {
        if !r.is_square() {
            return Err(HybridError::DimensionMismatch {
                expected: r.nrows(),
                actual: r.ncols(),
                context: format!("R of {} must be square", format_key(frontal)),
            });
        }
        if d.len() != r.nrows() {
            return Err(HybridError::DimensionMismatch {
                expected: r.nrows(),
                actual: d.len(),
                context: "conditional rhs".to_string(),
            });
        }
        if let Some((key, s)) = parents.iter().find(|(_, s)| s.nrows() != r.nrows()) {
            return Err(HybridError::DimensionMismatch {
                expected: r.nrows(),
                actual: s.nrows(),
                context: format!("parent block of {}", format_key(*key)),
            });
        }
        Ok(Self {
            frontal,
            r,
            parents,
            d,
        })
    }

    /// Conditional `x_f ~ N(mean + sum_j A_j x_j, sigma^2 I)` in scalar-sigma form
    ///
    /// Convenience for building nets by hand: `R = I / sigma`,
    /// `S_j = -A_j / sigma`, `d = mean / sigma`.
    pub fn from_mean_and_sigma(
        frontal: Key,
        mean: DVector<f64>,
        parents: Vec<(Key, DMatrix<f64>)>,
        sigma: f64,
    ) -> Result<Self, HybridError> {
        let n = mean.len();
        let inv = 1.0 / sigma;
        Self::new(
            frontal,
            DMatrix::identity(n, n) * inv,
            parents.into_iter().map(|(k, a)| (k, a * -inv)).collect(),
            mean * inv,
        )
    }

    /// Frontal variable
    pub fn frontal(&self) -> Key {
        self.frontal
    }

    /// Dimension of the frontal variable
    pub fn dim(&self) -> usize {
        self.r.nrows()
    }

    /// Parent variables, in block order
    pub fn parent_keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.parents.iter().map(|(k, _)| *k)
    }

    /// Frontal key followed by the parent keys
    pub fn keys(&self) -> Vec<Key> {
        std::iter::once(self.frontal).chain(self.parent_keys()).collect()
    }

    /// `R`
    pub fn r(&self) -> &DMatrix<f64> {
        &self.r
    }

    /// Parent blocks `S_j`
    pub fn parents(&self) -> &[(Key, DMatrix<f64>)] {
        &self.parents
    }

    /// `d`
    pub fn d(&self) -> &DVector<f64> {
        &self.d
    }

    /// `ln |det R|`
    pub fn log_determinant(&self) -> f64 {
        log_abs_det_upper(&self.r)
    }

    /// `d - sum_j S_j x_j`
    fn rhs_given_parents(&self, values: &VectorValues) -> Result<DVector<f64>, HybridError> {
        let mut rhs = self.d.clone();
        for (key, s) in &self.parents {
            let x = values.at(*key)?;
            if x.len() != s.ncols() {
                return Err(HybridError::DimensionMismatch {
                    expected: s.ncols(),
                    actual: x.len(),
                    context: format!("value of {}", format_key(*key)),
                });
            }
            rhs -= s * x;
        }
        Ok(rhs)
    }

    /// `0.5 * ||R x_f + sum_j S_j x_j - d||^2`
    pub fn error(&self, values: &VectorValues) -> Result<f64, HybridError> {
        let x = values.at(self.frontal)?;
        if x.len() != self.dim() {
            return Err(HybridError::DimensionMismatch {
                expected: self.dim(),
                actual: x.len(),
                context: format!("value of {}", format_key(self.frontal)),
            });
        }
        let residual = &self.r * x - self.rhs_given_parents(values)?;
        Ok(0.5 * residual.norm_squared())
    }

    /// Back-substitute for the frontal variable given its parents' values
    pub fn solve(&self, values: &VectorValues) -> Result<DVector<f64>, HybridError> {
        let rhs = self.rhs_given_parents(values)?;
        solve_upper_triangular(&self.r, &rhs).ok_or_else(|| HybridError::NumericalDegeneracy {
            key: self.frontal,
            context: "singular R in back-substitution".to_string(),
        })
    }

    /// Same structure and entries within `tol`
    pub fn equals(&self, other: &GaussianConditional, tol: f64) -> bool {
        let close = |a: &DMatrix<f64>, b: &DMatrix<f64>| a.shape() == b.shape() && (a - b).amax() <= tol;
        self.frontal == other.frontal
            && close(&self.r, &other.r)
            && self.d.len() == other.d.len()
            && (&self.d - &other.d).amax() <= tol
            && self.parents.len() == other.parents.len()
            && self
                .parents
                .iter()
                .zip(&other.parents)
                .all(|((ka, sa), (kb, sb))| ka == kb && close(sa, sb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::keys::symbol;

    fn scalar(v: f64) -> DVector<f64> {
        DVector::from_element(1, v)
    }

    #[test]
    fn test_solve_and_error() {
        let (x1, x2) = (symbol('x', 1), symbol('x', 2));
        // x1 = 2 + x2, sigma 0.5
        let c = GaussianConditional::from_mean_and_sigma(
            x1,
            scalar(2.0),
            vec![(x2, DMatrix::identity(1, 1))],
            0.5,
        )
        .unwrap();
        let mut values = VectorValues::new();
        values.insert(x2, scalar(3.0));
        let x = c.solve(&values).unwrap();
        assert!((x[0] - 5.0).abs() < 1e-12);

        values.insert(x1, scalar(6.0));
        // 0.5 * (1 / 0.5)^2
        assert!((c.error(&values).unwrap() - 2.0).abs() < 1e-12);
        assert!((c.log_determinant() - 2.0f64.ln()).abs() < 1e-12);
        assert_eq!(c.keys(), vec![x1, x2]);
    }

    #[test]
    fn test_singular_solve_is_reported() {
        let c = GaussianConditional::new(
            symbol('x', 1),
            DMatrix::zeros(1, 1),
            Vec::new(),
            scalar(1.0),
        )
        .unwrap();
        assert!(matches!(
            c.solve(&VectorValues::new()),
            Err(HybridError::NumericalDegeneracy { .. })
        ));
    }

    #[test]
    fn test_rejects_non_square_r() {
        let err = GaussianConditional::new(symbol('x', 1), DMatrix::zeros(1, 2), Vec::new(), scalar(0.0))
            .unwrap_err();
        assert!(matches!(err, HybridError::DimensionMismatch { .. }));
    }
}
