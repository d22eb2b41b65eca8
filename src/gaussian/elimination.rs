//! Dense QR elimination of one continuous variable

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};

use super::conditional::GaussianConditional;
use super::factor::JacobianFactor;
use crate::common::keys::{format_key, Key};
use crate::common::linalg::make_diagonal_positive;
use crate::errors::HybridError;

/// Output of eliminating one continuous variable
#[derive(Debug, Clone)]
pub struct GaussianElimination {
    /// `p(frontal | separator)`
    pub conditional: GaussianConditional,
    /// Remaining information on the separator; may have no keys and only a
    /// constant error, or no rows at all
    pub residual: JacobianFactor,
    /// `ln |det R|` of the conditional
    pub log_determinant: f64,
}

/// Eliminate `frontal` from a set of linear factors
///
/// # Arguments
/// * `factors` - Every factor involving `frontal` (other factors may be passed
///   and end up in the residual)
/// * `frontal` - Variable to eliminate
/// * `separator` - Remaining variables, in the column order to use; must
///   contain every other key of `factors`
/// * `dims` - Dimension of every variable involved
/// * `rank_tolerance` - Minimum accepted absolute pivot
///
/// # Implementation Notes
/// The factors are stacked into one augmented matrix `[A_f | A_s | b]` and
/// reduced with Householder QR. The first `dim(frontal)` rows of `R` form the
/// conditional; the remaining rows (including the final rhs-only row carrying
/// the unexplained error) form the residual.
pub fn eliminate_gaussian(
    factors: &[&JacobianFactor],
    frontal: Key,
    separator: &[Key],
    dims: &BTreeMap<Key, usize>,
    rank_tolerance: f64,
) -> Result<GaussianElimination, HybridError> {
    let dim_of = |key: Key| {
        dims.get(&key).copied().ok_or_else(|| HybridError::InvalidOrdering {
            key,
            reason: "no dimension known for variable".to_string(),
        })
    };

    // Column offsets: frontal first, then separator, then rhs
    let nf = dim_of(frontal)?;
    let mut offsets: BTreeMap<Key, usize> = BTreeMap::new();
    offsets.insert(frontal, 0);
    let mut ncols = nf;
    for &key in separator {
        offsets.insert(key, ncols);
        ncols += dim_of(key)?;
    }
    let nrows: usize = factors.iter().map(|f| f.rows()).sum();

    let mut ab = DMatrix::<f64>::zeros(nrows, ncols + 1);
    let mut row = 0;
    for factor in factors {
        let m = factor.rows();
        for (key, block) in factor.keys().iter().zip(factor.blocks()) {
            let col = *offsets.get(key).ok_or_else(|| HybridError::InvalidOrdering {
                key: *key,
                reason: format!(
                    "factor variable missing from separator of {}",
                    format_key(frontal)
                ),
            })?;
            ab.view_mut((row, col), (m, block.ncols())).copy_from(block);
        }
        ab.view_mut((row, ncols), (m, 1)).copy_from(factor.rhs());
        row += m;
    }

    if nrows < nf {
        return Err(HybridError::NumericalDegeneracy {
            key: frontal,
            context: format!("{} rows cannot determine {} unknowns", nrows, nf),
        });
    }

    let mut r = ab.qr().r();
    make_diagonal_positive(&mut r, nf);
    for i in 0..nf {
        if r[(i, i)].abs() <= rank_tolerance {
            return Err(HybridError::NumericalDegeneracy {
                key: frontal,
                context: format!("pivot {} is {:.3e}", i, r[(i, i)]),
            });
        }
    }

    let r_ff = r.view((0, 0), (nf, nf)).into_owned();
    let d = DVector::from_iterator(nf, r.view((0, ncols), (nf, 1)).iter().copied());
    let parents: Vec<(Key, DMatrix<f64>)> = separator
        .iter()
        .map(|&key| {
            let col = offsets[&key];
            (key, r.view((0, col), (nf, dims[&key])).into_owned())
        })
        .collect();
    let conditional = GaussianConditional::new(frontal, r_ff, parents, d)?;
    let log_determinant = conditional.log_determinant();

    let rest = r.nrows() - nf;
    let residual_terms: Vec<(Key, DMatrix<f64>)> = separator
        .iter()
        .map(|&key| {
            let col = offsets[&key];
            (key, r.view((nf, col), (rest, dims[&key])).into_owned())
        })
        .collect();
    let residual_rhs = DVector::from_iterator(rest, r.view((nf, ncols), (rest, 1)).iter().copied());
    let residual = if separator.is_empty() {
        JacobianFactor::constant(residual_rhs)
    } else {
        JacobianFactor::new(residual_terms, residual_rhs)?
    };

    Ok(GaussianElimination {
        conditional,
        residual,
        log_determinant,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::keys::symbol;
    use crate::common::values::VectorValues;

    fn scalar(v: f64) -> DVector<f64> {
        DVector::from_element(1, v)
    }

    fn one() -> DMatrix<f64> {
        DMatrix::identity(1, 1)
    }

    #[test]
    fn test_eliminate_chain_link() {
        let (x1, x2) = (symbol('x', 1), symbol('x', 2));
        // prior x1 = 1, odometry x2 - x1 = 2
        let prior = JacobianFactor::new(vec![(x1, one())], scalar(1.0)).unwrap();
        let odo = JacobianFactor::new(vec![(x1, -one()), (x2, one())], scalar(2.0)).unwrap();
        let dims: BTreeMap<Key, usize> = [(x1, 1), (x2, 1)].into_iter().collect();

        let out = eliminate_gaussian(&[&prior, &odo], x1, &[x2], &dims, 1e-9).unwrap();
        assert!(out.conditional.r()[(0, 0)] > 0.0);
        assert!((out.log_determinant - 2.0f64.sqrt().ln()).abs() < 1e-12);

        // Residual on x2 is minimized at x2 = 3 with zero error
        let mut values = VectorValues::new();
        values.insert(x2, scalar(3.0));
        assert!(out.residual.error(&values).unwrap() < 1e-20);
        let x1_hat = out.conditional.solve(&values).unwrap();
        assert!((x1_hat[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_residual_keeps_unexplained_error() {
        let x1 = symbol('x', 1);
        let a = JacobianFactor::new(vec![(x1, one())], scalar(0.0)).unwrap();
        let b = JacobianFactor::new(vec![(x1, one())], scalar(2.0)).unwrap();
        let dims: BTreeMap<Key, usize> = [(x1, 1)].into_iter().collect();
        let out = eliminate_gaussian(&[&a, &b], x1, &[], &dims, 1e-9).unwrap();
        assert!(out.residual.keys().is_empty());
        // min over x of 0.5 (x^2 + (x - 2)^2) = 1
        assert!((out.residual.error(&VectorValues::new()).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rank_deficient_is_an_error() {
        let (x1, x2) = (symbol('x', 1), symbol('x', 2));
        let f = JacobianFactor::new(vec![(x1, DMatrix::zeros(1, 1)), (x2, one())], scalar(1.0)).unwrap();
        let dims: BTreeMap<Key, usize> = [(x1, 1), (x2, 1)].into_iter().collect();
        let err = eliminate_gaussian(&[&f], x1, &[x2], &dims, 1e-9).unwrap_err();
        assert!(matches!(err, HybridError::NumericalDegeneracy { .. }));
    }
}
