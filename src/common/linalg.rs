//! Linear algebra utilities
//!
//! Small helpers for the triangular factors produced by QR elimination.

use nalgebra::{DMatrix, DVector};

/// Log of the absolute determinant of an upper-triangular matrix
///
/// # Arguments
/// * `r` - Square upper-triangular matrix
///
/// # Returns
/// `sum(ln|r_ii|)`, `-inf` if any pivot is zero
pub fn log_abs_det_upper(r: &DMatrix<f64>) -> f64 {
    r.diagonal().iter().map(|v| v.abs().ln()).sum()
}

/// Solve `R x = rhs` for upper-triangular `R`
///
/// Returns `None` when a pivot is exactly zero.
pub fn solve_upper_triangular(r: &DMatrix<f64>, rhs: &DVector<f64>) -> Option<DVector<f64>> {
    r.solve_upper_triangular(rhs)
}

/// Flip the sign of every row whose diagonal entry is negative
///
/// Householder QR leaves the sign of each pivot arbitrary; the triangular
/// factor of a Gaussian conditional is kept with a positive diagonal so two
/// eliminations of the same system compare equal.
pub fn make_diagonal_positive(augmented: &mut DMatrix<f64>, nr_pivots: usize) {
    for i in 0..nr_pivots.min(augmented.nrows()) {
        if augmented[(i, i)] < 0.0 {
            for j in 0..augmented.ncols() {
                augmented[(i, j)] = -augmented[(i, j)];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_abs_det_upper() {
        let r = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 0.0, -3.0]);
        assert!((log_abs_det_upper(&r) - 6.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_make_diagonal_positive() {
        let mut ab = DMatrix::from_row_slice(2, 3, &[-2.0, 1.0, 4.0, 0.0, -1.0, 1.0]);
        make_diagonal_positive(&mut ab, 1);
        assert_eq!(ab.row(0).iter().copied().collect::<Vec<_>>(), vec![2.0, -1.0, -4.0]);
        // Only the requested pivots are touched
        assert_eq!(ab[(1, 1)], -1.0);
    }
}
