//! Tolerance-based assertions

use hybrid_bayes_rs::common::values::VectorValues;
use hybrid_bayes_rs::common::keys::{format_key, Key};

/// Whether `a` and `b` differ by at most `tol`
pub fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

/// Assert two scalars are within `tol`, naming the quantity on failure
pub fn assert_scalar_close(actual: f64, expected: f64, tol: f64, name: &str) {
    assert!(
        approx_eq(actual, expected, tol),
        "{}: expected {}, got {} (|diff| = {:.3e}, tol = {:.0e})",
        name,
        expected,
        actual,
        (actual - expected).abs(),
        tol
    );
}

/// Assert the scalar continuous value of `key` is within `tol` of `expected`
pub fn assert_value_close(values: &VectorValues, key: Key, expected: f64, tol: f64) {
    let v = values
        .get(key)
        .unwrap_or_else(|| panic!("{} missing from solution", format_key(key)));
    assert_eq!(v.len(), 1, "{} is not scalar", format_key(key));
    assert_scalar_close(v[0], expected, tol, &format_key(key));
}

/// Assert two solutions have the same keys and values within `tol`
pub fn assert_values_close(actual: &VectorValues, expected: &VectorValues, tol: f64) {
    assert_eq!(actual.len(), expected.len(), "solutions have different sizes");
    for (key, e) in expected.iter() {
        let a = actual
            .get(key)
            .unwrap_or_else(|| panic!("{} missing from solution", format_key(key)));
        for i in 0..e.len() {
            assert_scalar_close(a[i], e[i], tol, &format!("{}[{}]", format_key(key), i));
        }
    }
}
