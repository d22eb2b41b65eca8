//! Assignments: discrete values, continuous vectors, and their hybrid pair

use std::collections::BTreeMap;
use std::fmt;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use super::keys::{format_key, DiscreteKey, Key};
use crate::errors::HybridError;

/// Discrete assignment: key -> selected value
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscreteValues(BTreeMap<Key, usize>);

impl DiscreteValues {
    /// Empty assignment
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(key, value)` pairs
    pub fn from_pairs<I: IntoIterator<Item = (Key, usize)>>(pairs: I) -> Self {
        Self(pairs.into_iter().collect())
    }

    /// Set the value of a key, returning the previous one
    pub fn insert(&mut self, key: Key, value: usize) -> Option<usize> {
        self.0.insert(key, value)
    }

    /// Remove a key from the assignment
    pub fn remove(&mut self, key: Key) -> Option<usize> {
        self.0.remove(&key)
    }

    /// Value of a key, if assigned
    #[inline]
    pub fn get(&self, key: Key) -> Option<usize> {
        self.0.get(&key).copied()
    }

    /// Whether the key is assigned
    #[inline]
    pub fn contains(&self, key: Key) -> bool {
        self.0.contains_key(&key)
    }

    /// Number of assigned keys
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if nothing is assigned
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(key, value)` in ascending key order
    pub fn iter(&self) -> impl Iterator<Item = (Key, usize)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    /// Value of a discrete key, checking presence and domain
    pub fn value_of(&self, dk: &DiscreteKey) -> Result<usize, HybridError> {
        let value = self
            .get(dk.key)
            .ok_or(HybridError::IncompleteAssignment { key: dk.key })?;
        if value >= dk.cardinality {
            return Err(HybridError::OutOfDomain {
                key: dk.key,
                value,
                cardinality: dk.cardinality,
            });
        }
        Ok(value)
    }

    /// Restriction of this assignment to the given keys
    pub fn restricted_to(&self, keys: &[DiscreteKey]) -> DiscreteValues {
        Self(
            keys.iter()
                .filter_map(|dk| self.get(dk.key).map(|v| (dk.key, v)))
                .collect(),
        )
    }

    /// All assignments to `keys`, ascending by key with the last key varying fastest
    pub fn cartesian_product(keys: &[DiscreteKey]) -> Vec<DiscreteValues> {
        let mut sorted: Vec<DiscreteKey> = keys.to_vec();
        sorted.sort_by_key(|dk| dk.key);
        sorted.dedup_by_key(|dk| dk.key);

        let total: usize = sorted.iter().map(|dk| dk.cardinality).product();
        let mut out = Vec::with_capacity(total);
        for mut index in 0..total {
            let mut assignment = DiscreteValues::new();
            for dk in sorted.iter().rev() {
                assignment.insert(dk.key, index % dk.cardinality);
                index /= dk.cardinality;
            }
            out.push(assignment);
        }
        out
    }
}

impl fmt::Display for DiscreteValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", format_key(k), v)?;
        }
        write!(f, "}}")
    }
}

/// Continuous assignment: key -> vector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorValues(BTreeMap<Key, DVector<f64>>);

impl VectorValues {
    /// Empty assignment
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the vector of a key
    pub fn insert(&mut self, key: Key, value: DVector<f64>) -> Option<DVector<f64>> {
        self.0.insert(key, value)
    }

    /// Vector of a key, if present
    #[inline]
    pub fn get(&self, key: Key) -> Option<&DVector<f64>> {
        self.0.get(&key)
    }

    /// Vector of a key or [`HybridError::MissingValue`]
    pub fn at(&self, key: Key) -> Result<&DVector<f64>, HybridError> {
        self.get(key).ok_or(HybridError::MissingValue { key })
    }

    /// Whether the key has a value
    pub fn contains(&self, key: Key) -> bool {
        self.0.contains_key(&key)
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no variable is stored
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in ascending key order
    pub fn iter(&self) -> impl Iterator<Item = (Key, &DVector<f64>)> + '_ {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    /// Move every entry of `other` into `self`
    pub fn extend(&mut self, other: VectorValues) {
        self.0.extend(other.0);
    }

    /// Same keys and every component within `tol`
    pub fn equals(&self, other: &VectorValues, tol: f64) -> bool {
        self.0.len() == other.0.len()
            && self.0.iter().zip(other.0.iter()).all(|((ka, va), (kb, vb))| {
                ka == kb
                    && va.len() == vb.len()
                    && va.iter().zip(vb.iter()).all(|(a, b)| (a - b).abs() <= tol)
            })
    }
}

/// Result of hybrid optimization: a discrete and a continuous assignment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HybridValues {
    discrete: DiscreteValues,
    continuous: VectorValues,
}

impl HybridValues {
    /// Pair a discrete and a continuous assignment
    pub fn new(discrete: DiscreteValues, continuous: VectorValues) -> Self {
        Self {
            discrete,
            continuous,
        }
    }

    /// Discrete part
    pub fn discrete(&self) -> &DiscreteValues {
        &self.discrete
    }

    /// Continuous part
    pub fn continuous(&self) -> &VectorValues {
        &self.continuous
    }

    /// Split into the two assignments
    pub fn into_parts(self) -> (DiscreteValues, VectorValues) {
        (self.discrete, self.continuous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::keys::symbol;

    #[test]
    fn test_cartesian_product_order() {
        let m1 = DiscreteKey::new(symbol('m', 1), 2);
        let m2 = DiscreteKey::new(symbol('m', 2), 3);
        // Key order given out of order on purpose
        let all = DiscreteValues::cartesian_product(&[m2, m1]);
        assert_eq!(all.len(), 6);
        assert_eq!(all[0].get(m1.key), Some(0));
        assert_eq!(all[0].get(m2.key), Some(0));
        assert_eq!(all[1].get(m2.key), Some(1));
        assert_eq!(all[3].get(m1.key), Some(1));
        assert_eq!(all[3].get(m2.key), Some(0));
    }

    #[test]
    fn test_value_of_checks_domain() {
        let m1 = DiscreteKey::new(symbol('m', 1), 2);
        let mut values = DiscreteValues::new();
        assert_eq!(
            values.value_of(&m1),
            Err(HybridError::IncompleteAssignment { key: m1.key })
        );
        values.insert(m1.key, 5);
        assert!(matches!(
            values.value_of(&m1),
            Err(HybridError::OutOfDomain { value: 5, .. })
        ));
    }

    #[test]
    fn test_vector_values_equals() {
        let mut a = VectorValues::new();
        a.insert(symbol('x', 1), DVector::from_vec(vec![1.0, 2.0]));
        let mut b = a.clone();
        assert!(a.equals(&b, 1e-12));
        b.insert(symbol('x', 1), DVector::from_vec(vec![1.0, 2.0 + 1e-6]));
        assert!(a.equals(&b, 1e-5));
        assert!(!a.equals(&b, 1e-8));
        assert!(matches!(
            a.at(symbol('x', 2)),
            Err(HybridError::MissingValue { .. })
        ));
    }

    #[test]
    fn test_discrete_values_display() {
        let values = DiscreteValues::from_pairs([(symbol('m', 1), 1), (symbol('m', 2), 0)]);
        assert_eq!(values.to_string(), "{m1: 1, m2: 0}");
    }
}
