//! Discrete factors over finite-domain variables
//!
//! A [`DecisionTreeFactor`] is a non-negative function of a set of discrete
//! keys, stored as an [`AlgebraicDecisionTree`]. It is the currency of
//! discrete sum-product elimination and of the joint-mode computations behind
//! MAP estimation and pruning.

use serde::{Deserialize, Serialize};

use super::conditional::DiscreteConditional;
use crate::common::keys::{merge_discrete_keys, DiscreteKey, DiscreteKeys, Key};
use crate::common::values::DiscreteValues;
use crate::decision_tree::AlgebraicDecisionTree;
use crate::errors::HybridError;

/// Non-negative potential over discrete keys
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeFactor {
    keys: DiscreteKeys,
    tree: AlgebraicDecisionTree,
}

impl DecisionTreeFactor {
    /// Wrap a tree; `keys` must cover every label of `tree`
    pub fn new(keys: &[DiscreteKey], tree: AlgebraicDecisionTree) -> Self {
        Self {
            keys: merge_discrete_keys(keys, &[]),
            tree,
        }
    }

    /// Build from values listed over `keys` (first key most significant)
    pub fn from_values(keys: &[DiscreteKey], values: &[f64]) -> Result<Self, HybridError> {
        Ok(Self::new(keys, AlgebraicDecisionTree::from_values(keys, values)?))
    }

    /// Factor without keys
    pub fn constant(value: f64) -> Self {
        Self::new(&[], AlgebraicDecisionTree::constant(value))
    }

    /// Keys in ascending order
    pub fn keys(&self) -> &[DiscreteKey] {
        &self.keys
    }

    /// Whether `key` is in the factor's scope
    pub fn involves(&self, key: Key) -> bool {
        self.keys.iter().any(|dk| dk.key == key)
    }

    /// Underlying tree
    pub fn tree(&self) -> &AlgebraicDecisionTree {
        &self.tree
    }

    /// Value at an assignment covering the factor's keys
    pub fn evaluate(&self, assignment: &DiscreteValues) -> Result<f64, HybridError> {
        self.tree.evaluate(assignment).copied()
    }

    /// Negative log value at an assignment
    pub fn error(&self, assignment: &DiscreteValues) -> Result<f64, HybridError> {
        Ok(-self.evaluate(assignment)?.ln())
    }

    /// Product of two factors over the union of their keys
    pub fn multiply(&self, other: &DecisionTreeFactor) -> DecisionTreeFactor {
        DecisionTreeFactor {
            keys: merge_discrete_keys(&self.keys, &other.keys),
            tree: self.tree.mul(&other.tree),
        }
    }

    /// Quotient of two factors, `x / 0 = 0`
    pub fn divide(&self, other: &DecisionTreeFactor) -> DecisionTreeFactor {
        DecisionTreeFactor {
            keys: merge_discrete_keys(&self.keys, &other.keys),
            tree: self.tree.div(&other.tree),
        }
    }

    /// Marginalize `dk` by summation
    pub fn sum_out(&self, dk: &DiscreteKey) -> Result<DecisionTreeFactor, HybridError> {
        Ok(DecisionTreeFactor {
            keys: self.keys_without(dk.key),
            tree: self.tree.sum_out(dk)?,
        })
    }

    /// Marginalize `dk` by maximization
    pub fn max_out(&self, dk: &DiscreteKey) -> Result<DecisionTreeFactor, HybridError> {
        Ok(DecisionTreeFactor {
            keys: self.keys_without(dk.key),
            tree: self.tree.max_out(dk)?,
        })
    }

    /// Max-marginal onto `keys`: maximize out every other key of the factor
    pub fn max_onto(&self, keys: &[DiscreteKey]) -> Result<DecisionTreeFactor, HybridError> {
        let mut out = self.clone();
        for dk in self.keys.iter() {
            if !keys.iter().any(|k| k.key == dk.key) {
                out = out.max_out(dk)?;
            }
        }
        Ok(out)
    }

    /// Keep the `max_nr_assignments` largest entries, zero the rest
    pub fn prune(&self, max_nr_assignments: usize) -> Result<DecisionTreeFactor, HybridError> {
        Ok(DecisionTreeFactor {
            keys: self.keys.clone(),
            tree: self.tree.prune(&self.keys, max_nr_assignments)?,
        })
    }

    /// Most probable assignment over the factor's keys and its value
    ///
    /// Ties resolve to the lexicographically smallest assignment.
    pub fn argmax(&self) -> (DiscreteValues, f64) {
        self.tree.argmax(&self.keys)
    }

    /// Rescale so the largest entry is 1 (no-op for an all-zero factor)
    pub fn normalize_max(&self) -> DecisionTreeFactor {
        let max = self.tree.max_value();
        if max > 0.0 && max.is_finite() {
            DecisionTreeFactor {
                keys: self.keys.clone(),
                tree: self.tree.scale(1.0 / max),
            }
        } else {
            self.clone()
        }
    }

    /// Same keys and values within `tol`
    pub fn equals(&self, other: &DecisionTreeFactor, tol: f64) -> bool {
        self.keys == other.keys && self.tree.equals(&other.tree, tol)
    }

    fn keys_without(&self, key: Key) -> DiscreteKeys {
        self.keys.iter().copied().filter(|dk| dk.key != key).collect()
    }
}

/// Sum-product elimination of one discrete key
///
/// # Arguments
/// * `factors` - Every discrete factor mentioning `dk`
/// * `dk` - Key to eliminate
///
/// # Returns
/// `P(dk | separator)` and the separator marginal, rescaled so its largest
/// entry is 1.
pub fn eliminate_discrete(
    factors: &[DecisionTreeFactor],
    dk: &DiscreteKey,
) -> Result<(DiscreteConditional, DecisionTreeFactor), HybridError> {
    let joint = factors
        .iter()
        .fold(DecisionTreeFactor::constant(1.0), |acc, f| acc.multiply(f));
    let marginal = joint.sum_out(dk)?;
    let table = joint.divide(&marginal);
    let parents: DiscreteKeys = marginal.keys().iter().copied().collect();
    let conditional = DiscreteConditional::from_table(*dk, &parents, table.tree().clone());
    Ok((conditional, marginal.normalize_max()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::keys::symbol;

    fn m(i: u64) -> DiscreteKey {
        DiscreteKey::new(symbol('m', i), 2)
    }

    fn assignment(pairs: &[(DiscreteKey, usize)]) -> DiscreteValues {
        DiscreteValues::from_pairs(pairs.iter().map(|(dk, v)| (dk.key, *v)))
    }

    #[test]
    fn test_multiply_merges_keys() {
        let a = DecisionTreeFactor::from_values(&[m(1)], &[0.2, 0.8]).unwrap();
        let b = DecisionTreeFactor::from_values(&[m(2), m(1)], &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let ab = a.multiply(&b);
        assert_eq!(ab.keys(), &[m(1), m(2)]);
        // b(m1=1, m2=0) = 2.0 (m2 most significant in b's listing)
        let v = ab.evaluate(&assignment(&[(m(1), 1), (m(2), 0)])).unwrap();
        assert!((v - 1.6).abs() < 1e-12);
    }

    #[test]
    fn test_max_onto() {
        let f = DecisionTreeFactor::from_values(&[m(1), m(2)], &[0.1, 0.5, 0.3, 0.2]).unwrap();
        let onto = f.max_onto(&[m(2)]).unwrap();
        assert_eq!(onto.keys(), &[m(2)]);
        assert_eq!(onto.evaluate(&assignment(&[(m(2), 0)])).unwrap(), 0.3);
        assert_eq!(onto.evaluate(&assignment(&[(m(2), 1)])).unwrap(), 0.5);
    }

    #[test]
    fn test_eliminate_discrete() {
        let prior = DecisionTreeFactor::from_values(&[m(1)], &[0.5, 0.5]).unwrap();
        let transition =
            DecisionTreeFactor::from_values(&[m(1), m(2)], &[0.25, 0.75, 0.5, 0.5]).unwrap();
        let (conditional, marginal) = eliminate_discrete(&[prior, transition], &m(1)).unwrap();
        assert_eq!(conditional.child(), m(1));
        assert_eq!(conditional.parents(), &[m(2)]);
        // P(m2=0) = 0.375, P(m1=0 | m2=0) = 0.125 / 0.375
        let p = conditional
            .evaluate(&assignment(&[(m(1), 0), (m(2), 0)]))
            .unwrap();
        assert!((p - 1.0 / 3.0).abs() < 1e-12);
        // Marginal rescaled to max 1: (0.375, 0.625) / 0.625
        let r = marginal.evaluate(&assignment(&[(m(2), 0)])).unwrap();
        assert!((r - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_prune_and_argmax() {
        let f = DecisionTreeFactor::from_values(&[m(1), m(2)], &[0.1, 0.5, 0.3, 0.1]).unwrap();
        let (best, value) = f.argmax();
        assert_eq!(best, assignment(&[(m(1), 0), (m(2), 1)]));
        assert_eq!(value, 0.5);
        let pruned = f.prune(1).unwrap();
        assert_eq!(pruned.evaluate(&assignment(&[(m(1), 1), (m(2), 0)])).unwrap(), 0.0);
        assert_eq!(pruned.evaluate(&best).unwrap(), 0.5);
    }
}
