//! Decision trees with scalar leaves
//!
//! [`AlgebraicDecisionTree`] is the error / probability surface over discrete
//! assignments. Arithmetic combines trees over the union of their labels.

use std::ops::{Add, Mul};

use super::tree::{DecisionTree, Node};
use crate::common::keys::{DiscreteKey, Key};
use crate::common::values::DiscreteValues;
use crate::errors::HybridError;

/// Decision tree with `f64` leaves
pub type AlgebraicDecisionTree = DecisionTree<f64>;

impl DecisionTree<f64> {
    /// Tree that is `value` everywhere
    pub fn constant(value: f64) -> Self {
        Self::leaf(value)
    }

    /// Build from values listed over `keys` (first key most significant)
    pub fn from_values(keys: &[DiscreteKey], values: &[f64]) -> Result<Self, HybridError> {
        Self::from_leaves(keys, values.to_vec())
    }

    /// Leaf-wise sum
    pub fn add(&self, other: &Self) -> Self {
        self.apply2(other, |a, b| a + b)
    }

    /// Leaf-wise product
    pub fn mul(&self, other: &Self) -> Self {
        self.apply2(other, |a, b| a * b)
    }

    /// Leaf-wise quotient, with `x / 0 = 0`
    pub fn div(&self, other: &Self) -> Self {
        self.apply2(other, |a, b| if *b == 0.0 { 0.0 } else { a / b })
    }

    /// Multiply every leaf by `factor`
    pub fn scale(&self, factor: f64) -> Self {
        self.map(|v| v * factor)
    }

    /// Sum over the values of `dk`
    ///
    /// A key the tree does not branch on contributes a factor of its cardinality.
    pub fn sum_out(&self, dk: &DiscreteKey) -> Result<Self, HybridError> {
        self.combine_out(dk, |a, b| a + b)
    }

    /// Maximum over the values of `dk`
    pub fn max_out(&self, dk: &DiscreteKey) -> Result<Self, HybridError> {
        self.combine_out(dk, f64::max)
    }

    fn combine_out(&self, dk: &DiscreteKey, op: impl Fn(f64, f64) -> f64) -> Result<Self, HybridError> {
        let mut acc = self.choose(dk.key, 0)?;
        for value in 1..dk.cardinality {
            let branch = self.choose(dk.key, value)?;
            acc = acc.apply2(&branch, |a, b| op(*a, *b));
        }
        Ok(acc)
    }

    /// Smallest leaf value
    pub fn min_value(&self) -> f64 {
        let mut best = f64::INFINITY;
        self.visit_with_assignment(|_, v| best = best.min(*v));
        best
    }

    /// Largest leaf value
    pub fn max_value(&self) -> f64 {
        let mut best = f64::NEG_INFINITY;
        self.visit_with_assignment(|_, v| best = best.max(*v));
        best
    }

    /// Assignment with the largest value over `keys`
    ///
    /// Single walk from the root, keeping the first strictly larger value, so
    /// ties resolve to the lexicographically smallest assignment. Keys in
    /// `keys` the winning path does not branch on are set to 0.
    pub fn argmax(&self, keys: &[DiscreteKey]) -> (DiscreteValues, f64) {
        fn go(node: &Node<f64>, path: &mut Vec<(Key, usize)>) -> f64 {
            match node {
                Node::Leaf(v) => *v,
                Node::Choice { label, branches } => {
                    let mut best: Option<(f64, Vec<(Key, usize)>)> = None;
                    for (value, branch) in branches.iter().enumerate() {
                        let mut sub = vec![(*label, value)];
                        let v = go(branch, &mut sub);
                        let better = match &best {
                            None => true,
                            Some((b, _)) => v > *b,
                        };
                        if better {
                            best = Some((v, sub));
                        }
                    }
                    match best {
                        Some((v, sub)) => {
                            path.extend(sub);
                            v
                        }
                        None => f64::NEG_INFINITY,
                    }
                }
            }
        }
        let mut assignment = DiscreteValues::from_pairs(keys.iter().map(|dk| (dk.key, 0)));
        let mut path = Vec::new();
        let value = go(self.root(), &mut path);
        for (key, v) in path {
            assignment.insert(key, v);
        }
        (assignment, value)
    }

    /// Keep the `max_nr_leaves` largest assignments over `keys`, zero the rest
    ///
    /// Only strictly positive values survive. Ties are broken by enumeration
    /// order (ascending key, last key fastest). `keys` must cover every label.
    pub fn prune(&self, keys: &[DiscreteKey], max_nr_leaves: usize) -> Result<Self, HybridError> {
        let mut sorted: Vec<DiscreteKey> = keys.to_vec();
        sorted.sort_by_key(|dk| dk.key);
        sorted.dedup_by_key(|dk| dk.key);

        let values = DiscreteValues::cartesian_product(&sorted)
            .iter()
            .map(|a| self.evaluate(a).copied())
            .collect::<Result<Vec<f64>, _>>()?;

        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));

        let mut pruned = vec![0.0; values.len()];
        for &index in order.iter().take(max_nr_leaves) {
            if values[index] > 0.0 {
                pruned[index] = values[index];
            }
        }
        Self::from_values(&sorted, &pruned)
    }

    /// Leaf-wise equality within `tol`
    pub fn equals(&self, other: &Self, tol: f64) -> bool {
        self.equals_by(other, |a, b| a == b || (a - b).abs() <= tol)
    }
}

impl Add for &AlgebraicDecisionTree {
    type Output = AlgebraicDecisionTree;

    fn add(self, rhs: Self) -> AlgebraicDecisionTree {
        AlgebraicDecisionTree::add(self, rhs)
    }
}

impl Mul for &AlgebraicDecisionTree {
    type Output = AlgebraicDecisionTree;

    fn mul(self, rhs: Self) -> AlgebraicDecisionTree {
        AlgebraicDecisionTree::mul(self, rhs)
    }
}
