//! Discrete conditional probability tables
//!
//! Tables can be written with the compact signature syntax: one row per
//! parent assignment (last parent varying fastest), rows separated by
//! whitespace, child probabilities within a row separated by `/`. Rows are
//! normalized, so `"99/1"` and `"0.99/0.01"` describe the same prior and
//! `"1/2 3/2"` is `P(child | parent)` for a binary parent.

use serde::{Deserialize, Serialize};

use super::factor::DecisionTreeFactor;
use crate::common::keys::{merge_discrete_keys, DiscreteKey, DiscreteKeys};
use crate::common::values::DiscreteValues;
use crate::decision_tree::AlgebraicDecisionTree;
use crate::errors::HybridError;

/// `P(child | parents)` over discrete variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscreteConditional {
    child: DiscreteKey,
    parents: DiscreteKeys,
    table: AlgebraicDecisionTree,
}

impl DiscreteConditional {
    /// Wrap a table over `child` and `parents`
    ///
    /// The table is taken as-is; it is expected to sum to one over the child
    /// for every parent assignment.
    pub fn from_table(child: DiscreteKey, parents: &[DiscreteKey], table: AlgebraicDecisionTree) -> Self {
        Self {
            child,
            parents: parents.iter().copied().collect(),
            table,
        }
    }

    /// Parse a signature string such as `"1/2 3/2"`
    ///
    /// # Arguments
    /// * `child` - Conditioned variable
    /// * `parents` - Parent variables; rows enumerate them with the last parent fastest
    /// * `signature` - Rows of `/`-separated non-negative weights
    pub fn from_signature(
        child: DiscreteKey,
        parents: &[DiscreteKey],
        signature: &str,
    ) -> Result<Self, HybridError> {
        let invalid = |reason: String| HybridError::InvalidSignature {
            signature: signature.to_string(),
            reason,
        };

        let mut rows: Vec<Vec<f64>> = Vec::new();
        for row in signature.split_whitespace() {
            let weights = row
                .split('/')
                .map(|w| w.parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| invalid(format!("row \"{}\": {}", row, e)))?;
            if weights.len() != child.cardinality {
                return Err(invalid(format!(
                    "row \"{}\" has {} entries, child has cardinality {}",
                    row,
                    weights.len(),
                    child.cardinality
                )));
            }
            let total: f64 = weights.iter().sum();
            if weights.iter().any(|w| *w < 0.0 || !w.is_finite()) || total <= 0.0 {
                return Err(invalid(format!("row \"{}\" is not a valid distribution", row)));
            }
            rows.push(weights.iter().map(|w| w / total).collect());
        }

        let expected_rows: usize = parents.iter().map(|dk| dk.cardinality).product();
        if rows.len() != expected_rows {
            return Err(invalid(format!(
                "{} rows given, parents require {}",
                rows.len(),
                expected_rows
            )));
        }

        let mut keys: Vec<DiscreteKey> = parents.to_vec();
        keys.push(child);
        let leaves: Vec<f64> = rows.into_iter().flatten().collect();
        let table = AlgebraicDecisionTree::from_values(&keys, &leaves)?;
        Ok(Self::from_table(child, parents, table))
    }

    /// Prior `P(child)` from a signature such as `"99/1"`
    pub fn prior(child: DiscreteKey, signature: &str) -> Result<Self, HybridError> {
        Self::from_signature(child, &[], signature)
    }

    /// Conditioned variable
    pub fn child(&self) -> DiscreteKey {
        self.child
    }

    /// Conditioning variables, in construction order
    pub fn parents(&self) -> &[DiscreteKey] {
        &self.parents
    }

    /// Child and parents, ascending by key
    pub fn keys(&self) -> DiscreteKeys {
        merge_discrete_keys(&[self.child], &self.parents)
    }

    /// Probability table
    pub fn table(&self) -> &AlgebraicDecisionTree {
        &self.table
    }

    /// `P(child = a[child] | parents = a[parents])`
    pub fn evaluate(&self, assignment: &DiscreteValues) -> Result<f64, HybridError> {
        for dk in self.keys() {
            assignment.value_of(&dk)?;
        }
        self.table.evaluate(assignment).copied()
    }

    /// Negative log probability (`+inf` where the probability is zero)
    pub fn error(&self, assignment: &DiscreteValues) -> Result<f64, HybridError> {
        Ok(-self.evaluate(assignment)?.ln())
    }

    /// Most probable child value given the parents in `assignment`
    ///
    /// Ties resolve to the smallest value.
    pub fn argmax(&self, assignment: &DiscreteValues) -> Result<usize, HybridError> {
        let mut query = assignment.restricted_to(&self.parents);
        let mut best = (0, f64::NEG_INFINITY);
        for value in 0..self.child.cardinality {
            query.insert(self.child.key, value);
            let p = self.evaluate(&query)?;
            if p > best.1 {
                best = (value, p);
            }
        }
        Ok(best.0)
    }

    /// The table as an undirected factor
    pub fn to_factor(&self) -> DecisionTreeFactor {
        DecisionTreeFactor::new(&self.keys(), self.table.clone())
    }

    /// Same variables and probabilities within `tol`
    pub fn equals(&self, other: &DiscreteConditional, tol: f64) -> bool {
        self.child == other.child
            && self.parents == other.parents
            && self.table.equals(&other.table, tol)
    }
}
