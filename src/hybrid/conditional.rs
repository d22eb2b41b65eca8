//! Conditionals stored in a hybrid Bayes net
//!
//! [`HybridConditional`] is a closed sum of the three conditional kinds. Every
//! kind can report an error for a hybrid assignment and an error tree over
//! its discrete keys, so nets and trees combine them without caring which
//! kind they hold.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::mixture::GaussianMixture;
use crate::common::keys::{format_key, DiscreteKey, DiscreteKeys, Key};
use crate::common::values::{DiscreteValues, VectorValues};
use crate::config::INFEASIBLE_ERROR;
use crate::decision_tree::AlgebraicDecisionTree;
use crate::discrete::DiscreteConditional;
use crate::errors::{ConditionalKind, HybridError};
use crate::gaussian::GaussianConditional;

/// A discrete, continuous, or mixture conditional
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HybridConditional {
    /// `P(m | parents)` over discrete keys
    Discrete(Arc<DiscreteConditional>),
    /// `p(x | parents)` over continuous keys
    Continuous(Arc<GaussianConditional>),
    /// `p(x | parents, m)` with discrete parents `m`
    Hybrid(Arc<GaussianMixture>),
}

impl HybridConditional {
    /// Kind tag
    pub fn kind(&self) -> ConditionalKind {
        match self {
            HybridConditional::Discrete(_) => ConditionalKind::Discrete,
            HybridConditional::Continuous(_) => ConditionalKind::Continuous,
            HybridConditional::Hybrid(_) => ConditionalKind::Hybrid,
        }
    }

    /// True for discrete conditionals
    pub fn is_discrete(&self) -> bool {
        matches!(self, HybridConditional::Discrete(_))
    }

    /// True for Gaussian conditionals
    pub fn is_continuous(&self) -> bool {
        matches!(self, HybridConditional::Continuous(_))
    }

    /// True for Gaussian mixtures
    pub fn is_hybrid(&self) -> bool {
        matches!(self, HybridConditional::Hybrid(_))
    }

    /// The conditioned variable
    pub fn frontal(&self) -> Key {
        match self {
            HybridConditional::Discrete(c) => c.child().key,
            HybridConditional::Continuous(c) => c.frontal(),
            HybridConditional::Hybrid(m) => m.frontal(),
        }
    }

    /// Continuous variables, frontal first when continuous
    pub fn continuous_keys(&self) -> Vec<Key> {
        match self {
            HybridConditional::Discrete(_) => Vec::new(),
            HybridConditional::Continuous(c) => c.keys(),
            HybridConditional::Hybrid(m) => std::iter::once(m.frontal())
                .chain(m.continuous_parents().iter().copied())
                .collect(),
        }
    }

    /// Discrete variables, ascending
    pub fn discrete_keys(&self) -> DiscreteKeys {
        match self {
            HybridConditional::Discrete(c) => c.keys(),
            HybridConditional::Continuous(_) => DiscreteKeys::new(),
            HybridConditional::Hybrid(m) => {
                let mut keys: DiscreteKeys = m.discrete_parents().iter().copied().collect();
                keys.sort_by_key(|dk: &DiscreteKey| dk.key);
                keys
            }
        }
    }

    /// Error contributed at a hybrid assignment
    ///
    /// Gaussian and mixture conditionals give their quadratic error. Discrete
    /// conditionals only signal feasibility: 0 where the probability is
    /// positive and [`INFEASIBLE_ERROR`] where it has been pruned to zero.
    pub fn error(&self, values: &VectorValues, assignment: &DiscreteValues) -> Result<f64, HybridError> {
        match self {
            HybridConditional::Discrete(c) => Ok(feasibility(c.evaluate(assignment)?)),
            HybridConditional::Continuous(c) => c.error(values),
            HybridConditional::Hybrid(m) => m.error(values, assignment),
        }
    }

    /// Error at `values` for every assignment of this conditional's discrete keys
    pub fn error_tree(&self, values: &VectorValues) -> Result<AlgebraicDecisionTree, HybridError> {
        match self {
            HybridConditional::Discrete(c) => Ok(c.table().map(|p| feasibility(*p))),
            HybridConditional::Continuous(c) => Ok(AlgebraicDecisionTree::constant(c.error(values)?)),
            HybridConditional::Hybrid(m) => m.error_tree(values),
        }
    }

    /// Discrete conditional, if that is what this is
    pub fn as_discrete(&self) -> Option<&Arc<DiscreteConditional>> {
        match self {
            HybridConditional::Discrete(c) => Some(c),
            _ => None,
        }
    }

    /// Gaussian conditional, if that is what this is
    pub fn as_continuous(&self) -> Option<&Arc<GaussianConditional>> {
        match self {
            HybridConditional::Continuous(c) => Some(c),
            _ => None,
        }
    }

    /// Gaussian mixture, if that is what this is
    pub fn as_mixture(&self) -> Option<&Arc<GaussianMixture>> {
        match self {
            HybridConditional::Hybrid(m) => Some(m),
            _ => None,
        }
    }

    /// Same kind and contents within `tol`
    pub fn equals(&self, other: &HybridConditional, tol: f64) -> bool {
        match (self, other) {
            (HybridConditional::Discrete(a), HybridConditional::Discrete(b)) => a.equals(b, tol),
            (HybridConditional::Continuous(a), HybridConditional::Continuous(b)) => a.equals(b, tol),
            (HybridConditional::Hybrid(a), HybridConditional::Hybrid(b)) => a.equals(b, tol),
            _ => false,
        }
    }
}

#[inline]
fn feasibility(probability: f64) -> f64 {
    if probability > 0.0 {
        0.0
    } else {
        INFEASIBLE_ERROR
    }
}

impl From<DiscreteConditional> for HybridConditional {
    fn from(c: DiscreteConditional) -> Self {
        HybridConditional::Discrete(Arc::new(c))
    }
}

impl From<GaussianConditional> for HybridConditional {
    fn from(c: GaussianConditional) -> Self {
        HybridConditional::Continuous(Arc::new(c))
    }
}

impl From<GaussianMixture> for HybridConditional {
    fn from(m: GaussianMixture) -> Self {
        HybridConditional::Hybrid(Arc::new(m))
    }
}

impl fmt::Display for HybridConditional {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let continuous: Vec<String> = self.continuous_keys().into_iter().skip(1).map(format_key).collect();
        let discrete: Vec<String> = self
            .discrete_keys()
            .iter()
            .filter(|dk| dk.key != self.frontal())
            .map(|dk| format_key(dk.key))
            .collect();
        let parents: Vec<String> = continuous.into_iter().chain(discrete).collect();
        if parents.is_empty() {
            write!(f, "{} P({})", self.kind(), format_key(self.frontal()))
        } else {
            write!(
                f,
                "{} P({} | {})",
                self.kind(),
                format_key(self.frontal()),
                parents.join(", ")
            )
        }
    }
}
