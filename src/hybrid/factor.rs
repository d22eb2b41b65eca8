//! Factors of a hybrid Gaussian factor graph

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::mixture_factor::GaussianMixtureFactor;
use crate::common::keys::{DiscreteKey, Key};
use crate::common::values::{DiscreteValues, VectorValues};
use crate::config::INFEASIBLE_ERROR;
use crate::decision_tree::AlgebraicDecisionTree;
use crate::discrete::{DecisionTreeFactor, DiscreteConditional};
use crate::errors::HybridError;
use crate::gaussian::JacobianFactor;

/// A purely continuous, purely discrete, or mixture factor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HybridFactor {
    /// Linear Gaussian factor
    Gaussian(Arc<JacobianFactor>),
    /// Potential over discrete keys
    Discrete(Arc<DecisionTreeFactor>),
    /// Linear factors selected by discrete keys
    Mixture(Arc<GaussianMixtureFactor>),
}

impl HybridFactor {
    /// Continuous variables
    pub fn continuous_keys(&self) -> &[Key] {
        match self {
            HybridFactor::Gaussian(f) => f.keys(),
            HybridFactor::Discrete(_) => &[],
            HybridFactor::Mixture(f) => f.continuous_keys(),
        }
    }

    /// Discrete variables
    pub fn discrete_keys(&self) -> &[DiscreteKey] {
        match self {
            HybridFactor::Gaussian(_) => &[],
            HybridFactor::Discrete(f) => f.keys(),
            HybridFactor::Mixture(f) => f.discrete_keys(),
        }
    }

    /// All variables, continuous first
    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.continuous_keys()
            .iter()
            .copied()
            .chain(self.discrete_keys().iter().map(|dk| dk.key))
    }

    /// Whether the factor mentions `key`
    pub fn involves(&self, key: Key) -> bool {
        self.keys().any(|k| k == key)
    }

    /// Error at a hybrid assignment
    ///
    /// Discrete factors contribute their negative log value, with zero
    /// entries mapped to [`INFEASIBLE_ERROR`].
    pub fn error(&self, values: &VectorValues, assignment: &DiscreteValues) -> Result<f64, HybridError> {
        match self {
            HybridFactor::Gaussian(f) => f.error(values),
            HybridFactor::Discrete(f) => Ok(discrete_error(f.evaluate(assignment)?)),
            HybridFactor::Mixture(f) => f.error(values, assignment),
        }
    }

    /// Error at `values` for every assignment of the factor's discrete keys
    pub fn error_tree(&self, values: &VectorValues) -> Result<AlgebraicDecisionTree, HybridError> {
        match self {
            HybridFactor::Gaussian(f) => Ok(AlgebraicDecisionTree::constant(f.error(values)?)),
            HybridFactor::Discrete(f) => Ok(f.tree().map(|p| discrete_error(*p))),
            HybridFactor::Mixture(f) => f.error_tree(values),
        }
    }
}

fn discrete_error(value: f64) -> f64 {
    if value > 0.0 {
        (-value.ln()).min(INFEASIBLE_ERROR)
    } else {
        INFEASIBLE_ERROR
    }
}

impl From<JacobianFactor> for HybridFactor {
    fn from(f: JacobianFactor) -> Self {
        HybridFactor::Gaussian(Arc::new(f))
    }
}

impl From<DecisionTreeFactor> for HybridFactor {
    fn from(f: DecisionTreeFactor) -> Self {
        HybridFactor::Discrete(Arc::new(f))
    }
}

impl From<GaussianMixtureFactor> for HybridFactor {
    fn from(f: GaussianMixtureFactor) -> Self {
        HybridFactor::Mixture(Arc::new(f))
    }
}

impl From<DiscreteConditional> for HybridFactor {
    fn from(c: DiscreteConditional) -> Self {
        HybridFactor::Discrete(Arc::new(c.to_factor()))
    }
}
