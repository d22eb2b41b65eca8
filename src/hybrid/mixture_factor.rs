//! Gaussian mixture factors
//!
//! Undirected counterpart of [`GaussianMixture`](super::mixture::GaussianMixture):
//! one linear factor per discrete assignment, plus a per-branch constant error
//! carrying normalization terms accumulated during hybrid elimination.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::common::keys::{format_key, DiscreteKey, DiscreteKeys, Key};
use crate::common::values::{DiscreteValues, VectorValues};
use crate::config::INFEASIBLE_ERROR;
use crate::decision_tree::{AlgebraicDecisionTree, DecisionTree};
use crate::errors::HybridError;
use crate::gaussian::JacobianFactor;

/// One branch of a mixture factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixtureComponent {
    /// Linear factor for this branch
    pub factor: Arc<JacobianFactor>,
    /// Additional branch-dependent error
    pub constant: f64,
}

impl MixtureComponent {
    /// Component with zero constant
    pub fn new(factor: JacobianFactor) -> Self {
        Self {
            factor: Arc::new(factor),
            constant: 0.0,
        }
    }

    /// `factor.error(values) + constant`
    pub fn error(&self, values: &VectorValues) -> Result<f64, HybridError> {
        Ok(self.factor.error(values)? + self.constant)
    }
}

/// Linear factors selected by discrete keys
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianMixtureFactor {
    continuous_keys: Vec<Key>,
    discrete_keys: DiscreteKeys,
    components: DecisionTree<Option<MixtureComponent>>,
}

impl GaussianMixtureFactor {
    /// Create, checking every component stays within `continuous_keys`
    pub fn new(
        continuous_keys: Vec<Key>,
        discrete_keys: &[DiscreteKey],
        components: DecisionTree<Option<MixtureComponent>>,
    ) -> Result<Self, HybridError> {
        if continuous_keys.is_empty() {
            return Err(HybridError::MalformedMixture {
                description: "mixture factor without continuous keys".to_string(),
            });
        }
        let mut problem = None;
        components.visit_with_assignment(|assignment, leaf| {
            if let Some(component) = leaf {
                if let Some(key) = component
                    .factor
                    .keys()
                    .iter()
                    .find(|k| !continuous_keys.contains(*k))
                {
                    problem.get_or_insert(format!(
                        "component at {} involves {} outside the factor scope",
                        assignment,
                        format_key(*key)
                    ));
                }
            }
        });
        if let Some(description) = problem {
            return Err(HybridError::MalformedMixture { description });
        }
        Ok(Self {
            continuous_keys,
            discrete_keys: discrete_keys.iter().copied().collect(),
            components,
        })
    }

    /// Create from one factor per assignment of `discrete_keys` (first key most significant)
    pub fn from_factors(
        continuous_keys: Vec<Key>,
        discrete_keys: &[DiscreteKey],
        factors: Vec<JacobianFactor>,
    ) -> Result<Self, HybridError> {
        let leaves = factors
            .into_iter()
            .map(|f| Some(MixtureComponent::new(f)))
            .collect();
        let tree = DecisionTree::from_leaves(discrete_keys, leaves)?;
        Self::new(continuous_keys, discrete_keys, tree)
    }

    /// Continuous variables
    pub fn continuous_keys(&self) -> &[Key] {
        &self.continuous_keys
    }

    /// Discrete variables
    pub fn discrete_keys(&self) -> &[DiscreteKey] {
        &self.discrete_keys
    }

    /// Component tree
    pub fn components(&self) -> &DecisionTree<Option<MixtureComponent>> {
        &self.components
    }

    /// Error of every branch at `values`; pruned branches give [`INFEASIBLE_ERROR`]
    pub fn error_tree(&self, values: &VectorValues) -> Result<AlgebraicDecisionTree, HybridError> {
        self.components.try_map(|leaf| match leaf {
            Some(component) => component.error(values),
            None => Ok(INFEASIBLE_ERROR),
        })
    }

    /// Error of the branch selected by `assignment`
    pub fn error(&self, values: &VectorValues, assignment: &DiscreteValues) -> Result<f64, HybridError> {
        for dk in &self.discrete_keys {
            assignment.value_of(dk)?;
        }
        match self.components.evaluate(assignment)? {
            Some(component) => component.error(values),
            None => Ok(INFEASIBLE_ERROR),
        }
    }

    /// Same scope and components within `tol`
    pub fn equals(&self, other: &GaussianMixtureFactor, tol: f64) -> bool {
        self.continuous_keys == other.continuous_keys
            && self.discrete_keys == other.discrete_keys
            && self.components.equals_by(&other.components, |a, b| match (a, b) {
                (Some(a), Some(b)) => {
                    (a.constant - b.constant).abs() <= tol && a.factor.equals(&b.factor, tol)
                }
                (None, None) => true,
                _ => false,
            })
    }
}
