//! Gaussian mixture conditionals
//!
//! A [`GaussianMixture`] is `p(x_f | x_parents, m)`: one Gaussian conditional
//! per assignment of its discrete parents `m`, stored in a decision tree. All
//! components share the same continuous scope. A `None` leaf marks a branch
//! that has been pruned; it evaluates to [`INFEASIBLE_ERROR`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::common::keys::{format_key, DiscreteKey, DiscreteKeys, Key};
use crate::common::values::{DiscreteValues, VectorValues};
use crate::config::INFEASIBLE_ERROR;
use crate::decision_tree::{AlgebraicDecisionTree, DecisionTree};
use crate::discrete::DecisionTreeFactor;
use crate::errors::HybridError;
use crate::gaussian::GaussianConditional;

/// Leaf of a mixture: a component, or `None` once pruned
pub type MixtureLeaf = Option<Arc<GaussianConditional>>;

/// Discrete-indexed family of Gaussian conditionals with a shared scope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianMixture {
    frontal: Key,
    continuous_parents: Vec<Key>,
    discrete_parents: DiscreteKeys,
    conditionals: DecisionTree<MixtureLeaf>,
}

impl GaussianMixture {
    /// Create a mixture, checking that every component has the same scope
    ///
    /// # Arguments
    /// * `frontal` - Continuous child
    /// * `continuous_parents` - Continuous parents shared by every component
    /// * `discrete_parents` - Keys the tree may branch on
    /// * `conditionals` - Component per discrete assignment
    pub fn new(
        frontal: Key,
        continuous_parents: Vec<Key>,
        discrete_parents: &[DiscreteKey],
        conditionals: DecisionTree<MixtureLeaf>,
    ) -> Result<Self, HybridError> {
        for (label, cardinality) in conditionals.labels() {
            if !discrete_parents
                .iter()
                .any(|dk| dk.key == label && dk.cardinality == cardinality)
            {
                return Err(HybridError::MalformedMixture {
                    description: format!(
                        "tree branches on {} which is not a discrete parent of {}",
                        format_key(label),
                        format_key(frontal)
                    ),
                });
            }
        }

        let mut expected: Vec<Key> = continuous_parents.clone();
        expected.sort_unstable();
        let mut dim = None;
        let mut problem = None;
        conditionals.visit_with_assignment(|assignment, leaf| {
            let Some(c) = leaf else { return };
            if problem.is_some() {
                return;
            }
            let mut parents: Vec<Key> = c.parent_keys().collect();
            parents.sort_unstable();
            if c.frontal() != frontal || parents != expected {
                problem = Some(format!(
                    "component at {} has scope {:?}, expected frontal {} with parents {:?}",
                    assignment,
                    c.keys().into_iter().map(format_key).collect::<Vec<_>>(),
                    format_key(frontal),
                    expected.iter().copied().map(format_key).collect::<Vec<_>>()
                ));
            } else if *dim.get_or_insert(c.dim()) != c.dim() {
                problem = Some(format!("component at {} has dimension {}", assignment, c.dim()));
            }
        });
        if let Some(description) = problem {
            return Err(HybridError::MalformedMixture { description });
        }

        Ok(Self {
            frontal,
            continuous_parents,
            discrete_parents: discrete_parents.iter().copied().collect(),
            conditionals,
        })
    }

    /// Create from one component per assignment of `discrete_parents`
    ///
    /// Components are listed with the first discrete parent most significant.
    pub fn from_conditionals(
        frontal: Key,
        continuous_parents: Vec<Key>,
        discrete_parents: &[DiscreteKey],
        components: Vec<GaussianConditional>,
    ) -> Result<Self, HybridError> {
        let leaves = components.into_iter().map(|c| Some(Arc::new(c))).collect();
        let tree = DecisionTree::from_leaves(discrete_parents, leaves)?;
        Self::new(frontal, continuous_parents, discrete_parents, tree)
    }

    /// Continuous child
    pub fn frontal(&self) -> Key {
        self.frontal
    }

    /// Continuous parents
    pub fn continuous_parents(&self) -> &[Key] {
        &self.continuous_parents
    }

    /// Discrete parents
    pub fn discrete_parents(&self) -> &[DiscreteKey] {
        &self.discrete_parents
    }

    /// Component tree
    pub fn conditionals(&self) -> &DecisionTree<MixtureLeaf> {
        &self.conditionals
    }

    /// Number of component branches that are still feasible
    pub fn nr_feasible(&self) -> usize {
        let mut count = 0;
        self.conditionals.visit_with_assignment(|_, leaf| {
            if leaf.is_some() {
                count += 1;
            }
        });
        count
    }

    fn check_assignment(&self, assignment: &DiscreteValues) -> Result<(), HybridError> {
        for dk in &self.discrete_parents {
            assignment.value_of(dk)?;
        }
        Ok(())
    }

    /// Component selected by a discrete assignment
    ///
    /// Fails with [`HybridError::InfeasibleBranch`] if that branch was pruned.
    pub fn conditional(&self, assignment: &DiscreteValues) -> Result<Arc<GaussianConditional>, HybridError> {
        self.check_assignment(assignment)?;
        self.conditionals
            .evaluate(assignment)?
            .clone()
            .ok_or(HybridError::InfeasibleBranch { key: self.frontal })
    }

    /// Error of the selected component, or [`INFEASIBLE_ERROR`] if pruned
    pub fn error(&self, values: &VectorValues, assignment: &DiscreteValues) -> Result<f64, HybridError> {
        self.check_assignment(assignment)?;
        match self.conditionals.evaluate(assignment)? {
            Some(c) => c.error(values),
            None => Ok(INFEASIBLE_ERROR),
        }
    }

    /// Error of every component at `values`, as a tree over the discrete parents
    pub fn error_tree(&self, values: &VectorValues) -> Result<AlgebraicDecisionTree, HybridError> {
        self.conditionals.try_map(|leaf| match leaf {
            Some(c) => c.error(values),
            None => Ok(INFEASIBLE_ERROR),
        })
    }

    /// Unnormalized likelihood `exp(-error)` of every component at `values`
    pub fn likelihood(&self, values: &VectorValues) -> Result<AlgebraicDecisionTree, HybridError> {
        Ok(self.error_tree(values)?.map(|e| (-e).exp()))
    }

    /// Drop every component with no surviving assignment in `joint`
    ///
    /// `joint` is the pruned joint discrete distribution; a component stays
    /// when at least one full assignment extending its branch keeps positive
    /// mass. Topology over the discrete parents is kept.
    pub fn prune(&self, joint: &DecisionTreeFactor) -> Result<Self, HybridError> {
        let mask = joint.max_onto(&self.discrete_parents)?;
        let conditionals = self.conditionals.apply2(mask.tree(), |leaf, alive| {
            if *alive > 0.0 {
                leaf.clone()
            } else {
                None
            }
        });
        Ok(Self {
            frontal: self.frontal,
            continuous_parents: self.continuous_parents.clone(),
            discrete_parents: self.discrete_parents.clone(),
            conditionals,
        })
    }

    /// Same scope and components within `tol`
    pub fn equals(&self, other: &GaussianMixture, tol: f64) -> bool {
        self.frontal == other.frontal
            && self.continuous_parents == other.continuous_parents
            && self.discrete_parents == other.discrete_parents
            && self
                .conditionals
                .equals_by(&other.conditionals, |a, b| match (a, b) {
                    (Some(a), Some(b)) => a.equals(b, tol),
                    (None, None) => true,
                    _ => false,
                })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::keys::symbol;
    use nalgebra::{DMatrix, DVector};

    fn x(i: u64) -> Key {
        symbol('x', i)
    }

    fn m1() -> DiscreteKey {
        DiscreteKey::new(symbol('m', 1), 2)
    }

    fn component(mean: f64, sigma: f64) -> GaussianConditional {
        GaussianConditional::from_mean_and_sigma(
            x(1),
            DVector::from_element(1, mean),
            vec![(x(2), DMatrix::identity(1, 1))],
            sigma,
        )
        .unwrap()
    }

    fn mixture() -> GaussianMixture {
        GaussianMixture::from_conditionals(x(1), vec![x(2)], &[m1()], vec![component(0.0, 1.0), component(1.0, 1.0)])
            .unwrap()
    }

    fn values(x1: f64, x2: f64) -> VectorValues {
        let mut v = VectorValues::new();
        v.insert(x(1), DVector::from_element(1, x1));
        v.insert(x(2), DVector::from_element(1, x2));
        v
    }

    #[test]
    fn test_select_component() {
        let mix = mixture();
        let a = DiscreteValues::from_pairs([(m1().key, 1)]);
        let c = mix.conditional(&a).unwrap();
        assert!((c.d()[0] - 1.0).abs() < 1e-12);
        assert_eq!(
            mix.conditional(&DiscreteValues::new()).unwrap_err(),
            HybridError::IncompleteAssignment { key: m1().key }
        );
    }

    #[test]
    fn test_error_tree_matches_scalar_error() {
        let mix = mixture();
        let v = values(3.0, 2.0);
        let tree = mix.error_tree(&v).unwrap();
        for value in 0..2 {
            let a = DiscreteValues::from_pairs([(m1().key, value)]);
            assert_eq!(*tree.evaluate(&a).unwrap(), mix.error(&v, &a).unwrap());
        }
        // x1 - x2 = 1 is exactly the moving component
        let moving = DiscreteValues::from_pairs([(m1().key, 1)]);
        assert!(mix.error(&v, &moving).unwrap() < 1e-20);
        let lik = mix.likelihood(&v).unwrap();
        assert!((*lik.evaluate(&moving).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_prune_marks_infeasible() {
        let mix = mixture();
        let joint = DecisionTreeFactor::from_values(&[m1()], &[0.0, 1.0]).unwrap();
        let pruned = mix.prune(&joint).unwrap();
        assert_eq!(pruned.nr_feasible(), 1);
        let still = DiscreteValues::from_pairs([(m1().key, 0)]);
        assert_eq!(pruned.error(&values(0.0, 0.0), &still).unwrap(), INFEASIBLE_ERROR);
        assert_eq!(
            pruned.conditional(&still).unwrap_err(),
            HybridError::InfeasibleBranch { key: x(1) }
        );
    }

    #[test]
    fn test_rejects_mismatched_scope() {
        let other = GaussianConditional::from_mean_and_sigma(x(1), DVector::zeros(1), Vec::new(), 1.0).unwrap();
        let err = GaussianMixture::from_conditionals(x(1), vec![x(2)], &[m1()], vec![component(0.0, 1.0), other])
            .unwrap_err();
        assert!(matches!(err, HybridError::MalformedMixture { .. }));
    }
}
