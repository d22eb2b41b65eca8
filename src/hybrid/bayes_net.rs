//! Hybrid Bayes net
//!
//! An ordered list of [`HybridConditional`]s as produced by sequential
//! elimination: every conditional's parents are frontal in a later conditional.
//! Discrete conditionals come last and define the posterior over modes;
//! Gaussian and mixture conditionals define the continuous posterior given a
//! mode assignment.
//!
//! # Inference
//!
//! - [`HybridBayesNet::optimize`] finds the most probable discrete assignment
//!   from the product of discrete conditionals, then back-substitutes.
//! - [`HybridBayesNet::error_tree`] gives the error of a continuous point for
//!   every discrete assignment at once.
//! - [`HybridBayesNet::prune`] keeps the most probable assignments and marks
//!   every other branch infeasible.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::conditional::HybridConditional;
use super::mixture::GaussianMixture;
use crate::common::keys::{merge_discrete_keys, DiscreteKey, DiscreteKeys, Key};
use crate::common::values::{DiscreteValues, HybridValues, VectorValues};
use crate::config::saturate_error;
use crate::decision_tree::AlgebraicDecisionTree;
use crate::discrete::{eliminate_discrete, DecisionTreeFactor, DiscreteConditional};
use crate::errors::{ConditionalKind, HybridError};
use crate::gaussian::{GaussianBayesNet, GaussianConditional};

/// Ordered sequence of hybrid conditionals
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HybridBayesNet {
    conditionals: Vec<HybridConditional>,
}

impl HybridBayesNet {
    /// Create an empty Bayes net
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a conditional; ordering is the caller's responsibility
    pub fn add(&mut self, conditional: impl Into<HybridConditional>) {
        self.conditionals.push(conditional.into());
    }

    /// Append a discrete prior parsed from a signature such as `"99/1"`
    pub fn add_discrete(&mut self, key: DiscreteKey, signature: &str) -> Result<(), HybridError> {
        self.add(DiscreteConditional::prior(key, signature)?);
        Ok(())
    }

    /// Append a discrete conditional parsed from a signature such as `"1/2 3/2"`
    pub fn add_discrete_conditional(
        &mut self,
        child: DiscreteKey,
        parents: &[DiscreteKey],
        signature: &str,
    ) -> Result<(), HybridError> {
        self.add(DiscreteConditional::from_signature(child, parents, signature)?);
        Ok(())
    }

    /// Append every conditional of `other`
    pub fn push_back(&mut self, other: &HybridBayesNet) {
        self.conditionals.extend(other.conditionals.iter().cloned());
    }

    /// Number of conditionals
    pub fn len(&self) -> usize {
        self.conditionals.len()
    }

    /// Whether the net is empty
    pub fn is_empty(&self) -> bool {
        self.conditionals.is_empty()
    }

    /// Conditionals in stored order
    pub fn iter(&self) -> impl Iterator<Item = &HybridConditional> {
        self.conditionals.iter()
    }

    /// Conditional at `index`
    pub fn at(&self, index: usize) -> Result<&HybridConditional, HybridError> {
        self.conditionals.get(index).ok_or(HybridError::IndexOutOfBounds {
            index,
            len: self.conditionals.len(),
        })
    }

    /// Discrete conditional at `index`
    pub fn at_discrete(&self, index: usize) -> Result<&Arc<DiscreteConditional>, HybridError> {
        let c = self.at(index)?;
        c.as_discrete().ok_or_else(|| type_mismatch(index, ConditionalKind::Discrete, c))
    }

    /// Gaussian conditional at `index`
    pub fn at_gaussian(&self, index: usize) -> Result<&Arc<GaussianConditional>, HybridError> {
        let c = self.at(index)?;
        c.as_continuous().ok_or_else(|| type_mismatch(index, ConditionalKind::Continuous, c))
    }

    /// Gaussian mixture at `index`
    pub fn at_mixture(&self, index: usize) -> Result<&Arc<GaussianMixture>, HybridError> {
        let c = self.at(index)?;
        c.as_mixture().ok_or_else(|| type_mismatch(index, ConditionalKind::Hybrid, c))
    }

    /// Every discrete key mentioned by any conditional, ascending
    pub fn discrete_keys(&self) -> DiscreteKeys {
        discrete_keys_of(&self.conditionals)
    }

    // ========================================================================
    // Inference
    // ========================================================================

    /// Gaussian Bayes net for one discrete assignment
    ///
    /// Gaussian conditionals are kept, mixtures are replaced by the selected
    /// component and discrete conditionals are dropped.
    ///
    /// # Errors
    /// [`HybridError::IncompleteAssignment`] if a mixture's discrete parent is
    /// missing from `assignment`, [`HybridError::InfeasibleBranch`] if the
    /// selected component was pruned.
    pub fn choose(&self, assignment: &DiscreteValues) -> Result<GaussianBayesNet, HybridError> {
        choose_from(&self.conditionals, assignment)
    }

    /// Continuous solution for a fixed discrete assignment
    pub fn optimize_given(&self, assignment: &DiscreteValues) -> Result<VectorValues, HybridError> {
        self.choose(assignment)?.optimize()
    }

    /// Joint discrete distribution: product of all discrete conditionals
    pub fn discrete_joint(&self) -> DecisionTreeFactor {
        discrete_joint_of(&self.conditionals)
    }

    /// MAP estimate
    ///
    /// The discrete part is the argmax of [`Self::discrete_joint`]; ties go to
    /// the lexicographically smallest assignment. The continuous part is the
    /// back-substituted solution for that assignment.
    pub fn optimize(&self) -> Result<HybridValues, HybridError> {
        let (assignment, _) = self.discrete_joint().tree().argmax(&self.discrete_keys());
        let continuous = self.optimize_given(&assignment)?;
        Ok(HybridValues::new(assignment, continuous))
    }

    /// Error of `values` for every assignment of the net's discrete keys
    ///
    /// Gaussian errors are shared by every branch, mixture errors follow their
    /// branch and discrete conditionals only add [`INFEASIBLE_ERROR`] on
    /// zero-probability branches. Leaves saturate at the sentinel.
    ///
    /// [`INFEASIBLE_ERROR`]: crate::config::INFEASIBLE_ERROR
    pub fn error_tree(&self, values: &VectorValues) -> Result<AlgebraicDecisionTree, HybridError> {
        error_tree_of(&self.conditionals, values)
    }

    /// Error at one hybrid assignment
    ///
    /// On feasible branches this is the sum of per-conditional errors. A pruned
    /// branch saturates at [`INFEASIBLE_ERROR`] however many conditionals
    /// reject it.
    ///
    /// [`INFEASIBLE_ERROR`]: crate::config::INFEASIBLE_ERROR
    pub fn error(&self, values: &VectorValues, assignment: &DiscreteValues) -> Result<f64, HybridError> {
        error_of(&self.conditionals, values, assignment)
    }

    /// Keep the `max_nr_leaves` most probable discrete assignments
    ///
    /// The discrete conditionals are replaced by a chain-rule factorization of
    /// the pruned joint, appended after the continuous part, so exactly the
    /// surviving assignments keep positive probability. Every mixture
    /// component that no surviving assignment reaches is nulled; mixture
    /// topology is left unchanged.
    pub fn prune(&self, max_nr_leaves: usize) -> Result<HybridBayesNet, HybridError> {
        let joint = self.discrete_joint().prune(max_nr_leaves)?;
        log::debug!(
            "Pruning Bayes net to {} of {} discrete assignments",
            max_nr_leaves,
            DiscreteValues::cartesian_product(joint.keys()).len()
        );
        let mut conditionals = self
            .conditionals
            .iter()
            .filter(|c| !c.is_discrete())
            .map(|c| prune_conditional(c, &joint))
            .collect::<Result<Vec<_>, _>>()?;
        let chain = discrete_chain(&joint, &discrete_children(&self.conditionals))?;
        conditionals.extend(chain.into_iter().map(HybridConditional::from));
        Ok(HybridBayesNet { conditionals })
    }

    /// Same conditionals, in order, within `tol`
    pub fn equals(&self, other: &HybridBayesNet, tol: f64) -> bool {
        self.len() == other.len()
            && self
                .conditionals
                .iter()
                .zip(&other.conditionals)
                .all(|(a, b)| a.equals(b, tol))
    }
}

impl FromIterator<HybridConditional> for HybridBayesNet {
    fn from_iter<I: IntoIterator<Item = HybridConditional>>(iter: I) -> Self {
        Self {
            conditionals: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for HybridBayesNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "HybridBayesNet of size {}", self.len())?;
        for (i, c) in self.conditionals.iter().enumerate() {
            writeln!(f, "  [{}] {}", i, c)?;
        }
        Ok(())
    }
}

fn type_mismatch(index: usize, expected: ConditionalKind, actual: &HybridConditional) -> HybridError {
    HybridError::TypeMismatch {
        index,
        expected,
        actual: actual.kind(),
    }
}

// ============================================================================
// Shared by nets and trees
// ============================================================================

pub(crate) fn discrete_keys_of<'a>(conditionals: impl IntoIterator<Item = &'a HybridConditional>) -> DiscreteKeys {
    conditionals
        .into_iter()
        .fold(DiscreteKeys::new(), |keys, c| merge_discrete_keys(&keys, &c.discrete_keys()))
}

pub(crate) fn choose_from<'a>(
    conditionals: impl IntoIterator<Item = &'a HybridConditional>,
    assignment: &DiscreteValues,
) -> Result<GaussianBayesNet, HybridError> {
    let mut net = GaussianBayesNet::new();
    for conditional in conditionals {
        match conditional {
            HybridConditional::Discrete(_) => {}
            HybridConditional::Continuous(c) => net.push(c.clone()),
            HybridConditional::Hybrid(m) => net.push(m.conditional(assignment)?),
        }
    }
    Ok(net)
}

pub(crate) fn discrete_joint_of<'a>(conditionals: impl IntoIterator<Item = &'a HybridConditional>) -> DecisionTreeFactor {
    conditionals
        .into_iter()
        .filter_map(|c| c.as_discrete())
        .fold(DecisionTreeFactor::constant(1.0), |joint, c| joint.multiply(&c.to_factor()))
}

pub(crate) fn error_tree_of<'a>(
    conditionals: impl IntoIterator<Item = &'a HybridConditional>,
    values: &VectorValues,
) -> Result<AlgebraicDecisionTree, HybridError> {
    let mut total = AlgebraicDecisionTree::constant(0.0);
    for conditional in conditionals {
        total = total.add(&conditional.error_tree(values)?);
    }
    Ok(total.map(|e| saturate_error(*e)))
}

pub(crate) fn error_of<'a>(
    conditionals: impl IntoIterator<Item = &'a HybridConditional>,
    values: &VectorValues,
    assignment: &DiscreteValues,
) -> Result<f64, HybridError> {
    let mut total = 0.0;
    for conditional in conditionals {
        total += conditional.error(values, assignment)?;
    }
    Ok(saturate_error(total))
}

/// Null the mixture components no assignment surviving in `joint` reaches
pub(crate) fn prune_conditional(
    conditional: &HybridConditional,
    joint: &DecisionTreeFactor,
) -> Result<HybridConditional, HybridError> {
    Ok(match conditional {
        HybridConditional::Hybrid(m) => m.prune(joint)?.into(),
        other => other.clone(),
    })
}

/// Children of the discrete conditionals, first occurrence order
pub(crate) fn discrete_children<'a>(conditionals: impl IntoIterator<Item = &'a HybridConditional>) -> Vec<Key> {
    let mut order = Vec::new();
    for c in conditionals.into_iter().filter_map(|c| c.as_discrete()) {
        let key = c.child().key;
        if !order.contains(&key) {
            order.push(key);
        }
    }
    order
}

/// Chain-rule factorization of a discrete joint
///
/// Keys are eliminated in `order`, each giving `P(key | later keys)`; keys of
/// `joint` missing from `order` follow in ascending order. The product of the
/// returned conditionals is `joint` up to scale, zeros included.
pub(crate) fn discrete_chain(
    joint: &DecisionTreeFactor,
    order: &[Key],
) -> Result<Vec<DiscreteConditional>, HybridError> {
    let mut keys: Vec<DiscreteKey> = order
        .iter()
        .filter_map(|k| joint.keys().iter().find(|dk| dk.key == *k).copied())
        .collect();
    for dk in joint.keys() {
        if !keys.contains(dk) {
            keys.push(*dk);
        }
    }

    let mut remaining = joint.clone();
    let mut chain = Vec::with_capacity(keys.len());
    for dk in &keys {
        let (conditional, marginal) = eliminate_discrete(std::slice::from_ref(&remaining), dk)?;
        chain.push(conditional);
        remaining = marginal;
    }
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::keys::symbol;
    use crate::config::INFEASIBLE_ERROR;
    use nalgebra::DVector;

    fn m(i: u64) -> DiscreteKey {
        DiscreteKey::new(symbol('m', i), 2)
    }

    /// x1 | m1 with mean 0 or 3, then P(m1) = 1/4
    fn net() -> HybridBayesNet {
        let x1 = symbol('x', 1);
        let component = |mean: f64| {
            GaussianConditional::from_mean_and_sigma(x1, DVector::from_element(1, mean), Vec::new(), 1.0).unwrap()
        };
        let mut bn = HybridBayesNet::new();
        bn.add(GaussianMixture::from_conditionals(x1, Vec::new(), &[m(1)], vec![component(0.0), component(3.0)]).unwrap());
        bn.add_discrete(m(1), "1/4").unwrap();
        bn
    }

    #[test]
    fn test_typed_accessors() {
        let bn = net();
        assert!(bn.at_mixture(0).is_ok());
        assert!(bn.at_discrete(1).is_ok());
        assert_eq!(
            bn.at_gaussian(0).unwrap_err(),
            HybridError::TypeMismatch {
                index: 0,
                expected: ConditionalKind::Continuous,
                actual: ConditionalKind::Hybrid,
            }
        );
        assert_eq!(
            bn.at(5).unwrap_err(),
            HybridError::IndexOutOfBounds { index: 5, len: 2 }
        );
    }

    #[test]
    fn test_optimize_picks_most_probable_mode() {
        let result = net().optimize().unwrap();
        assert_eq!(result.discrete().get(m(1).key), Some(1));
        let x1 = result.continuous().at(symbol('x', 1)).unwrap();
        assert!((x1[0] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_choose_requires_full_assignment() {
        let err = net().choose(&DiscreteValues::new()).unwrap_err();
        assert_eq!(err, HybridError::IncompleteAssignment { key: m(1).key });
    }

    #[test]
    fn test_prune_keeps_best() {
        let pruned = net().prune(1).unwrap();
        let mut values = VectorValues::new();
        values.insert(symbol('x', 1), DVector::from_element(1, 3.0));
        let tree = pruned.error_tree(&values).unwrap();
        let a0 = DiscreteValues::from_pairs([(m(1).key, 0)]);
        let a1 = DiscreteValues::from_pairs([(m(1).key, 1)]);
        assert_eq!(*tree.evaluate(&a0).unwrap(), INFEASIBLE_ERROR);
        assert!(tree.evaluate(&a1).unwrap().abs() < 1e-12);
        assert_eq!(pruned.at_mixture(0).unwrap().nr_feasible(), 1);
    }

    #[test]
    fn test_discrete_chain_reproduces_joint() {
        let joint = DecisionTreeFactor::from_values(&[m(1), m(2)], &[0.42, 0.0, 0.28, 0.12]).unwrap();
        let chain = discrete_chain(&joint, &[m(2).key]).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].child(), m(2));
        assert_eq!(chain[0].parents(), &[m(1)]);
        assert!(chain[1].parents().is_empty());

        let product = chain
            .iter()
            .fold(DecisionTreeFactor::constant(1.0), |acc, c| acc.multiply(&c.to_factor()));
        for a in DiscreteValues::cartesian_product(&[m(1), m(2)]) {
            let expected = joint.evaluate(&a).unwrap() / 0.82;
            assert!((product.evaluate(&a).unwrap() - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_push_back_and_display() {
        let mut bn = net();
        let other = net();
        bn.push_back(&other);
        assert_eq!(bn.len(), 4);
        let text = bn.to_string();
        assert!(text.starts_with("HybridBayesNet of size 4"));
        assert!(text.contains("hybrid P(x1 | m1)"));
    }
}
