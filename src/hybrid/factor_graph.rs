//! Hybrid Gaussian factor graph
//!
//! A bag of [`HybridFactor`]s and the entry points for eliminating it. Every
//! entry point comes in two flavours: a plain one using
//! [`EliminationConfig::default`] and a [`NoOpReporter`], and a `_with`
//! variant taking both explicitly.
//!
//! # Example
//!
//! ```
//! use hybrid_bayes_rs::common::keys::symbol;
//! use hybrid_bayes_rs::gaussian::JacobianFactor;
//! use hybrid_bayes_rs::hybrid::HybridGaussianFactorGraph;
//! use nalgebra::{DMatrix, DVector};
//!
//! let x1 = symbol('x', 1);
//! let mut graph = HybridGaussianFactorGraph::new();
//! graph.add(JacobianFactor::new(vec![(x1, DMatrix::identity(1, 1))], DVector::from_element(1, 2.0)).unwrap());
//!
//! let bayes_net = graph.eliminate_sequential(&graph.hybrid_ordering()).unwrap();
//! let solution = bayes_net.optimize().unwrap();
//! assert!((solution.continuous().at(x1).unwrap()[0] - 2.0).abs() < 1e-12);
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::bayes_net::HybridBayesNet;
use super::bayes_tree::HybridBayesTree;
use super::elimination::{EliminationContext, SequentialEliminator};
use super::factor::HybridFactor;
use super::junction_tree;
use crate::common::keys::{merge_discrete_keys, DiscreteKeys, Key};
use crate::common::values::{DiscreteValues, VectorValues};
use crate::config::{saturate_error, EliminationConfig};
use crate::errors::HybridError;
use crate::reporter::{EliminationReporter, NoOpReporter};

/// Factor graph over continuous and discrete variables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HybridGaussianFactorGraph {
    factors: Vec<HybridFactor>,
}

impl HybridGaussianFactorGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a factor
    pub fn add(&mut self, factor: impl Into<HybridFactor>) {
        self.factors.push(factor.into());
    }

    /// Add every factor of `other`
    pub fn push_back(&mut self, other: &HybridGaussianFactorGraph) {
        self.factors.extend(other.factors.iter().cloned());
    }

    /// Factors in insertion order
    pub fn factors(&self) -> &[HybridFactor] {
        &self.factors
    }

    /// Number of factors
    pub fn len(&self) -> usize {
        self.factors.len()
    }

    /// Whether the graph has no factors
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Every variable, ascending
    pub fn keys(&self) -> BTreeSet<Key> {
        self.factors.iter().flat_map(|f| f.keys()).collect()
    }

    /// Continuous variables, ascending
    pub fn continuous_keys(&self) -> BTreeSet<Key> {
        self.factors
            .iter()
            .flat_map(|f| f.continuous_keys().iter().copied())
            .collect()
    }

    /// Discrete variables, ascending
    pub fn discrete_keys(&self) -> DiscreteKeys {
        self.factors
            .iter()
            .fold(DiscreteKeys::new(), |keys, f| merge_discrete_keys(&keys, f.discrete_keys()))
    }

    /// Default ordering: continuous variables ascending, then discrete ascending
    pub fn hybrid_ordering(&self) -> Vec<Key> {
        self.continuous_keys()
            .into_iter()
            .chain(self.discrete_keys().iter().map(|dk| dk.key))
            .collect()
    }

    /// Sum of factor errors at a hybrid assignment, saturated at the sentinel
    pub fn error(&self, values: &VectorValues, assignment: &DiscreteValues) -> Result<f64, HybridError> {
        let mut total = 0.0;
        for factor in &self.factors {
            total += factor.error(values, assignment)?;
        }
        Ok(saturate_error(total))
    }

    // ========================================================================
    // Sequential elimination
    // ========================================================================

    /// Eliminate every variable into a Bayes net
    ///
    /// # Errors
    /// [`HybridError::InvalidOrdering`] if the ordering repeats a variable,
    /// eliminates a discrete variable too early, or leaves a variable out.
    pub fn eliminate_sequential(&self, ordering: &[Key]) -> Result<HybridBayesNet, HybridError> {
        self.eliminate_sequential_with(ordering, &EliminationConfig::default(), &mut NoOpReporter)
    }

    /// [`Self::eliminate_sequential`] with explicit settings and reporter
    pub fn eliminate_sequential_with<R: EliminationReporter>(
        &self,
        ordering: &[Key],
        config: &EliminationConfig,
        reporter: &mut R,
    ) -> Result<HybridBayesNet, HybridError> {
        let (bayes_net, remaining) = self.eliminate_partial_sequential_with(ordering, config, reporter)?;
        check_fully_eliminated(&remaining)?;
        Ok(bayes_net)
    }

    /// Eliminate the variables in `ordering` and keep what is left
    ///
    /// # Returns
    /// The Bayes net over the ordered variables and the graph over the rest.
    pub fn eliminate_partial_sequential(
        &self,
        ordering: &[Key],
    ) -> Result<(HybridBayesNet, HybridGaussianFactorGraph), HybridError> {
        self.eliminate_partial_sequential_with(ordering, &EliminationConfig::default(), &mut NoOpReporter)
    }

    /// [`Self::eliminate_partial_sequential`] with explicit settings and reporter
    pub fn eliminate_partial_sequential_with<R: EliminationReporter>(
        &self,
        ordering: &[Key],
        config: &EliminationConfig,
        reporter: &mut R,
    ) -> Result<(HybridBayesNet, HybridGaussianFactorGraph), HybridError> {
        let eliminator = SequentialEliminator::new(self.factors.clone(), ordering, *config, reporter)?;
        let (conditionals, factors, _) = eliminator.run()?;
        Ok((
            conditionals.into_iter().collect(),
            HybridGaussianFactorGraph { factors },
        ))
    }

    // ========================================================================
    // Multifrontal elimination
    // ========================================================================

    /// Eliminate every variable into a Bayes tree
    pub fn eliminate_multifrontal(&self, ordering: &[Key]) -> Result<HybridBayesTree, HybridError> {
        self.eliminate_multifrontal_with(ordering, &EliminationConfig::default(), &mut NoOpReporter)
    }

    /// [`Self::eliminate_multifrontal`] with explicit settings and reporter
    pub fn eliminate_multifrontal_with<R: EliminationReporter>(
        &self,
        ordering: &[Key],
        config: &EliminationConfig,
        reporter: &mut R,
    ) -> Result<HybridBayesTree, HybridError> {
        let (bayes_tree, remaining) = self.eliminate_partial_multifrontal_with(ordering, config, reporter)?;
        check_fully_eliminated(&remaining)?;
        Ok(bayes_tree)
    }

    /// Eliminate the variables in `ordering` into cliques and keep what is left
    pub fn eliminate_partial_multifrontal(
        &self,
        ordering: &[Key],
    ) -> Result<(HybridBayesTree, HybridGaussianFactorGraph), HybridError> {
        self.eliminate_partial_multifrontal_with(ordering, &EliminationConfig::default(), &mut NoOpReporter)
    }

    /// [`Self::eliminate_partial_multifrontal`] with explicit settings and reporter
    pub fn eliminate_partial_multifrontal_with<R: EliminationReporter>(
        &self,
        ordering: &[Key],
        config: &EliminationConfig,
        reporter: &mut R,
    ) -> Result<(HybridBayesTree, HybridGaussianFactorGraph), HybridError> {
        let context = EliminationContext::from_factors(&self.factors, *config)?;
        let (bayes_tree, factors) =
            junction_tree::eliminate_multifrontal(self.factors.clone(), ordering, &context, reporter)?;
        Ok((bayes_tree, HybridGaussianFactorGraph { factors }))
    }
}

impl FromIterator<HybridFactor> for HybridGaussianFactorGraph {
    fn from_iter<I: IntoIterator<Item = HybridFactor>>(iter: I) -> Self {
        Self {
            factors: iter.into_iter().collect(),
        }
    }
}

/// Full elimination must consume every variable
fn check_fully_eliminated(remaining: &HybridGaussianFactorGraph) -> Result<(), HybridError> {
    match remaining.keys().into_iter().next() {
        Some(key) => Err(HybridError::InvalidOrdering {
            key,
            reason: "variable missing from the ordering".to_string(),
        }),
        None => Ok(()),
    }
}
