//! Two unrelated modes, each selecting the mean of its own state
//!
//! `x1 | m1` and `x2 | m2` have mean 0 or 1 with unit noise, and the modes
//! have priors `P(m1) = 6/4` and `P(m2) = 7/3`. The joint over modes is the
//! product of the priors, so the least probable assignment is
//! `{m1: 1, m2: 1}` with probability 0.12.

use hybrid_bayes_rs::common::values::{DiscreteValues, VectorValues};
use hybrid_bayes_rs::config::INFEASIBLE_ERROR;
use hybrid_bayes_rs::decision_tree::AlgebraicDecisionTree;
use hybrid_bayes_rs::discrete::DiscreteConditional;
use hybrid_bayes_rs::gaussian::{GaussianConditional, JacobianFactor};
use hybrid_bayes_rs::hybrid::{GaussianMixture, GaussianMixtureFactor, HybridBayesNet, HybridGaussianFactorGraph};
use nalgebra::{DMatrix, DVector};

use super::switching::{m, x};

/// Mode priors, indexed by mode number minus one
pub const PRIORS: [&str; 2] = ["6/4", "7/3"];

/// Hand-built net: both mixtures, then both priors
pub fn net() -> HybridBayesNet {
    let mut bn = HybridBayesNet::new();
    for i in 1..=2 {
        let component = |mean: f64| {
            GaussianConditional::from_mean_and_sigma(x(i), DVector::from_element(1, mean), Vec::new(), 1.0).unwrap()
        };
        bn.add(GaussianMixture::from_conditionals(x(i), Vec::new(), &[m(i)], vec![component(0.0), component(1.0)]).unwrap());
    }
    for i in 1..=2 {
        bn.add_discrete(m(i), PRIORS[i as usize - 1]).unwrap();
    }
    bn
}

/// Factor graph whose elimination gives the same posterior as [`net`]
pub fn graph() -> HybridGaussianFactorGraph {
    let mut graph = HybridGaussianFactorGraph::new();
    for i in 1..=2 {
        let unary = |mean: f64| {
            JacobianFactor::new(vec![(x(i), DMatrix::identity(1, 1))], DVector::from_element(1, mean)).unwrap()
        };
        graph.add(GaussianMixtureFactor::from_factors(vec![x(i)], &[m(i)], vec![unary(0.0), unary(1.0)]).unwrap());
        graph.add(DiscreteConditional::prior(m(i), PRIORS[i as usize - 1]).unwrap());
    }
    graph
}

/// Both states at 0.5, equally far from either mean
pub fn midpoint() -> VectorValues {
    let mut values = VectorValues::new();
    for i in 1..=2 {
        values.insert(x(i), DVector::from_element(1, 0.5));
    }
    values
}

/// Mode assignments whose error stays below the infeasible sentinel
pub fn feasible_assignments(errors: &AlgebraicDecisionTree) -> Vec<DiscreteValues> {
    DiscreteValues::cartesian_product(&[m(1), m(2)])
        .into_iter()
        .filter(|a| *errors.evaluate(a).unwrap() < INFEASIBLE_ERROR)
        .collect()
}
