//! Switching-chain fixture
//!
//! `K` scalar states `x1..xK` with a tight prior on each, and between every
//! pair of neighbours a two-mode odometry factor selected by a binary mode
//! `m_k`: mode 0 says the state stays put, mode 1 says it moves by one. The
//! graph is linearized around `x_k = k` while the priors put `x_k` at `k - 1`,
//! so the expected deltas are close to -1.
//!
//! Mode transitions: `P(m1) = 1/1` and `P(m_{k+1} | m_k) = "1/2 3/2"`.

use hybrid_bayes_rs::common::keys::{symbol, DiscreteKey, Key};
use hybrid_bayes_rs::discrete::DiscreteConditional;
use hybrid_bayes_rs::gaussian::JacobianFactor;
use hybrid_bayes_rs::hybrid::{GaussianMixtureFactor, HybridGaussianFactorGraph};
use nalgebra::{DMatrix, DVector};

/// Prior noise on every state
pub const PRIOR_SIGMA: f64 = 0.1;

/// Noise of the odometry factors
pub const BETWEEN_SIGMA: f64 = 1.0;

/// Continuous state key
pub fn x(k: u64) -> Key {
    symbol('x', k)
}

/// Binary mode key
pub fn m(k: u64) -> DiscreteKey {
    DiscreteKey::new(symbol('m', k), 2)
}

/// A linearized switching chain
pub struct Switching {
    pub k: u64,
    pub graph: HybridGaussianFactorGraph,
    pub ordering: Vec<Key>,
}

impl Switching {
    /// Build the chain with `k` states and `k - 1` modes
    pub fn new(k: u64) -> Self {
        assert!(k >= 2, "a switching chain needs at least two states");
        let unit = || DMatrix::<f64>::identity(1, 1);
        let mut graph = HybridGaussianFactorGraph::new();

        // Prior x_k = k - 1 linearized at k
        for i in 1..=k {
            graph.add(
                JacobianFactor::with_sigma(vec![(x(i), unit())], DVector::from_element(1, -1.0), PRIOR_SIGMA)
                    .unwrap(),
            );
        }

        // x_{k+1} - x_k = mu with mu = 0 or 1, linearized at unit spacing
        for i in 1..k {
            let between = |mu: f64| {
                JacobianFactor::with_sigma(
                    vec![(x(i), -unit()), (x(i + 1), unit())],
                    DVector::from_element(1, mu - 1.0),
                    BETWEEN_SIGMA,
                )
                .unwrap()
            };
            graph.add(
                GaussianMixtureFactor::from_factors(vec![x(i), x(i + 1)], &[m(i)], vec![between(0.0), between(1.0)])
                    .unwrap(),
            );
        }

        graph.add(DiscreteConditional::prior(m(1), "1/1").unwrap());
        for i in 1..k - 1 {
            graph.add(DiscreteConditional::from_signature(m(i + 1), &[m(i)], "1/2 3/2").unwrap());
        }

        let ordering = (1..=k).map(x).chain((1..k).map(|i| m(i).key)).collect();
        Self { k, graph, ordering }
    }

    /// Mode keys `m1..m(K-1)`
    pub fn modes(&self) -> Vec<DiscreteKey> {
        (1..self.k).map(m).collect()
    }

    /// State keys `x1..xK`
    pub fn states(&self) -> Vec<Key> {
        (1..=self.k).map(x).collect()
    }
}
