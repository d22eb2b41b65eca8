/*!
# hybrid-bayes-rs - Hybrid discrete-continuous inference

Rust implementation of variable elimination over hybrid Gaussian factor
graphs: graphs whose variables are either continuous vectors or discrete
modes, with factors that may be Gaussian, discrete, or Gaussian mixtures
selected by discrete modes.

## Features

- Algebraic decision trees with structural sharing
- Sequential elimination into a [`HybridBayesNet`]
- Multifrontal elimination into a [`HybridBayesTree`]
- MAP optimization, per-assignment error surfaces, and pruning of unlikely modes
- JSON and bincode round trips of every result

## Modules

- [`hybrid`] - Factor graphs, elimination, Bayes nets and Bayes trees
- [`decision_tree`] - Decision trees over discrete assignments
- [`discrete`] - Discrete factors and conditionals
- [`gaussian`] - Linear Gaussian factors, conditionals and Bayes nets
- [`common`] - Keys and value containers

## Example

```rust
use hybrid_bayes_rs::{symbol, DiscreteKey, HybridGaussianFactorGraph, JacobianFactor,
    GaussianMixtureFactor, DiscreteConditional};
use nalgebra::{DMatrix, DVector};

let x1 = symbol('x', 1);
let m1 = DiscreteKey::new(symbol('m', 1), 2);

// Two hypotheses for x1: near 0 or near 3
let hypothesis = |mean: f64| {
    JacobianFactor::new(vec![(x1, DMatrix::identity(1, 1))], DVector::from_element(1, mean)).unwrap()
};

let mut graph = HybridGaussianFactorGraph::new();
graph.add(GaussianMixtureFactor::from_factors(vec![x1], &[m1], vec![hypothesis(0.0), hypothesis(3.0)]).unwrap());
graph.add(JacobianFactor::new(vec![(x1, DMatrix::identity(1, 1))], DVector::from_element(1, 2.5)).unwrap());
graph.add(DiscreteConditional::prior(m1, "1/1").unwrap());

let bayes_net = graph.eliminate_sequential(&graph.hybrid_ordering()).unwrap();
let map = bayes_net.optimize().unwrap();
assert_eq!(map.discrete().get(m1.key), Some(1));
```
*/

// ============================================================================
// Core modules
// ============================================================================

/// Keys, assignments and shared numerical helpers
pub mod common;

/// Decision trees over discrete assignments
pub mod decision_tree;

/// Discrete factors and conditionals
pub mod discrete;

/// Linear Gaussian substrate
pub mod gaussian;

/// Hybrid factor graphs, elimination, Bayes nets and Bayes trees
///
/// This is the main module:
/// - Graph: `HybridGaussianFactorGraph`
/// - Results: `HybridBayesNet`, `HybridBayesTree`
/// - Conditionals: `HybridConditional`, `GaussianMixture`
pub mod hybrid;

// ============================================================================
// Ambient modules
// ============================================================================

/// Elimination settings and numerical constants
pub mod config;

/// Error types
pub mod errors;

/// Observability callbacks for elimination
pub mod reporter;

/// JSON and bincode encodings
pub mod serialization;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// Keys and values
pub use common::{
    format_key, symbol, symbol_chr, symbol_index, DiscreteKey, DiscreteKeys, DiscreteValues, HybridValues, Key,
    VectorValues,
};

// Configuration
pub use config::{EliminationConfig, EliminationConfigBuilder, INFEASIBLE_ERROR};

// Errors
pub use errors::{ConditionalKind, HybridError};

// Building blocks
pub use decision_tree::{AlgebraicDecisionTree, DecisionTree};
pub use discrete::{DecisionTreeFactor, DiscreteConditional};
pub use gaussian::{GaussianBayesNet, GaussianConditional, JacobianFactor};

// Hybrid inference
pub use hybrid::{
    EliminationState, GaussianMixture, GaussianMixtureFactor, HybridBayesNet, HybridBayesTree, HybridClique,
    HybridConditional, HybridFactor, HybridGaussianFactorGraph, MixtureComponent, SequentialEliminator,
};

// Reporters
pub use reporter::{CompositeReporter, DebugReporter, EliminationReporter, LoggingReporter, NoOpReporter};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
