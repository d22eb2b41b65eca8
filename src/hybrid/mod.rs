//! Hybrid discrete-continuous inference
//!
//! Factor graphs mixing linear Gaussian factors, discrete potentials and
//! discrete-indexed Gaussian mixtures, their sequential and multifrontal
//! elimination, and the resulting Bayes nets and Bayes trees.

pub mod bayes_net;
pub mod bayes_tree;
pub mod conditional;
pub mod elimination;
pub mod factor;
pub mod factor_graph;
mod junction_tree;
pub mod mixture;
pub mod mixture_factor;

pub use bayes_net::HybridBayesNet;
pub use bayes_tree::{HybridBayesTree, HybridClique};
pub use conditional::HybridConditional;
pub use elimination::{EliminationState, SequentialEliminator};
pub use factor::HybridFactor;
pub use factor_graph::HybridGaussianFactorGraph;
pub use mixture::{GaussianMixture, MixtureLeaf};
pub use mixture_factor::{GaussianMixtureFactor, MixtureComponent};
