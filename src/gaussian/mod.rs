//! Linear Gaussian substrate
//!
//! Whitened Jacobian factors, square-root-information conditionals, QR
//! elimination of a single variable, and Gaussian Bayes nets.

pub mod bayes_net;
pub mod conditional;
pub mod elimination;
pub mod factor;

pub use bayes_net::GaussianBayesNet;
pub use conditional::GaussianConditional;
pub use elimination::{eliminate_gaussian, GaussianElimination};
pub use factor::JacobianFactor;
