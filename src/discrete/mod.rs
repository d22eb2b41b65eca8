//! Discrete factors and conditionals

pub mod conditional;
pub mod factor;

pub use conditional::DiscreteConditional;
pub use factor::{eliminate_discrete, DecisionTreeFactor};
