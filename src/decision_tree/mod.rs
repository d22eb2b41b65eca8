//! Decision trees indexed by discrete assignments
//!
//! - [`tree`]: generic immutable tree with shared subtrees
//! - [`algebraic`]: scalar-leaf trees used as error and probability surfaces

pub mod algebraic;
pub mod tree;

pub use algebraic::AlgebraicDecisionTree;
pub use tree::{DecisionTree, Node};
