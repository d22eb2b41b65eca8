//! Keys, assignments and low-level numerical helpers shared by every module.

pub mod keys;
pub mod linalg;
pub mod values;

pub use keys::{format_key, symbol, symbol_chr, symbol_index, DiscreteKey, DiscreteKeys, Key};
pub use values::{DiscreteValues, HybridValues, VectorValues};
