//! Error types for hybrid elimination and inference
//!
//! Construction-time problems (bad orderings, malformed mixtures, degenerate
//! pivots) are reported through [`HybridError`]. Evaluation-time infeasibility
//! of pruned branches is NOT an error: it is encoded as
//! [`INFEASIBLE_ERROR`](crate::config::INFEASIBLE_ERROR) so decision-tree algebra
//! stays total.

use std::fmt;

use crate::common::keys::{format_key, Key};

/// Kind of a conditional stored in a hybrid Bayes net
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionalKind {
    /// Conditional probability table over discrete variables
    Discrete,
    /// Linear-Gaussian conditional over continuous variables
    Continuous,
    /// Gaussian mixture keyed by discrete parents
    Hybrid,
}

impl fmt::Display for ConditionalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionalKind::Discrete => write!(f, "discrete"),
            ConditionalKind::Continuous => write!(f, "continuous"),
            ConditionalKind::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Errors that can occur while building or querying hybrid models
#[derive(Debug, Clone, PartialEq)]
pub enum HybridError {
    /// The elimination ordering cannot be executed
    InvalidOrdering {
        /// Offending key
        key: Key,
        /// Why the ordering is rejected
        reason: String,
    },

    /// A typed accessor found a conditional of a different kind
    TypeMismatch {
        /// Position in the Bayes net
        index: usize,
        /// Kind the caller asked for
        expected: ConditionalKind,
        /// Kind actually stored
        actual: ConditionalKind,
    },

    /// A discrete assignment is missing a required key
    IncompleteAssignment {
        /// The missing discrete key
        key: Key,
    },

    /// A discrete assignment uses a value outside the key's domain
    OutOfDomain {
        /// Discrete key
        key: Key,
        /// Assigned value
        value: usize,
        /// Cardinality of the key
        cardinality: usize,
    },

    /// A pruned branch was selected where a concrete conditional is required
    InfeasibleBranch {
        /// Frontal key of the mixture whose branch is pruned
        key: Key,
    },

    /// Rank-deficient elimination step
    NumericalDegeneracy {
        /// Variable being eliminated
        key: Key,
        /// Description of the failure
        context: String,
    },

    /// Dimension mismatch between expected and actual
    DimensionMismatch {
        /// What was expected
        expected: usize,
        /// What was received
        actual: usize,
        /// Context (e.g., "rhs rows", "leaf count")
        context: String,
    },

    /// A continuous value required for evaluation is absent
    MissingValue {
        /// The missing continuous key
        key: Key,
    },

    /// A Gaussian mixture whose components do not share one scope
    MalformedMixture {
        /// Description of the inconsistency
        description: String,
    },

    /// Index past the end of a Bayes net or clique list
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Number of stored elements
        len: usize,
    },

    /// A variable in the ordering has no adjacent factors and improper
    /// variables are disallowed by the configuration
    ImproperVariable {
        /// The unconstrained key
        key: Key,
    },

    /// A conditional probability table string could not be parsed
    InvalidSignature {
        /// The offending signature
        signature: String,
        /// What is wrong with it
        reason: String,
    },

    /// Serialization or deserialization failed
    Serialization {
        /// Underlying encoder message
        description: String,
    },
}

impl fmt::Display for HybridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HybridError::InvalidOrdering { key, reason } => {
                write!(f, "Invalid ordering at {}: {}", format_key(*key), reason)
            }
            HybridError::TypeMismatch {
                index,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Type mismatch at index {}: expected {} conditional, found {}",
                    index, expected, actual
                )
            }
            HybridError::IncompleteAssignment { key } => {
                write!(f, "Discrete assignment is missing key {}", format_key(*key))
            }
            HybridError::OutOfDomain {
                key,
                value,
                cardinality,
            } => {
                write!(
                    f,
                    "Value {} out of domain for {} (cardinality {})",
                    value,
                    format_key(*key),
                    cardinality
                )
            }
            HybridError::InfeasibleBranch { key } => {
                write!(f, "Selected branch of {} has been pruned", format_key(*key))
            }
            HybridError::NumericalDegeneracy { key, context } => {
                write!(
                    f,
                    "Numerical degeneracy eliminating {}: {}",
                    format_key(*key),
                    context
                )
            }
            HybridError::DimensionMismatch {
                expected,
                actual,
                context,
            } => {
                write!(
                    f,
                    "Dimension mismatch for {}: expected {}, got {}",
                    context, expected, actual
                )
            }
            HybridError::MissingValue { key } => {
                write!(f, "No continuous value for {}", format_key(*key))
            }
            HybridError::MalformedMixture { description } => {
                write!(f, "Malformed mixture: {}", description)
            }
            HybridError::IndexOutOfBounds { index, len } => {
                write!(f, "Index {} out of bounds (len {})", index, len)
            }
            HybridError::ImproperVariable { key } => {
                write!(f, "Variable {} has no adjacent factors", format_key(*key))
            }
            HybridError::InvalidSignature { signature, reason } => {
                write!(f, "Invalid signature \"{}\": {}", signature, reason)
            }
            HybridError::Serialization { description } => {
                write!(f, "Serialization failed: {}", description)
            }
        }
    }
}

impl std::error::Error for HybridError {}

impl From<serde_json::Error> for HybridError {
    fn from(e: serde_json::Error) -> Self {
        HybridError::Serialization {
            description: e.to_string(),
        }
    }
}

impl From<bincode::Error> for HybridError {
    fn from(e: bincode::Error) -> Self {
        HybridError::Serialization {
            description: e.to_string(),
        }
    }
}
