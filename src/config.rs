//! Configuration for hybrid elimination
//!
//! Elimination is driven by a small [`EliminationConfig`]; everything else
//! (orderings, pruning budgets) is passed explicitly to the operation that
//! needs it.

use serde::{Deserialize, Serialize};

/// Error value reported for pruned (infeasible) discrete branches
///
/// Large enough that `exp(-INFEASIBLE_ERROR)` underflows to exactly zero, while
/// still finite so sums and comparisons stay well defined.
pub const INFEASIBLE_ERROR: f64 = 1e50;

/// Default pivot magnitude below which QR elimination is declared singular
pub const DEFAULT_RANK_TOLERANCE: f64 = 1e-9;

/// Saturate an accumulated error at [`INFEASIBLE_ERROR`]
#[inline]
pub fn saturate_error(error: f64) -> f64 {
    if error.is_nan() {
        INFEASIBLE_ERROR
    } else {
        error.min(INFEASIBLE_ERROR)
    }
}

/// Settings shared by sequential and multifrontal elimination
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EliminationConfig {
    /// Smallest accepted absolute pivot of the triangular factor
    pub rank_tolerance: f64,
    /// Skip ordered variables that no factor mentions instead of failing
    pub allow_improper: bool,
}

impl EliminationConfig {
    /// Create a configuration
    pub fn new(rank_tolerance: f64, allow_improper: bool) -> Self {
        Self {
            rank_tolerance,
            allow_improper,
        }
    }

    /// Create with builder pattern.
    pub fn builder() -> EliminationConfigBuilder {
        EliminationConfigBuilder::default()
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Serialize to pretty-printed JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for EliminationConfig {
    fn default() -> Self {
        Self {
            rank_tolerance: DEFAULT_RANK_TOLERANCE,
            allow_improper: true,
        }
    }
}

/// Builder for [`EliminationConfig`].
#[derive(Debug, Default)]
pub struct EliminationConfigBuilder {
    rank_tolerance: Option<f64>,
    allow_improper: Option<bool>,
}

impl EliminationConfigBuilder {
    /// Set the pivot tolerance.
    pub fn rank_tolerance(mut self, tolerance: f64) -> Self {
        self.rank_tolerance = Some(tolerance);
        self
    }

    /// Allow or reject ordered variables without factors.
    pub fn allow_improper(mut self, allow: bool) -> Self {
        self.allow_improper = Some(allow);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> EliminationConfig {
        EliminationConfig {
            rank_tolerance: self.rank_tolerance.unwrap_or(DEFAULT_RANK_TOLERANCE),
            allow_improper: self.allow_improper.unwrap_or(true),
        }
    }
}
