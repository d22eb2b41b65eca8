//! Observability for hybrid elimination.
//!
//! This module provides the [`EliminationReporter`] trait for debugging and
//! research instrumentation. Reporters receive callbacks at key points during
//! sequential and multifrontal elimination without polluting the elimination
//! logic itself.
//!
//! # Zero-Cost Abstraction
//!
//! The default [`NoOpReporter`] compiles to zero overhead - all callback
//! methods are empty and will be optimized away by the compiler.
//!
//! # Example
//!
//! ```
//! use hybrid_bayes_rs::reporter::{DebugReporter, EliminationReporter};
//!
//! let mut reporter = DebugReporter::new();
//! reporter.on_improper_variable(7);
//! reporter.on_complete(0, 0);
//! assert_eq!(reporter.improper_variables(), &[7]);
//! assert_eq!(reporter.total_events(), 2);
//! ```

use crate::common::keys::{format_key, Key};
use crate::errors::ConditionalKind;
use crate::hybrid::HybridConditional;

// ============================================================================
// EliminationReporter Trait
// ============================================================================

/// Observability trait for elimination.
///
/// All methods have default empty implementations, so you only need to
/// override the events you care about.
///
/// # Thread Safety
///
/// Reporters use `&mut self` for callbacks, so they are NOT required to be
/// `Send + Sync`.
pub trait EliminationReporter {
    /// Called after one variable has been eliminated.
    ///
    /// `conditional` is the conditional just appended to the Bayes net or clique.
    fn on_eliminate(&mut self, _key: Key, _conditional: &HybridConditional) {}

    /// Called when an ordered variable has no adjacent factors.
    ///
    /// No conditional is produced for such a variable.
    fn on_improper_variable(&mut self, _key: Key) {}

    /// Called before the frontals of a clique are eliminated.
    fn on_clique(&mut self, _index: usize, _frontals: &[Key], _separator: &[Key]) {}

    /// Called once elimination has finished.
    ///
    /// `nr_remaining` counts the factors left in the residual graph.
    fn on_complete(&mut self, _nr_conditionals: usize, _nr_remaining: usize) {}
}

// ============================================================================
// NoOpReporter
// ============================================================================

/// Zero-cost reporter that does nothing.
///
/// This is the reporter used by the elimination entry points without a
/// `_with` suffix.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReporter;

impl NoOpReporter {
    /// Create a new no-op reporter.
    pub fn new() -> Self {
        Self
    }
}

impl EliminationReporter for NoOpReporter {}

// ============================================================================
// DebugReporter
// ============================================================================

/// Reporter that captures all events for post-hoc inspection.
#[derive(Debug, Clone, Default)]
pub struct DebugReporter {
    /// Eliminated keys with the kind of conditional they produced
    eliminations: Vec<(Key, ConditionalKind)>,

    /// Ordered keys that had no factors
    improper: Vec<Key>,

    /// Cliques as (index, frontals, separator)
    cliques: Vec<(usize, Vec<Key>, Vec<Key>)>,

    /// Completion events (conditionals, remaining factors)
    completions: Vec<(usize, usize)>,
}

impl DebugReporter {
    /// Create a new debug reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all captured events.
    pub fn clear(&mut self) {
        self.eliminations.clear();
        self.improper.clear();
        self.cliques.clear();
        self.completions.clear();
    }

    /// Get captured elimination events.
    pub fn eliminations(&self) -> &[(Key, ConditionalKind)] {
        &self.eliminations
    }

    /// Get keys reported as improper.
    pub fn improper_variables(&self) -> &[Key] {
        &self.improper
    }

    /// Get captured clique events.
    pub fn cliques(&self) -> &[(usize, Vec<Key>, Vec<Key>)] {
        &self.cliques
    }

    /// Get captured completion events.
    pub fn completions(&self) -> &[(usize, usize)] {
        &self.completions
    }

    /// Total number of captured events across all types.
    pub fn total_events(&self) -> usize {
        self.eliminations.len() + self.improper.len() + self.cliques.len() + self.completions.len()
    }
}

impl EliminationReporter for DebugReporter {
    fn on_eliminate(&mut self, key: Key, conditional: &HybridConditional) {
        self.eliminations.push((key, conditional.kind()));
    }

    fn on_improper_variable(&mut self, key: Key) {
        self.improper.push(key);
    }

    fn on_clique(&mut self, index: usize, frontals: &[Key], separator: &[Key]) {
        self.cliques.push((index, frontals.to_vec(), separator.to_vec()));
    }

    fn on_complete(&mut self, nr_conditionals: usize, nr_remaining: usize) {
        self.completions.push((nr_conditionals, nr_remaining));
    }
}

// ============================================================================
// LoggingReporter
// ============================================================================

/// Reporter that emits events through the `log` crate.
///
/// # Log Levels
///
/// - `on_complete`: INFO
/// - `on_clique`, `on_improper_variable`: DEBUG
/// - `on_eliminate`: TRACE (DEBUG with the conditional when verbose)
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingReporter {
    /// Whether to print every produced conditional
    verbose: bool,
}

impl LoggingReporter {
    /// Create a new logging reporter.
    pub fn new() -> Self {
        Self { verbose: false }
    }

    /// Create a verbose logging reporter that prints every conditional.
    pub fn verbose() -> Self {
        Self { verbose: true }
    }
}

impl EliminationReporter for LoggingReporter {
    fn on_eliminate(&mut self, key: Key, conditional: &HybridConditional) {
        if self.verbose {
            log::debug!("Eliminated {}: {}", format_key(key), conditional);
        } else {
            log::trace!("Eliminated {} ({})", format_key(key), conditional.kind());
        }
    }

    fn on_improper_variable(&mut self, key: Key) {
        log::debug!("Variable {} has no factors, skipped", format_key(key));
    }

    fn on_clique(&mut self, index: usize, frontals: &[Key], separator: &[Key]) {
        log::debug!(
            "Clique {}: frontals [{}] separator [{}]",
            index,
            frontals.iter().map(|k| format_key(*k)).collect::<Vec<_>>().join(", "),
            separator.iter().map(|k| format_key(*k)).collect::<Vec<_>>().join(", ")
        );
    }

    fn on_complete(&mut self, nr_conditionals: usize, nr_remaining: usize) {
        log::info!(
            "Elimination complete: {} conditionals, {} remaining factors",
            nr_conditionals,
            nr_remaining
        );
    }
}

// ============================================================================
// CompositeReporter
// ============================================================================

/// Reporter that forwards events to two child reporters.
///
/// # Example
///
/// ```
/// use hybrid_bayes_rs::reporter::{
///     CompositeReporter, DebugReporter, EliminationReporter, LoggingReporter,
/// };
///
/// let mut composite = CompositeReporter::new(DebugReporter::new(), LoggingReporter::new());
/// composite.on_complete(3, 0);
/// assert_eq!(composite.first().completions(), &[(3, 0)]);
/// ```
#[derive(Debug, Clone)]
pub struct CompositeReporter<A: EliminationReporter, B: EliminationReporter> {
    first: A,
    second: B,
}

impl<A: EliminationReporter, B: EliminationReporter> CompositeReporter<A, B> {
    /// Create a new composite reporter.
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    /// Get a reference to the first reporter.
    pub fn first(&self) -> &A {
        &self.first
    }

    /// Get a mutable reference to the first reporter.
    pub fn first_mut(&mut self) -> &mut A {
        &mut self.first
    }

    /// Get a reference to the second reporter.
    pub fn second(&self) -> &B {
        &self.second
    }

    /// Get a mutable reference to the second reporter.
    pub fn second_mut(&mut self) -> &mut B {
        &mut self.second
    }

    /// Consume and return both reporters.
    pub fn into_parts(self) -> (A, B) {
        (self.first, self.second)
    }
}

impl<A: EliminationReporter, B: EliminationReporter> EliminationReporter for CompositeReporter<A, B> {
    fn on_eliminate(&mut self, key: Key, conditional: &HybridConditional) {
        self.first.on_eliminate(key, conditional);
        self.second.on_eliminate(key, conditional);
    }

    fn on_improper_variable(&mut self, key: Key) {
        self.first.on_improper_variable(key);
        self.second.on_improper_variable(key);
    }

    fn on_clique(&mut self, index: usize, frontals: &[Key], separator: &[Key]) {
        self.first.on_clique(index, frontals, separator);
        self.second.on_clique(index, frontals, separator);
    }

    fn on_complete(&mut self, nr_conditionals: usize, nr_remaining: usize) {
        self.first.on_complete(nr_conditionals, nr_remaining);
        self.second.on_complete(nr_conditionals, nr_remaining);
    }
}

impl<R: EliminationReporter + ?Sized> EliminationReporter for &mut R {
    fn on_eliminate(&mut self, key: Key, conditional: &HybridConditional) {
        (**self).on_eliminate(key, conditional);
    }

    fn on_improper_variable(&mut self, key: Key) {
        (**self).on_improper_variable(key);
    }

    fn on_clique(&mut self, index: usize, frontals: &[Key], separator: &[Key]) {
        (**self).on_clique(index, frontals, separator);
    }

    fn on_complete(&mut self, nr_conditionals: usize, nr_remaining: usize) {
        (**self).on_complete(nr_conditionals, nr_remaining);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::keys::{symbol, DiscreteKey};
    use crate::discrete::DiscreteConditional;

    fn prior() -> HybridConditional {
        DiscreteConditional::prior(DiscreteKey::new(symbol('m', 1), 2), "1/1")
            .unwrap()
            .into()
    }

    #[test]
    fn test_noop_reporter() {
        let mut reporter = NoOpReporter::new();

        // These should all compile and do nothing
        reporter.on_eliminate(symbol('m', 1), &prior());
        reporter.on_improper_variable(symbol('x', 9));
        reporter.on_clique(0, &[], &[]);
        reporter.on_complete(1, 0);
    }

    #[test]
    fn test_debug_reporter_captures_events() {
        let mut reporter = DebugReporter::new();
        assert_eq!(reporter.total_events(), 0);

        reporter.on_eliminate(symbol('m', 1), &prior());
        reporter.on_improper_variable(symbol('x', 9));
        reporter.on_clique(2, &[symbol('x', 1)], &[symbol('m', 1)]);
        reporter.on_complete(1, 0);

        assert_eq!(reporter.eliminations(), &[(symbol('m', 1), ConditionalKind::Discrete)]);
        assert_eq!(reporter.improper_variables(), &[symbol('x', 9)]);
        assert_eq!(reporter.cliques()[0].0, 2);
        assert_eq!(reporter.total_events(), 4);

        reporter.clear();
        assert_eq!(reporter.total_events(), 0);
    }

    #[test]
    fn test_composite_forwards_to_both() {
        let mut composite = CompositeReporter::new(DebugReporter::new(), DebugReporter::new());
        composite.on_improper_variable(3);
        let (a, b) = composite.into_parts();
        assert_eq!(a.improper_variables(), &[3]);
        assert_eq!(b.improper_variables(), &[3]);
    }

    #[test]
    fn test_mut_reference_is_a_reporter() {
        fn drive<R: EliminationReporter>(mut r: R) {
            r.on_complete(5, 1);
        }
        let mut reporter = DebugReporter::new();
        drive(&mut reporter);
        assert_eq!(reporter.completions(), &[(5, 1)]);
    }
}
