//! Hybrid variable elimination
//!
//! One variable is eliminated at a time from a pool of [`HybridFactor`]s:
//!
//! - **discrete** key: sum-product over the adjacent discrete factors gives a
//!   [`DiscreteConditional`](crate::discrete::DiscreteConditional) and a
//!   discrete residual
//! - **continuous** key with only Gaussian neighbours: QR elimination gives a
//!   Gaussian conditional and a Gaussian residual
//! - **continuous** key next to mixtures: the adjacent factors are combined
//!   per discrete branch and every branch is eliminated on its own, giving a
//!   [`GaussianMixture`] and either a residual mixture factor or, once no
//!   continuous separator remains, a discrete factor
//!
//! Every branch carries a constant `sum(constants) + ln|det R|` so the
//! discrete factor produced at the end of a continuous chain weights branches
//! by their marginal likelihood rather than by their residual error alone.
//!
//! [`SequentialEliminator`] drives the process as a small state machine;
//! multifrontal elimination reuses the same single-variable step clique by
//! clique.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

use super::conditional::HybridConditional;
use super::factor::HybridFactor;
use super::mixture::GaussianMixture;
use super::mixture_factor::{GaussianMixtureFactor, MixtureComponent};
use crate::common::keys::{format_key, merge_discrete_keys, DiscreteKey, DiscreteKeys, Key};
use crate::common::values::VectorValues;
use crate::config::{EliminationConfig, INFEASIBLE_ERROR};
use crate::decision_tree::DecisionTree;
use crate::discrete::{eliminate_discrete, DecisionTreeFactor};
use crate::errors::HybridError;
use crate::gaussian::{eliminate_gaussian, GaussianConditional, JacobianFactor};
use crate::reporter::EliminationReporter;

// ============================================================================
// Context
// ============================================================================

/// Variable metadata shared by every elimination step of one graph
#[derive(Debug, Clone)]
pub(crate) struct EliminationContext {
    pub(crate) config: EliminationConfig,
    /// Dimension of every continuous variable
    pub(crate) dims: BTreeMap<Key, usize>,
    /// Every discrete variable
    pub(crate) discrete: BTreeMap<Key, DiscreteKey>,
}

impl EliminationContext {
    /// Collect dimensions and cardinalities, rejecting conflicting declarations
    pub(crate) fn from_factors(
        factors: &[HybridFactor],
        config: EliminationConfig,
    ) -> Result<Self, HybridError> {
        let mut dims: BTreeMap<Key, usize> = BTreeMap::new();
        let mut discrete: BTreeMap<Key, DiscreteKey> = BTreeMap::new();

        let mut add_dim = |key: Key, dim: usize| -> Result<(), HybridError> {
            match dims.insert(key, dim) {
                Some(previous) if previous != dim => Err(HybridError::DimensionMismatch {
                    expected: previous,
                    actual: dim,
                    context: format!("dimension of {}", format_key(key)),
                }),
                _ => Ok(()),
            }
        };
        let mut first_error = None;
        for factor in factors {
            match factor {
                HybridFactor::Gaussian(f) => {
                    for (key, block) in f.keys().iter().zip(f.blocks()) {
                        add_dim(*key, block.ncols())?;
                    }
                }
                HybridFactor::Mixture(f) => {
                    f.components().visit_with_assignment(|_, leaf| {
                        if let Some(component) = leaf {
                            for (key, block) in component.factor.keys().iter().zip(component.factor.blocks()) {
                                if let Err(e) = add_dim(*key, block.ncols()) {
                                    first_error.get_or_insert(e);
                                }
                            }
                        }
                    });
                }
                HybridFactor::Discrete(_) => {}
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        for factor in factors {
            for dk in factor.discrete_keys() {
                match discrete.insert(dk.key, *dk) {
                    Some(previous) if previous.cardinality != dk.cardinality => {
                        return Err(HybridError::DimensionMismatch {
                            expected: previous.cardinality,
                            actual: dk.cardinality,
                            context: format!("cardinality of {}", format_key(dk.key)),
                        });
                    }
                    _ => {}
                }
            }
        }

        Ok(Self {
            config,
            dims,
            discrete,
        })
    }

    /// Whether `key` is a discrete variable of the graph
    pub(crate) fn is_discrete(&self, key: Key) -> bool {
        self.discrete.contains_key(&key)
    }
}

/// Reject orderings that name a variable twice
pub(crate) fn check_unique(ordering: &[Key]) -> Result<(), HybridError> {
    let mut seen = HashSet::with_capacity(ordering.len());
    for &key in ordering {
        if !seen.insert(key) {
            return Err(HybridError::InvalidOrdering {
                key,
                reason: "variable appears more than once in the ordering".to_string(),
            });
        }
    }
    Ok(())
}

// ============================================================================
// Single-variable elimination
// ============================================================================

/// Handle an ordered variable that no factor mentions
pub(crate) fn report_improper<R: EliminationReporter + ?Sized>(
    key: Key,
    context: &EliminationContext,
    reporter: &mut R,
) -> Result<(), HybridError> {
    if !context.config.allow_improper {
        return Err(HybridError::ImproperVariable { key });
    }
    log::warn!("Variable {} has no adjacent factors; no conditional produced", format_key(key));
    reporter.on_improper_variable(key);
    Ok(())
}

/// Eliminate `key` from `factors` in place
///
/// The factors involving `key` are removed from the pool and the residual (if
/// any) is appended. Returns `None` for an improper variable.
pub(crate) fn eliminate_variable<R: EliminationReporter + ?Sized>(
    factors: &mut Vec<HybridFactor>,
    key: Key,
    context: &EliminationContext,
    reporter: &mut R,
) -> Result<Option<HybridConditional>, HybridError> {
    let (adjacent, rest): (Vec<HybridFactor>, Vec<HybridFactor>) =
        std::mem::take(factors).into_iter().partition(|f| f.involves(key));
    *factors = rest;

    if adjacent.is_empty() {
        report_improper(key, context, reporter)?;
        return Ok(None);
    }

    let (conditional, residual) = if let Some(dk) = context.discrete.get(&key) {
        eliminate_discrete_variable(&adjacent, dk)?
    } else if adjacent.iter().any(|f| matches!(f, HybridFactor::Mixture(_))) {
        eliminate_hybrid_variable(&adjacent, key, context)?
    } else {
        eliminate_continuous_variable(&adjacent, key, context)?
    };

    if let Some(residual) = residual {
        factors.push(residual);
    }
    reporter.on_eliminate(key, &conditional);
    Ok(Some(conditional))
}

type StepOutput = (HybridConditional, Option<HybridFactor>);

fn eliminate_discrete_variable(adjacent: &[HybridFactor], dk: &DiscreteKey) -> Result<StepOutput, HybridError> {
    let mut tables = Vec::with_capacity(adjacent.len());
    for factor in adjacent {
        match factor {
            HybridFactor::Discrete(f) => tables.push(f.as_ref().clone()),
            _ => {
                return Err(HybridError::InvalidOrdering {
                    key: dk.key,
                    reason: "discrete variable eliminated while an adjacent factor still has continuous variables"
                        .to_string(),
                })
            }
        }
    }
    let (conditional, marginal) = eliminate_discrete(&tables, dk)?;
    let residual = (!marginal.keys().is_empty()).then(|| HybridFactor::from(marginal));
    Ok((conditional.into(), residual))
}

/// Continuous variables of `adjacent` other than `key`, ascending
fn continuous_separator(adjacent: &[HybridFactor], key: Key) -> Vec<Key> {
    adjacent
        .iter()
        .flat_map(|f| f.continuous_keys().iter().copied())
        .filter(|k| *k != key)
        .collect::<BTreeSet<Key>>()
        .into_iter()
        .collect()
}

fn eliminate_continuous_variable(
    adjacent: &[HybridFactor],
    key: Key,
    context: &EliminationContext,
) -> Result<StepOutput, HybridError> {
    let gaussians: Vec<&JacobianFactor> = adjacent
        .iter()
        .filter_map(|f| match f {
            HybridFactor::Gaussian(g) => Some(g.as_ref()),
            _ => None,
        })
        .collect();
    let separator = continuous_separator(adjacent, key);
    let out = eliminate_gaussian(
        &gaussians,
        key,
        &separator,
        &context.dims,
        context.config.rank_tolerance,
    )?;
    let residual = (!out.residual.keys().is_empty() && out.residual.rows() > 0)
        .then(|| HybridFactor::from(out.residual));
    Ok((out.conditional.into(), residual))
}

/// Linear factors of one discrete branch before elimination
#[derive(Debug, Clone, PartialEq)]
struct Branch {
    factors: Vec<Arc<JacobianFactor>>,
    constant: f64,
}

/// One discrete branch after elimination
#[derive(Debug, Clone, PartialEq)]
struct EliminatedBranch {
    conditional: Arc<GaussianConditional>,
    residual: Arc<JacobianFactor>,
    constant: f64,
}

fn eliminate_hybrid_variable(
    adjacent: &[HybridFactor],
    key: Key,
    context: &EliminationContext,
) -> Result<StepOutput, HybridError> {
    let gaussians: Vec<Arc<JacobianFactor>> = adjacent
        .iter()
        .filter_map(|f| match f {
            HybridFactor::Gaussian(g) => Some(g.clone()),
            _ => None,
        })
        .collect();

    // Sum of all adjacent factors, per discrete branch
    let mut discrete_keys = DiscreteKeys::new();
    let mut sum: DecisionTree<Option<Branch>> = DecisionTree::leaf(Some(Branch {
        factors: gaussians,
        constant: 0.0,
    }));
    for factor in adjacent {
        if let HybridFactor::Mixture(mixture) = factor {
            discrete_keys = merge_discrete_keys(&discrete_keys, mixture.discrete_keys());
            sum = sum.apply2(mixture.components(), |branch, component| match (branch, component) {
                (Some(branch), Some(component)) => {
                    let mut branch = branch.clone();
                    branch.factors.push(component.factor.clone());
                    branch.constant += component.constant;
                    Some(branch)
                }
                _ => None,
            });
        }
    }

    let separator = continuous_separator(adjacent, key);
    let eliminated: DecisionTree<Option<EliminatedBranch>> = sum.try_map(|branch| {
        let Some(branch) = branch else {
            return Ok(None);
        };
        let factors: Vec<&JacobianFactor> = branch.factors.iter().map(|f| f.as_ref()).collect();
        let out = eliminate_gaussian(
            &factors,
            key,
            &separator,
            &context.dims,
            context.config.rank_tolerance,
        )?;
        Ok::<_, HybridError>(Some(EliminatedBranch {
            conditional: Arc::new(out.conditional),
            residual: Arc::new(out.residual),
            constant: branch.constant + out.log_determinant,
        }))
    })?;

    let conditionals = eliminated.map(|b| b.as_ref().map(|b| b.conditional.clone()));
    let mixture = GaussianMixture::new(key, separator.clone(), &discrete_keys, conditionals)?;

    let residual = if !separator.is_empty() {
        let components = eliminated.map(|b| {
            b.as_ref().map(|b| MixtureComponent {
                factor: b.residual.clone(),
                constant: b.constant,
            })
        });
        Some(HybridFactor::from(GaussianMixtureFactor::new(
            separator,
            &discrete_keys,
            components,
        )?))
    } else if !discrete_keys.is_empty() {
        Some(HybridFactor::from(branch_weights(&eliminated, &discrete_keys)?))
    } else {
        None
    };

    Ok((mixture.into(), residual))
}

/// Discrete factor `exp(-(error - min error))` over fully eliminated branches
fn branch_weights(
    eliminated: &DecisionTree<Option<EliminatedBranch>>,
    discrete_keys: &[DiscreteKey],
) -> Result<DecisionTreeFactor, HybridError> {
    let empty = VectorValues::new();
    let errors = eliminated.try_map(|b| match b {
        Some(b) => Ok::<_, HybridError>(b.residual.error(&empty)? + b.constant),
        None => Ok(f64::INFINITY),
    })?;
    let min = errors.min_value();
    let weights = errors.map(|e| {
        if e.is_finite() && *e < INFEASIBLE_ERROR {
            (min - e).exp()
        } else {
            0.0
        }
    });
    Ok(DecisionTreeFactor::new(discrete_keys, weights))
}

// ============================================================================
// Sequential state machine
// ============================================================================

/// Progress of a [`SequentialEliminator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EliminationState {
    /// Variables are still waiting to be eliminated
    Pending {
        /// Variables left in the ordering
        remaining: usize,
    },
    /// The given variable was just eliminated
    Eliminated(Key),
    /// The ordering is exhausted
    Done,
}

/// Eliminates an ordering one variable per [`SequentialEliminator::step`]
pub struct SequentialEliminator<R: EliminationReporter> {
    factors: Vec<HybridFactor>,
    ordering: VecDeque<Key>,
    conditionals: Vec<HybridConditional>,
    context: EliminationContext,
    reporter: R,
    done: bool,
}

impl<R: EliminationReporter> SequentialEliminator<R> {
    /// Prepare to eliminate `ordering` from `factors`
    pub fn new(
        factors: Vec<HybridFactor>,
        ordering: &[Key],
        config: EliminationConfig,
        reporter: R,
    ) -> Result<Self, HybridError> {
        check_unique(ordering)?;
        let context = EliminationContext::from_factors(&factors, config)?;
        Ok(Self {
            factors,
            ordering: ordering.iter().copied().collect(),
            conditionals: Vec::new(),
            context,
            reporter,
            done: false,
        })
    }

    /// Current state
    pub fn state(&self) -> EliminationState {
        if self.done {
            EliminationState::Done
        } else {
            EliminationState::Pending {
                remaining: self.ordering.len(),
            }
        }
    }

    /// Conditionals produced so far, in elimination order
    pub fn conditionals(&self) -> &[HybridConditional] {
        &self.conditionals
    }

    /// Factors not yet consumed
    pub fn factors(&self) -> &[HybridFactor] {
        &self.factors
    }

    /// Eliminate the next variable of the ordering
    pub fn step(&mut self) -> Result<EliminationState, HybridError> {
        if self.done {
            return Ok(EliminationState::Done);
        }
        let Some(key) = self.ordering.pop_front() else {
            self.done = true;
            self.reporter
                .on_complete(self.conditionals.len(), self.factors.len());
            return Ok(EliminationState::Done);
        };
        if let Some(conditional) =
            eliminate_variable(&mut self.factors, key, &self.context, &mut self.reporter)?
        {
            self.conditionals.push(conditional);
        }
        Ok(EliminationState::Eliminated(key))
    }

    /// Run to completion
    ///
    /// # Returns
    /// The conditionals in elimination order, the remaining factors, and the
    /// reporter.
    pub fn run(mut self) -> Result<(Vec<HybridConditional>, Vec<HybridFactor>, R), HybridError> {
        while self.step()? != EliminationState::Done {}
        Ok((self.conditionals, self.factors, self.reporter))
    }
}
