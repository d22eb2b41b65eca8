//! Clique structure for multifrontal elimination
//!
//! A symbolic pass over the ordering computes the separator every variable
//! will have when eliminated. Cliques are then grown in reverse ordering: a
//! variable joins the clique of its parent (the first separator variable to be
//! eliminated after it) when its separator is exactly that clique's variable
//! set and both variables are of the same kind; otherwise it starts a new
//! child clique. Discrete variables are eliminated last, so they end up in the
//! root cliques.
//!
//! Numeric elimination then visits cliques children-first. Each clique takes
//! the factors whose earliest ordered variable it owns, plus whatever its
//! children left over, eliminates its frontals in order, and hands its own
//! leftovers to its parent.

use std::collections::{BTreeSet, HashMap};

use super::bayes_tree::{HybridBayesTree, HybridClique};
use super::conditional::HybridConditional;
use super::elimination::{check_unique, eliminate_variable, report_improper, EliminationContext};
use super::factor::HybridFactor;
use crate::common::keys::Key;
use crate::errors::HybridError;
use crate::reporter::EliminationReporter;

/// Clique skeleton before numeric elimination
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SymbolicClique {
    /// Frontal variables in elimination order
    pub(crate) frontals: Vec<Key>,
    /// Variables shared with ancestors, ascending
    pub(crate) separator: Vec<Key>,
    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
}

/// Result of symbolic analysis
#[derive(Debug, Clone)]
pub(crate) struct JunctionTree {
    /// Cliques, every parent stored before its children
    pub(crate) cliques: Vec<SymbolicClique>,
    /// Clique owning each eliminated variable
    pub(crate) clique_of: HashMap<Key, usize>,
    /// Ordered variables with no factors at their turn
    pub(crate) improper: Vec<Key>,
}

impl JunctionTree {
    /// Symbolic elimination of `ordering` followed by clique formation
    pub(crate) fn build(
        factors: &[HybridFactor],
        ordering: &[Key],
        context: &EliminationContext,
    ) -> Result<Self, HybridError> {
        check_unique(ordering)?;
        let position: HashMap<Key, usize> = ordering.iter().enumerate().map(|(i, k)| (*k, i)).collect();

        // Symbolic elimination: separator of every ordered variable
        let mut pool: Vec<BTreeSet<Key>> = factors.iter().map(|f| f.keys().collect()).collect();
        let mut separators: Vec<Option<BTreeSet<Key>>> = Vec::with_capacity(ordering.len());
        for &key in ordering {
            let (adjacent, rest): (Vec<_>, Vec<_>) = pool.into_iter().partition(|s| s.contains(&key));
            pool = rest;
            if adjacent.is_empty() {
                separators.push(None);
                continue;
            }
            let mut separator: BTreeSet<Key> = adjacent.into_iter().flatten().collect();
            separator.remove(&key);
            if !separator.is_empty() {
                pool.push(separator.clone());
            }
            separators.push(Some(separator));
        }

        // Cliques, grown from the last eliminated variable backwards
        let mut cliques: Vec<SymbolicClique> = Vec::new();
        let mut variables: Vec<BTreeSet<Key>> = Vec::new();
        let mut clique_of: HashMap<Key, usize> = HashMap::new();
        let mut improper = Vec::new();

        for (i, &key) in ordering.iter().enumerate().rev() {
            let Some(separator) = &separators[i] else {
                improper.push(key);
                continue;
            };
            let parent_key = separator
                .iter()
                .filter(|k| position.contains_key(*k))
                .min_by_key(|k| position[*k]);

            let merge_into = parent_key.and_then(|p| {
                let c = clique_of[p];
                let same_kind = context.is_discrete(*p) == context.is_discrete(key);
                (same_kind && *separator == variables[c]).then_some(c)
            });

            match merge_into {
                Some(c) => {
                    cliques[c].frontals.insert(0, key);
                    variables[c].insert(key);
                    clique_of.insert(key, c);
                }
                None => {
                    let index = cliques.len();
                    let parent = parent_key.map(|p| clique_of[p]);
                    if let Some(p) = parent {
                        cliques[p].children.push(index);
                    }
                    cliques.push(SymbolicClique {
                        frontals: vec![key],
                        separator: Vec::new(),
                        parent,
                        children: Vec::new(),
                    });
                    let mut vars = separator.clone();
                    vars.insert(key);
                    variables.push(vars);
                    clique_of.insert(key, index);
                }
            }
        }

        for (clique, vars) in cliques.iter_mut().zip(&variables) {
            clique.separator = vars
                .iter()
                .copied()
                .filter(|k| !clique.frontals.contains(k))
                .collect();
        }
        improper.reverse();

        Ok(Self {
            cliques,
            clique_of,
            improper,
        })
    }

    /// Clique indices with every child before its parent
    pub(crate) fn post_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.cliques.len());
        let mut stack: Vec<(usize, bool)> = self
            .cliques
            .iter()
            .enumerate()
            .filter(|(_, c)| c.parent.is_none())
            .map(|(i, _)| (i, false))
            .collect();
        while let Some((index, expanded)) = stack.pop() {
            if expanded {
                order.push(index);
            } else {
                stack.push((index, true));
                stack.extend(self.cliques[index].children.iter().map(|&c| (c, false)));
            }
        }
        order
    }
}

/// Multifrontal elimination of `ordering`
///
/// # Returns
/// The Bayes tree and the factors left over at the roots.
pub(crate) fn eliminate_multifrontal<R: EliminationReporter + ?Sized>(
    factors: Vec<HybridFactor>,
    ordering: &[Key],
    context: &EliminationContext,
    reporter: &mut R,
) -> Result<(HybridBayesTree, Vec<HybridFactor>), HybridError> {
    let tree = JunctionTree::build(&factors, ordering, context)?;
    let position: HashMap<Key, usize> = ordering.iter().enumerate().map(|(i, k)| (*k, i)).collect();

    for &key in &tree.improper {
        report_improper(key, context, reporter)?;
    }

    // Route every factor to the clique of its first eliminated variable
    let mut pending: Vec<Vec<HybridFactor>> = vec![Vec::new(); tree.cliques.len()];
    let mut remaining = Vec::new();
    for factor in factors {
        let first = factor
            .keys()
            .filter_map(|k| position.get(&k).map(|p| (*p, k)))
            .min()
            .and_then(|(_, k)| tree.clique_of.get(&k).copied());
        match first {
            Some(c) => pending[c].push(factor),
            None => remaining.push(factor),
        }
    }

    let mut conditionals: Vec<Vec<HybridConditional>> = vec![Vec::new(); tree.cliques.len()];
    for index in tree.post_order() {
        let clique = &tree.cliques[index];
        reporter.on_clique(index, &clique.frontals, &clique.separator);

        let mut pool = std::mem::take(&mut pending[index]);
        for &key in &clique.frontals {
            if let Some(conditional) = eliminate_variable(&mut pool, key, context, reporter)? {
                conditionals[index].push(conditional);
            }
        }
        match clique.parent {
            Some(parent) => pending[parent].extend(pool),
            None => remaining.extend(pool),
        }
    }

    let cliques = tree
        .cliques
        .into_iter()
        .zip(conditionals)
        .map(|(c, conditionals)| HybridClique::new(c.frontals, c.separator, conditionals, c.parent, c.children))
        .collect();
    let bayes_tree = HybridBayesTree::from_cliques(cliques);
    reporter.on_complete(bayes_tree.nr_conditionals(), remaining.len());
    Ok((bayes_tree, remaining))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::keys::{symbol, DiscreteKey};
    use crate::config::EliminationConfig;
    use crate::discrete::DiscreteConditional;
    use crate::gaussian::JacobianFactor;
    use crate::hybrid::mixture_factor::GaussianMixtureFactor;
    use nalgebra::{DMatrix, DVector};

    fn x(i: u64) -> Key {
        symbol('x', i)
    }

    fn m(i: u64) -> DiscreteKey {
        DiscreteKey::new(symbol('m', i), 2)
    }

    fn unit() -> DMatrix<f64> {
        DMatrix::identity(1, 1)
    }

    /// Chain x1..xk with one mode per link
    fn chain(k: u64) -> Vec<HybridFactor> {
        let mut factors: Vec<HybridFactor> = Vec::new();
        for i in 1..=k {
            factors.push(JacobianFactor::new(vec![(x(i), unit())], DVector::zeros(1)).unwrap().into());
        }
        for i in 1..k {
            let link = |mu: f64| {
                JacobianFactor::new(vec![(x(i), -unit()), (x(i + 1), unit())], DVector::from_element(1, mu))
                    .unwrap()
            };
            factors.push(
                GaussianMixtureFactor::from_factors(vec![x(i), x(i + 1)], &[m(i)], vec![link(0.0), link(1.0)])
                    .unwrap()
                    .into(),
            );
        }
        factors.push(DiscreteConditional::prior(m(1), "1/1").unwrap().into());
        for i in 1..k - 1 {
            factors.push(
                DiscreteConditional::from_signature(m(i + 1), &[m(i)], "1/2 3/2")
                    .unwrap()
                    .into(),
            );
        }
        factors
    }

    fn ordering(k: u64) -> Vec<Key> {
        (1..=k).map(x).chain((1..k).map(|i| m(i).key)).collect()
    }

    #[test]
    fn test_switching_chain_cliques() {
        let factors = chain(4);
        let context = EliminationContext::from_factors(&factors, EliminationConfig::default()).unwrap();
        let tree = JunctionTree::build(&factors, &ordering(4), &context).unwrap();

        let shape: Vec<(Vec<Key>, Vec<Key>)> = tree
            .cliques
            .iter()
            .map(|c| (c.frontals.clone(), c.separator.clone()))
            .collect();
        let modes = vec![m(1).key, m(2).key, m(3).key];
        assert_eq!(
            shape,
            vec![
                (modes.clone(), vec![]),
                (vec![x(3), x(4)], modes.clone()),
                (vec![x(2)], vec![m(1).key, m(2).key, x(3)]),
                (vec![x(1)], vec![m(1).key, x(2)]),
            ]
        );
        assert_eq!(tree.cliques[3].parent, Some(2));
        assert_eq!(tree.post_order(), vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_unconstrained_variable_is_improper() {
        let factors = chain(2);
        let context = EliminationContext::from_factors(&factors, EliminationConfig::default()).unwrap();
        let mut order = ordering(2);
        order.insert(0, x(7));
        let tree = JunctionTree::build(&factors, &order, &context).unwrap();
        assert_eq!(tree.improper, vec![x(7)]);
        assert!(!tree.clique_of.contains_key(&x(7)));
    }
}
