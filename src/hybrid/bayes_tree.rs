//! Hybrid Bayes tree
//!
//! The result of multifrontal elimination. Each [`HybridClique`] owns the
//! conditionals of its frontal variables; `parent` and `children` are plain
//! indices into the tree's clique list, so cliques never own each other.
//!
//! Optimization first solves the discrete MAP problem over the root cliques'
//! discrete conditionals, then back-substitutes clique by clique from the
//! roots down. Sibling subtrees only read their parent's solution, so with the
//! `rayon` feature they are solved in parallel.

#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::bayes_net::{
    choose_from, discrete_chain, discrete_children, discrete_joint_of, discrete_keys_of, error_of, error_tree_of,
    prune_conditional, HybridBayesNet,
};
use super::conditional::HybridConditional;
use crate::common::keys::{DiscreteKeys, Key};
use crate::common::values::{DiscreteValues, HybridValues, VectorValues};
use crate::decision_tree::AlgebraicDecisionTree;
use crate::discrete::DecisionTreeFactor;
use crate::errors::HybridError;
use crate::gaussian::GaussianBayesNet;

/// One clique of a [`HybridBayesTree`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridClique {
    frontals: Vec<Key>,
    separator: Vec<Key>,
    conditionals: Vec<HybridConditional>,
    parent: Option<usize>,
    children: Vec<usize>,
}

impl HybridClique {
    pub(crate) fn new(
        frontals: Vec<Key>,
        separator: Vec<Key>,
        conditionals: Vec<HybridConditional>,
        parent: Option<usize>,
        children: Vec<usize>,
    ) -> Self {
        Self {
            frontals,
            separator,
            conditionals,
            parent,
            children,
        }
    }

    /// Frontal variables in elimination order
    pub fn frontals(&self) -> &[Key] {
        &self.frontals
    }

    /// Variables shared with the parent clique, ascending
    pub fn separator(&self) -> &[Key] {
        &self.separator
    }

    /// Conditionals of the frontal variables, in elimination order
    pub fn conditionals(&self) -> &[HybridConditional] {
        &self.conditionals
    }

    /// Index of the parent clique, `None` for a root
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Indices of the child cliques
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    /// Back-substitute this clique's frontals given its separator values
    fn solve(&self, assignment: &DiscreteValues, values: &mut VectorValues) -> Result<(), HybridError> {
        let local = choose_from(&self.conditionals, assignment)?;
        *values = local.optimize_from(std::mem::take(values))?;
        Ok(())
    }

    fn equals(&self, other: &HybridClique, tol: f64) -> bool {
        self.frontals == other.frontals
            && self.separator == other.separator
            && self.parent == other.parent
            && self.children == other.children
            && self.conditionals.len() == other.conditionals.len()
            && self
                .conditionals
                .iter()
                .zip(&other.conditionals)
                .all(|(a, b)| a.equals(b, tol))
    }
}

/// Forest of cliques produced by multifrontal elimination
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HybridBayesTree {
    cliques: Vec<HybridClique>,
    roots: Vec<usize>,
}

impl HybridBayesTree {
    pub(crate) fn from_cliques(cliques: Vec<HybridClique>) -> Self {
        let roots = cliques
            .iter()
            .enumerate()
            .filter(|(_, c)| c.parent.is_none())
            .map(|(i, _)| i)
            .collect();
        Self { cliques, roots }
    }

    /// All cliques; a parent is always stored before its children
    pub fn cliques(&self) -> &[HybridClique] {
        &self.cliques
    }

    /// Clique at `index`
    pub fn clique(&self, index: usize) -> Result<&HybridClique, HybridError> {
        self.cliques.get(index).ok_or(HybridError::IndexOutOfBounds {
            index,
            len: self.cliques.len(),
        })
    }

    /// Indices of the root cliques
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Number of cliques
    pub fn len(&self) -> usize {
        self.cliques.len()
    }

    /// Whether the tree has no cliques
    pub fn is_empty(&self) -> bool {
        self.cliques.is_empty()
    }

    /// Number of conditionals over all cliques
    pub fn nr_conditionals(&self) -> usize {
        self.cliques.iter().map(|c| c.conditionals.len()).sum()
    }

    fn all_conditionals(&self) -> impl Iterator<Item = &HybridConditional> {
        self.cliques.iter().flat_map(|c| c.conditionals.iter())
    }

    /// Clique indices with every parent before its children
    pub fn topological_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.cliques.len());
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(index) = stack.pop() {
            order.push(index);
            stack.extend(self.cliques[index].children.iter().rev());
        }
        order
    }

    /// Whether every clique's separator is contained in its parent's variables
    pub fn check_running_intersection(&self) -> bool {
        self.cliques.iter().all(|clique| match clique.parent {
            None => clique.separator.is_empty(),
            Some(p) => {
                let parent = &self.cliques[p];
                clique
                    .separator
                    .iter()
                    .all(|k| parent.frontals.contains(k) || parent.separator.contains(k))
            }
        })
    }

    /// Flatten into a Bayes net, children before parents
    pub fn to_bayes_net(&self) -> HybridBayesNet {
        self.topological_order()
            .into_iter()
            .rev()
            .flat_map(|i| self.cliques[i].conditionals.iter().cloned())
            .collect()
    }

    /// Every discrete key in the tree, ascending
    pub fn discrete_keys(&self) -> DiscreteKeys {
        discrete_keys_of(self.all_conditionals())
    }

    /// Product of all discrete conditionals
    pub fn discrete_joint(&self) -> DecisionTreeFactor {
        discrete_joint_of(self.all_conditionals())
    }

    /// Gaussian Bayes net for one discrete assignment
    pub fn choose(&self, assignment: &DiscreteValues) -> Result<GaussianBayesNet, HybridError> {
        choose_from(self.to_bayes_net().iter(), assignment)
    }

    /// MAP estimate: discrete argmax, then top-down back-substitution
    pub fn optimize(&self) -> Result<HybridValues, HybridError> {
        let (assignment, _) = self.discrete_joint().tree().argmax(&self.discrete_keys());
        let continuous = self.optimize_given(&assignment)?;
        Ok(HybridValues::new(assignment, continuous))
    }

    /// Continuous solution for a fixed discrete assignment
    pub fn optimize_given(&self, assignment: &DiscreteValues) -> Result<VectorValues, HybridError> {
        let mut values = VectorValues::new();
        for &root in &self.roots {
            values.extend(self.solve_subtree(root, assignment, VectorValues::new())?);
        }
        Ok(values)
    }

    /// Solve `index` and its descendants given the values of its ancestors
    ///
    /// # Returns
    /// Values of the subtree's frontals together with `given`.
    fn solve_subtree(
        &self,
        index: usize,
        assignment: &DiscreteValues,
        given: VectorValues,
    ) -> Result<VectorValues, HybridError> {
        let clique = &self.cliques[index];
        let mut values = given;
        clique.solve(assignment, &mut values)?;

        #[cfg(feature = "rayon")]
        let solved: Vec<VectorValues> = clique
            .children
            .par_iter()
            .map(|&child| self.solve_subtree(child, assignment, values.clone()))
            .collect::<Result<_, _>>()?;

        #[cfg(not(feature = "rayon"))]
        let solved: Vec<VectorValues> = clique
            .children
            .iter()
            .map(|&child| self.solve_subtree(child, assignment, values.clone()))
            .collect::<Result<_, _>>()?;

        for child in solved {
            values.extend(child);
        }
        Ok(values)
    }

    /// Error of `values` for every discrete assignment, as for a Bayes net
    pub fn error_tree(&self, values: &VectorValues) -> Result<AlgebraicDecisionTree, HybridError> {
        error_tree_of(self.all_conditionals(), values)
    }

    /// Error at one hybrid assignment, saturating at [`INFEASIBLE_ERROR`](crate::config::INFEASIBLE_ERROR) on pruned branches
    pub fn error(&self, values: &VectorValues, assignment: &DiscreteValues) -> Result<f64, HybridError> {
        error_of(self.all_conditionals(), values, assignment)
    }

    /// Keep the `max_nr_leaves` most probable discrete assignments
    ///
    /// The clique structure is unchanged; see [`HybridBayesNet::prune`]. Each
    /// conditional of the pruned discrete chain lives in the clique where its
    /// key is frontal. With several discrete cliques a chain conditional may
    /// condition on keys outside its clique's separator.
    pub fn prune(&self, max_nr_leaves: usize) -> Result<HybridBayesTree, HybridError> {
        let joint = self.discrete_joint().prune(max_nr_leaves)?;
        log::debug!("Pruning Bayes tree of {} cliques to {} discrete assignments", self.len(), max_nr_leaves);

        let order = discrete_children(self.to_bayes_net().iter());
        let fallback = self
            .topological_order()
            .into_iter()
            .find(|&i| self.cliques[i].conditionals.iter().any(|c| c.is_discrete()));
        let mut placed: Vec<Vec<HybridConditional>> = vec![Vec::new(); self.cliques.len()];
        for conditional in discrete_chain(&joint, &order)? {
            let key = conditional.child().key;
            let home = self
                .cliques
                .iter()
                .position(|c| c.frontals.contains(&key))
                .or(fallback);
            if let Some(index) = home {
                placed[index].push(conditional.into());
            }
        }

        let cliques = self
            .cliques
            .iter()
            .zip(placed)
            .map(|(clique, discrete)| {
                let mut conditionals = clique
                    .conditionals
                    .iter()
                    .filter(|c| !c.is_discrete())
                    .map(|c| prune_conditional(c, &joint))
                    .collect::<Result<Vec<_>, _>>()?;
                conditionals.extend(discrete);
                Ok(HybridClique {
                    conditionals,
                    ..clique.clone()
                })
            })
            .collect::<Result<Vec<_>, HybridError>>()?;
        Ok(HybridBayesTree {
            cliques,
            roots: self.roots.clone(),
        })
    }

    /// Same cliques and conditionals within `tol`
    pub fn equals(&self, other: &HybridBayesTree, tol: f64) -> bool {
        self.roots == other.roots
            && self.cliques.len() == other.cliques.len()
            && self.cliques.iter().zip(&other.cliques).all(|(a, b)| a.equals(b, tol))
    }
}
