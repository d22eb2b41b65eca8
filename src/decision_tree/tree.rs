//! Generic decision tree over discrete assignments
//!
//! A [`DecisionTree<L>`] maps every assignment of its discrete labels to a leaf
//! value of type `L`. Internal nodes branch on one label; along every root to
//! leaf path the labels appear in strictly ascending key order. That canonical
//! order is what lets [`DecisionTree::apply2`] merge two trees by walking them
//! in lock-step.
//!
//! Nodes are reference counted and immutable. Whenever all branches of a choice
//! are identical the choice is dropped and the branch is shared in its place, so
//! the representation grows with the number of distinct outcomes rather than
//! with the full Cartesian product of the labels.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::common::keys::{DiscreteKey, Key};
use crate::common::values::DiscreteValues;
use crate::errors::HybridError;

/// A node of a decision tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node<L> {
    /// Terminal value
    Leaf(L),
    /// Branch on `label`, one child per value of the label
    Choice {
        /// Discrete key branched on
        label: Key,
        /// Child per value, indexed by the value
        branches: Vec<Arc<Node<L>>>,
    },
}

/// Immutable decision tree with shared subtrees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree<L> {
    root: Arc<Node<L>>,
}

type NodeId = usize;

#[inline]
fn node_id<L>(node: &Arc<Node<L>>) -> NodeId {
    Arc::as_ptr(node) as *const () as usize
}

/// Build a choice node, collapsing it when every branch is the same subtree
fn make_choice<L: PartialEq>(label: Key, branches: Vec<Arc<Node<L>>>) -> Arc<Node<L>> {
    if let Some((first, rest)) = branches.split_first() {
        if rest.iter().all(|b| same_node(first, b)) {
            return first.clone();
        }
    }
    Arc::new(Node::Choice { label, branches })
}

fn same_node<L: PartialEq>(a: &Arc<Node<L>>, b: &Arc<Node<L>>) -> bool {
    if Arc::ptr_eq(a, b) {
        return true;
    }
    match (a.as_ref(), b.as_ref()) {
        (Node::Leaf(x), Node::Leaf(y)) => x == y,
        (
            Node::Choice {
                label: la,
                branches: ba,
            },
            Node::Choice {
                label: lb,
                branches: bb,
            },
        ) => {
            la == lb && ba.len() == bb.len() && ba.iter().zip(bb).all(|(x, y)| same_node(x, y))
        }
        _ => false,
    }
}

#[inline]
fn top<L>(node: &Node<L>) -> Option<(Key, usize)> {
    match node {
        Node::Leaf(_) => None,
        Node::Choice { label, branches } => Some((*label, branches.len())),
    }
}

/// Child of `node` for `label = value`, or `node` itself if it does not branch on `label`
#[inline]
fn branch_of<L>(node: &Arc<Node<L>>, label: Key, value: usize) -> Arc<Node<L>> {
    match node.as_ref() {
        Node::Choice {
            label: l,
            branches,
        } if *l == label => branches[value].clone(),
        _ => node.clone(),
    }
}

impl<L> DecisionTree<L> {
    /// Tree with a single leaf
    pub fn leaf(value: L) -> Self {
        Self {
            root: Arc::new(Node::Leaf(value)),
        }
    }

    /// Root node
    pub fn root(&self) -> &Node<L> {
        &self.root
    }

    /// True if the tree does not branch at all
    pub fn is_leaf(&self) -> bool {
        matches!(self.root.as_ref(), Node::Leaf(_))
    }

    /// Leaf selected by `assignment`
    ///
    /// Every label met on the way down must be assigned; labels the tree does
    /// not branch on are ignored.
    pub fn evaluate(&self, assignment: &DiscreteValues) -> Result<&L, HybridError> {
        let mut node = self.root.as_ref();
        loop {
            match node {
                Node::Leaf(value) => return Ok(value),
                Node::Choice { label, branches } => {
                    let value = assignment
                        .get(*label)
                        .ok_or(HybridError::IncompleteAssignment { key: *label })?;
                    node = branches
                        .get(value)
                        .ok_or(HybridError::OutOfDomain {
                            key: *label,
                            value,
                            cardinality: branches.len(),
                        })?
                        .as_ref();
                }
            }
        }
    }

    /// Labels branched on anywhere in the tree, with their cardinalities
    pub fn labels(&self) -> BTreeMap<Key, usize> {
        let mut out = BTreeMap::new();
        let mut seen = HashSet::new();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if !seen.insert(node_id(node)) {
                continue;
            }
            if let Node::Choice { label, branches } = node.as_ref() {
                out.insert(*label, branches.len());
                stack.extend(branches.iter());
            }
        }
        out
    }

    /// Number of distinct leaf nodes
    pub fn nr_leaves(&self) -> usize {
        let mut seen = HashSet::new();
        let mut count = 0;
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if !seen.insert(node_id(node)) {
                continue;
            }
            match node.as_ref() {
                Node::Leaf(_) => count += 1,
                Node::Choice { branches, .. } => stack.extend(branches.iter()),
            }
        }
        count
    }

    /// Visit every root-to-leaf path with the partial assignment along it
    pub fn visit_with_assignment(&self, mut f: impl FnMut(&DiscreteValues, &L)) {
        fn go<L>(node: &Node<L>, path: &mut DiscreteValues, f: &mut impl FnMut(&DiscreteValues, &L)) {
            match node {
                Node::Leaf(value) => f(path, value),
                Node::Choice { label, branches } => {
                    for (value, branch) in branches.iter().enumerate() {
                        path.insert(*label, value);
                        go(branch, path, f);
                    }
                    path.remove(*label);
                }
            }
        }
        let mut path = DiscreteValues::new();
        go(&self.root, &mut path, &mut f);
    }

    /// True if `pred` holds on every path's leaf
    pub fn all(&self, mut pred: impl FnMut(&L) -> bool) -> bool {
        let mut ok = true;
        self.visit_with_assignment(|_, leaf| ok = ok && pred(leaf));
        ok
    }

    /// Transform every leaf, keeping shared subtrees shared
    pub fn map<M: PartialEq>(&self, mut f: impl FnMut(&L) -> M) -> DecisionTree<M> {
        let result: Result<DecisionTree<M>, std::convert::Infallible> =
            self.try_map(|leaf| Ok(f(leaf)));
        match result {
            Ok(tree) => tree,
            Err(never) => match never {},
        }
    }

    /// Fallible [`DecisionTree::map`]; stops at the first error
    pub fn try_map<M: PartialEq, E>(
        &self,
        mut f: impl FnMut(&L) -> Result<M, E>,
    ) -> Result<DecisionTree<M>, E> {
        fn go<L, M: PartialEq, E>(
            node: &Arc<Node<L>>,
            f: &mut impl FnMut(&L) -> Result<M, E>,
            memo: &mut HashMap<NodeId, Arc<Node<M>>>,
        ) -> Result<Arc<Node<M>>, E> {
            if let Some(done) = memo.get(&node_id(node)) {
                return Ok(done.clone());
            }
            let out = match node.as_ref() {
                Node::Leaf(value) => Arc::new(Node::Leaf(f(value)?)),
                Node::Choice { label, branches } => {
                    let mapped = branches
                        .iter()
                        .map(|b| go(b, f, memo))
                        .collect::<Result<Vec<_>, E>>()?;
                    make_choice(*label, mapped)
                }
            };
            memo.insert(node_id(node), out.clone());
            Ok(out)
        }
        let mut memo = HashMap::new();
        Ok(DecisionTree {
            root: go(&self.root, &mut f, &mut memo)?,
        })
    }

    /// Combine two trees leaf-by-leaf over the union of their labels
    ///
    /// Labels are merged in ascending key order, so the trees do not need to
    /// branch on the same keys. A label present in both trees must have the
    /// same cardinality in both.
    pub fn apply2<M, N: PartialEq>(
        &self,
        other: &DecisionTree<M>,
        mut op: impl FnMut(&L, &M) -> N,
    ) -> DecisionTree<N> {
        fn go<L, M, N: PartialEq>(
            a: &Arc<Node<L>>,
            b: &Arc<Node<M>>,
            op: &mut impl FnMut(&L, &M) -> N,
            memo: &mut HashMap<(NodeId, NodeId), Arc<Node<N>>>,
        ) -> Arc<Node<N>> {
            let id = (node_id(a), node_id(b));
            if let Some(done) = memo.get(&id) {
                return done.clone();
            }
            let out = match (a.as_ref(), b.as_ref()) {
                (Node::Leaf(x), Node::Leaf(y)) => Arc::new(Node::Leaf(op(x, y))),
                (na, nb) => {
                    let (label, cardinality) = match (top(na), top(nb)) {
                        (Some(ta), Some(tb)) => {
                            if ta.0 <= tb.0 {
                                ta
                            } else {
                                tb
                            }
                        }
                        (Some(t), None) | (None, Some(t)) => t,
                        (None, None) => unreachable!("two leaves handled above"),
                    };
                    let branches = (0..cardinality)
                        .map(|v| go(&branch_of(a, label, v), &branch_of(b, label, v), op, memo))
                        .collect();
                    make_choice(label, branches)
                }
            };
            memo.insert(id, out.clone());
            out
        }
        let mut memo = HashMap::new();
        DecisionTree {
            root: go(&self.root, &other.root, &mut op, &mut memo),
        }
    }

    /// Leaf-wise comparison of two trees over the union of their labels
    pub fn equals_by<M>(&self, other: &DecisionTree<M>, mut eq: impl FnMut(&L, &M) -> bool) -> bool {
        self.apply2(other, |a, b| eq(a, b)).all(|same| *same)
    }
}

impl<L: Clone + PartialEq> DecisionTree<L> {
    /// Build a tree by evaluating `f` on every assignment of `keys`
    ///
    /// The keys may be given in any order; the tree is always built in
    /// ascending key order.
    pub fn from_fn(keys: &[DiscreteKey], mut f: impl FnMut(&DiscreteValues) -> L) -> Self {
        fn go<L: PartialEq>(
            keys: &[DiscreteKey],
            path: &mut DiscreteValues,
            f: &mut impl FnMut(&DiscreteValues) -> L,
        ) -> Arc<Node<L>> {
            match keys.split_first() {
                None => Arc::new(Node::Leaf(f(path))),
                Some((dk, rest)) => {
                    let mut branches = Vec::with_capacity(dk.cardinality);
                    for value in 0..dk.cardinality {
                        path.insert(dk.key, value);
                        branches.push(go(rest, path, f));
                    }
                    path.remove(dk.key);
                    make_choice(dk.key, branches)
                }
            }
        }
        let mut sorted: Vec<DiscreteKey> = keys.to_vec();
        sorted.sort_by_key(|dk| dk.key);
        sorted.dedup_by_key(|dk| dk.key);
        let mut path = DiscreteValues::new();
        Self {
            root: go(&sorted, &mut path, &mut f),
        }
    }

    /// Build a tree from a flat list of leaves
    ///
    /// Leaves enumerate the assignments of `keys` in the order given, first key
    /// most significant and last key varying fastest.
    pub fn from_leaves(keys: &[DiscreteKey], leaves: Vec<L>) -> Result<Self, HybridError> {
        let expected: usize = keys.iter().map(|dk| dk.cardinality).product();
        if leaves.len() != expected {
            return Err(HybridError::DimensionMismatch {
                expected,
                actual: leaves.len(),
                context: "decision tree leaf count".to_string(),
            });
        }
        Ok(Self::from_fn(keys, |assignment| {
            let mut index = 0;
            for dk in keys {
                index = index * dk.cardinality + assignment.get(dk.key).unwrap_or(0);
            }
            leaves[index].clone()
        }))
    }

    /// Restrict one label to a value
    pub fn choose(&self, key: Key, value: usize) -> Result<Self, HybridError> {
        self.restrict(&DiscreteValues::from_pairs([(key, value)]))
    }

    /// Restrict every label present in `assignment`; other labels remain
    pub fn restrict(&self, assignment: &DiscreteValues) -> Result<Self, HybridError> {
        fn go<L: PartialEq>(
            node: &Arc<Node<L>>,
            assignment: &DiscreteValues,
        ) -> Result<Arc<Node<L>>, HybridError> {
            match node.as_ref() {
                Node::Leaf(_) => Ok(node.clone()),
                Node::Choice { label, branches } => match assignment.get(*label) {
                    Some(value) => {
                        let branch = branches.get(value).ok_or(HybridError::OutOfDomain {
                            key: *label,
                            value,
                            cardinality: branches.len(),
                        })?;
                        go(branch, assignment)
                    }
                    None => {
                        let restricted = branches
                            .iter()
                            .map(|b| go(b, assignment))
                            .collect::<Result<Vec<_>, _>>()?;
                        Ok(make_choice(*label, restricted))
                    }
                },
            }
        }
        Ok(Self {
            root: go(&self.root, assignment)?,
        })
    }
}

impl<L: PartialEq> PartialEq for DecisionTree<L> {
    fn eq(&self, other: &Self) -> bool {
        same_node(&self.root, &other.root)
    }
}
