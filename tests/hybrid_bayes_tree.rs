//! Hybrid Bayes tree integration tests.
//!
//! Multifrontal elimination of the switching chain must agree with
//! sequential elimination, and the clique structure must be a valid
//! junction tree.

mod helpers;

use hybrid_bayes_rs::common::keys::Key;
use hybrid_bayes_rs::common::values::DiscreteValues;
use hybrid_bayes_rs::config::EliminationConfig;
use hybrid_bayes_rs::hybrid::HybridBayesTree;
use hybrid_bayes_rs::reporter::DebugReporter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use helpers::assertions::{assert_scalar_close, assert_values_close};
use helpers::independent;
use helpers::switching::{m, x, Switching};

fn multifrontal(k: u64) -> HybridBayesTree {
    let s = Switching::new(k);
    s.graph.eliminate_multifrontal(&s.ordering).unwrap()
}

#[test]
fn test_clique_structure() {
    let tree = multifrontal(4);
    let shape: Vec<(Vec<Key>, Vec<Key>)> = tree
        .cliques()
        .iter()
        .map(|c| (c.frontals().to_vec(), c.separator().to_vec()))
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
    assert_eq!(tree.roots(), &[0]);
    assert_eq!(tree.nr_conditionals(), 7);
    assert!(tree.check_running_intersection());
    assert_eq!(tree.topological_order(), vec![0, 1, 2, 3]);
    for (i, clique) in tree.cliques().iter().enumerate() {
        if let Some(parent) = clique.parent() {
            assert!(parent < i);
            assert!(tree.clique(parent).unwrap().children().contains(&i));
        }
    }
}

#[test]
fn test_multifrontal_matches_sequential() {
    for k in 2..=5 {
        let s = Switching::new(k);
        let net = s.graph.eliminate_sequential(&s.ordering).unwrap();
        let tree = s.graph.eliminate_multifrontal(&s.ordering).unwrap();

        let a = net.optimize().unwrap();
        let b = tree.optimize().unwrap();
        assert_eq!(a.discrete(), b.discrete(), "K = {}", k);
        assert_values_close(b.continuous(), a.continuous(), 1e-5);
    }
}

#[test]
fn test_optimize_given_and_choose() {
    let s = Switching::new(4);
    let tree = multifrontal(4);
    for a in DiscreteValues::cartesian_product(&s.modes()) {
        let direct = tree.optimize_given(&a).unwrap();
        let chosen = tree.choose(&a).unwrap().optimize().unwrap();
        assert_values_close(&chosen, &direct, 1e-9);
    }
}

#[test]
fn test_error_tree_matches_bayes_net() {
    let s = Switching::new(4);
    let net = s.graph.eliminate_sequential(&s.ordering).unwrap();
    let tree = s.graph.eliminate_multifrontal(&s.ordering).unwrap();

    let mut rng = StdRng::seed_from_u64(7);
    let mut point = hybrid_bayes_rs::common::values::VectorValues::new();
    for i in 1..=4 {
        point.insert(x(i), nalgebra::DVector::from_element(1, rng.gen_range(-2.0..2.0)));
    }

    let from_net = net.error_tree(&point).unwrap();
    let from_tree = tree.error_tree(&point).unwrap();
    for a in DiscreteValues::cartesian_product(&s.modes()) {
        let expected = *from_net.evaluate(&a).unwrap();
        assert_scalar_close(*from_tree.evaluate(&a).unwrap(), expected, 1e-8, "tree error");
        assert_scalar_close(tree.error(&point, &a).unwrap(), expected, 1e-8, "scalar error");
    }
}

#[test]
fn test_prune_keeps_optimum() {
    let tree = multifrontal(4);
    let before = tree.optimize().unwrap();
    let pruned = tree.prune(2).unwrap();
    let after = pruned.optimize().unwrap();

    assert_eq!(pruned.len(), tree.len());
    assert_eq!(after.discrete(), before.discrete());
    assert_values_close(after.continuous(), before.continuous(), 1e-12);
}

#[test]
fn test_prune_independent_modes_keeps_exactly_k() {
    let graph = independent::graph();
    let tree = graph.eliminate_multifrontal(&graph.hybrid_ordering()).unwrap();
    let pruned = tree.prune(3).unwrap();

    let kept = independent::feasible_assignments(&pruned.error_tree(&independent::midpoint()).unwrap());
    assert_eq!(kept.len(), 3);
    assert!(!kept.contains(&DiscreteValues::from_pairs([(m(1).key, 1), (m(2).key, 1)])));

    assert_eq!(pruned.len(), tree.len());
    assert_eq!(pruned.nr_conditionals(), tree.nr_conditionals());
    assert!(pruned.check_running_intersection());
    let best = pruned.optimize().unwrap();
    assert_eq!(best.discrete(), &DiscreteValues::from_pairs([(m(1).key, 0), (m(2).key, 0)]));
}

#[test]
fn test_to_bayes_net_round_trip() {
    let tree = multifrontal(3);
    let net = tree.to_bayes_net();
    assert_eq!(net.len(), tree.nr_conditionals());

    let a = net.optimize().unwrap();
    let b = tree.optimize().unwrap();
    assert_eq!(a.discrete(), b.discrete());
    assert_values_close(a.continuous(), b.continuous(), 1e-12);
}

#[test]
fn test_reporter_sees_every_clique() {
    let s = Switching::new(4);
    let mut reporter = DebugReporter::new();
    let tree = s
        .graph
        .eliminate_multifrontal_with(&s.ordering, &EliminationConfig::default(), &mut reporter)
        .unwrap();

    assert_eq!(reporter.cliques().len(), tree.len());
    // Children are eliminated before their parents
    let visited: Vec<usize> = reporter.cliques().iter().map(|(i, _, _)| *i).collect();
    assert_eq!(visited, vec![3, 2, 1, 0]);
    assert_eq!(reporter.eliminations().len(), 7);
    assert_eq!(reporter.completions(), &[(7, 0)]);
}
