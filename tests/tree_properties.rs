//! Property-based checks of the tree machinery and serde smoke tests.

use std::sync::Arc;

use proptest::prelude::*;

use fe_assembly::constraints::{
    assemble_constraints, AllDirichlet, BoundaryTree, ConformingDirichlet, ConstraintsContainer,
};
use fe_assembly::grid::IntervalGrid;
use fe_assembly::space::{P0IntervalMap, P1IntervalMap, SpaceTree};
use fe_assembly::constraints::{back_transform, constrain_residual, forward_transform};
use fe_assembly::tree::{AndOp, MaxOp, MinOp, OrOp, ProdOp, Reduce, SumOp, TreeNode};

fn flat_space(sizes: &[usize]) -> SpaceTree<f64> {
    let children = sizes
        .iter()
        .map(|&s| SpaceTree::leaf(Arc::new(P0IntervalMap::new(s))))
        .collect();
    SpaceTree::composite(children)
}

/// Same leaves, but nested two levels deep at an arbitrary split point.
fn nested_space(sizes: &[usize], split: usize) -> SpaceTree<f64> {
    let (left, right) = sizes.split_at(split);
    SpaceTree::composite(vec![flat_space(left), flat_space(right)])
}

proptest! {
    #[test]
    fn composite_size_is_the_sum_of_leaf_sizes(
        sizes in prop::collection::vec(1usize..12, 1..8),
    ) {
        let space = flat_space(&sizes);
        prop_assert_eq!(space.size().unwrap(), sizes.iter().sum::<usize>());
    }

    #[test]
    fn nesting_does_not_change_the_total_size(
        sizes in prop::collection::vec(1usize..12, 2..8),
        split_frac in 0.0f64..1.0,
    ) {
        let split = 1 + ((sizes.len() - 1) as f64 * split_frac) as usize;
        let flat = flat_space(&sizes);
        let nested = nested_space(&sizes, split.min(sizes.len() - 1));
        prop_assert_eq!(flat.size().unwrap(), nested.size().unwrap());
    }

    #[test]
    fn child_offsets_are_prefix_sums(
        sizes in prop::collection::vec(1usize..12, 1..8),
    ) {
        let space = flat_space(&sizes);
        let mut expected = 0;
        for (i, &s) in sizes.iter().enumerate() {
            prop_assert_eq!(space.ordering().child_offset(i).unwrap(), expected);
            expected += s;
        }
    }

    #[test]
    fn child_access_agrees_with_child_count(
        sizes in prop::collection::vec(1usize..12, 1..8),
    ) {
        let space = flat_space(&sizes);
        prop_assert_eq!(space.child_count(), sizes.len());
        for i in 0..sizes.len() {
            prop_assert!(space.child(i).is_ok());
        }
        prop_assert!(space.child(sizes.len()).is_err());
    }

    #[test]
    fn reduction_operators_are_associative(
        a in -1000i64..1000,
        b in -1000i64..1000,
        c in -1000i64..1000,
        p in any::<bool>(),
        q in any::<bool>(),
        r in any::<bool>(),
    ) {
        fn assoc<V: Copy + PartialEq>(op: &impl Reduce<V>, a: V, b: V, c: V) -> bool {
            op.reduce(op.reduce(a, b), c) == op.reduce(a, op.reduce(b, c))
        }
        prop_assert!(assoc(&SumOp, a, b, c));
        prop_assert!(assoc(&MinOp, a, b, c));
        prop_assert!(assoc(&MaxOp, a, b, c));
        prop_assert!(assoc(&OrOp, p, q, r));
        prop_assert!(assoc(&AndOp, p, q, r));
        // keep the factors small enough that i64 products stay exact
        prop_assert!(assoc(&ProdOp, a % 100, b % 100, c % 100));
    }

    #[test]
    fn transforms_round_trip_and_residuals_end_zeroed(
        values in prop::collection::vec(-10.0f64..10.0, 6),
    ) {
        // dof 5 hangs off 2 and 3, dof 0 is Dirichlet
        let mut cg = ConstraintsContainer::<f64>::new();
        cg.insert_dirichlet(0);
        cg.insert_weighted(5, [(2, 0.5), (3, 0.5)]);

        let mut x = values.clone();
        forward_transform(&mut x, &cg, true).unwrap();
        back_transform(&mut x, &cg, true).unwrap();
        // unconstrained dofs outside the weighted row's targets come back
        // exactly; the targets absorb the forward contribution
        prop_assert_eq!(x[1], values[1]);
        prop_assert_eq!(x[4], values[4]);
        // Dirichlet rows have no terms, so the round trip leaves them zero
        prop_assert_eq!(x[0], 0.0);
        // the rebuilt hanging dof satisfies its constraint afterwards
        prop_assert!((x[5] - 0.5 * (x[2] + x[3])).abs() < 1e-12);

        let mut resid = values.clone();
        constrain_residual(&cg, &mut resid).unwrap();
        prop_assert_eq!(resid[0], 0.0);
        prop_assert_eq!(resid[5], 0.0);
    }
}

#[test]
fn assembled_constraints_survive_a_serde_round_trip() {
    let grid = IntervalGrid::new(4, 1.0);
    let space = SpaceTree::<f64>::constrained_leaf(
        Arc::new(P1IntervalMap::new(4)),
        Arc::new(ConformingDirichlet),
    );
    let bc = BoundaryTree::of(AllDirichlet);
    let cg = assemble_constraints(&bc, &space, &grid).unwrap();

    let json = serde_json::to_string(&cg).unwrap();
    let back: ConstraintsContainer<f64> = serde_json::from_str(&json).unwrap();
    assert_eq!(cg, back);
}
