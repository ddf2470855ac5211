//! Constraint policies assembled over structured grids.

use std::sync::Arc;

use fe_assembly::constraints::{
    assemble_constraints, AllDirichlet, AllNeumann, BoundaryTree, ConformingDirichlet,
    DirichletWhere, FluxConstraints, GhostClassification, NonoverlappingConformingDirichlet,
    OverlappingConformingDirichlet, P0Ghost,
};
use fe_assembly::grid::{IntervalGrid, PartitionKind, QuadGrid};
use fe_assembly::space::{P0IntervalMap, P1IntervalMap, Q1QuadMap, RT0QuadMap, SpaceTree};

#[test]
fn conforming_dirichlet_pins_interval_ends() {
    let grid = IntervalGrid::new(4, 1.0);
    let space = SpaceTree::<f64>::constrained_leaf(
        Arc::new(P1IntervalMap::new(4)),
        Arc::new(ConformingDirichlet),
    );
    let bc = BoundaryTree::of(AllDirichlet);
    let cg = assemble_constraints(&bc, &space, &grid).unwrap();

    assert_eq!(cg.len(), 2);
    assert!(cg.is_constrained(0));
    assert!(cg.is_constrained(4));
    assert_eq!(cg.row(0).map(|r| r.len()), Some(0));
    for dof in 1..4 {
        assert!(!cg.is_constrained(dof));
    }
}

#[test]
fn boundary_condition_predicate_selects_faces() {
    let grid = IntervalGrid::new(4, 1.0);
    let space = SpaceTree::<f64>::constrained_leaf(
        Arc::new(P1IntervalMap::new(4)),
        Arc::new(ConformingDirichlet),
    );
    // essential only on the left half of the domain
    let bc = BoundaryTree::of(DirichletWhere(|center: &[f64; 2]| center[0] < 0.5));
    let cg = assemble_constraints(&bc, &space, &grid).unwrap();

    assert!(cg.is_constrained(0));
    assert!(!cg.is_constrained(4));
}

#[test]
fn overlapping_policy_also_pins_processor_boundaries() {
    let grid = IntervalGrid::new(4, 1.0).with_processor_cut(2);
    let space = SpaceTree::<f64>::constrained_leaf(
        Arc::new(P1IntervalMap::new(4)),
        Arc::new(OverlappingConformingDirichlet),
    );
    let bc = BoundaryTree::of(AllDirichlet);
    let cg = assemble_constraints(&bc, &space, &grid).unwrap();

    // domain ends plus the shared vertex at the cut
    assert!(cg.is_constrained(0));
    assert!(cg.is_constrained(2));
    assert!(cg.is_constrained(4));
    assert!(!cg.is_constrained(1));
    assert!(!cg.is_constrained(3));
}

#[test]
fn p0_ghost_policy_constrains_non_owned_cells() {
    let grid = IntervalGrid::new(3, 1.0).with_partitions(vec![
        PartitionKind::Interior,
        PartitionKind::Interior,
        PartitionKind::Ghost,
    ]);
    let space =
        SpaceTree::<f64>::constrained_leaf(Arc::new(P0IntervalMap::new(3)), Arc::new(P0Ghost));
    let bc = BoundaryTree::of(AllNeumann);
    let cg = assemble_constraints(&bc, &space, &grid).unwrap();

    assert_eq!(cg.len(), 1);
    assert!(cg.is_constrained(2));
}

#[test]
fn flux_constraints_follow_neumann_faces() {
    let grid = IntervalGrid::new(4, 1.0);
    let space = SpaceTree::<f64>::constrained_leaf(
        Arc::new(P1IntervalMap::new(4)),
        Arc::new(FluxConstraints),
    );
    // flux DOFs are pinned where the condition is natural, here the right end
    let bc = BoundaryTree::of(DirichletWhere(|center: &[f64; 2]| center[0] < 0.5));
    let cg = assemble_constraints(&bc, &space, &grid).unwrap();

    assert!(!cg.is_constrained(0));
    assert!(cg.is_constrained(4));
}

#[test]
fn flux_constraints_on_rt0_pin_every_neumann_edge() {
    // 2 x 1 quads on [0,2] x [0,1]; edges 0..3 vertical, 3..7 horizontal
    let grid = QuadGrid::new(2, 1, 2.0, 1.0);
    let space = SpaceTree::<f64>::constrained_leaf(
        Arc::new(RT0QuadMap::new(2, 1)),
        Arc::new(FluxConstraints),
    );
    // only the left boundary is essential; everything else is a flux edge
    let bc = BoundaryTree::of(DirichletWhere(|center: &[f64; 2]| center[0] < 0.5));
    let cg = assemble_constraints(&bc, &space, &grid).unwrap();

    // left edge is Dirichlet, interior edge is never a boundary face
    assert!(!cg.is_constrained(0));
    assert!(!cg.is_constrained(1));
    // right edge plus all four horizontal boundary edges
    for dof in [2, 3, 4, 5, 6] {
        assert!(cg.is_constrained(dof), "edge {dof} should carry a flux constraint");
    }
    assert_eq!(cg.len(), 5);
}

#[test]
fn nonoverlapping_policy_pins_ghost_dofs() {
    let grid = IntervalGrid::new(3, 1.0).with_partitions(vec![
        PartitionKind::Interior,
        PartitionKind::Border,
        PartitionKind::Ghost,
    ]);
    let space = SpaceTree::<f64>::leaf(Arc::new(P1IntervalMap::new(3)));
    let ghosts = GhostClassification::compute(&space, &grid).unwrap();
    assert!(!ghosts.is_ghost(2).unwrap());
    assert!(ghosts.is_ghost(3).unwrap());

    let space = SpaceTree::<f64>::constrained_leaf(
        Arc::new(P1IntervalMap::new(3)),
        Arc::new(NonoverlappingConformingDirichlet::new(ghosts)),
    );
    let bc = BoundaryTree::of(AllDirichlet);
    let cg = assemble_constraints(&bc, &space, &grid).unwrap();

    assert!(cg.is_constrained(0));
    assert!(cg.is_constrained(3));
    assert!(!cg.is_constrained(1));
    assert!(!cg.is_constrained(2));
}

#[test]
fn quad_grid_dirichlet_leaves_the_center_free() {
    let grid = QuadGrid::new(2, 2, 1.0, 1.0);
    let space = SpaceTree::<f64>::constrained_leaf(
        Arc::new(Q1QuadMap::new(2, 2)),
        Arc::new(ConformingDirichlet),
    );
    let bc = BoundaryTree::of(AllDirichlet);
    let cg = assemble_constraints(&bc, &space, &grid).unwrap();

    // 3x3 vertices; only the middle one is off the boundary
    assert_eq!(cg.len(), 8);
    assert!(!cg.is_constrained(4));
}

#[test]
fn composite_space_numbers_constraints_per_child() {
    // velocity-pressure style pairing: P1 with Dirichlet ends, P0 untouched
    let grid = IntervalGrid::new(3, 1.0);
    let velocity = SpaceTree::<f64>::constrained_leaf(
        Arc::new(P1IntervalMap::new(3)),
        Arc::new(ConformingDirichlet),
    );
    let pressure = SpaceTree::<f64>::leaf(Arc::new(P0IntervalMap::new(3)));
    let space = SpaceTree::composite(vec![velocity, pressure]);

    let bc = BoundaryTree::Composite(vec![
        BoundaryTree::of(AllDirichlet),
        BoundaryTree::of(AllNeumann),
    ]);
    let cg = assemble_constraints(&bc, &space, &grid).unwrap();

    // P1 block occupies indices 0..4, P0 block 4..7
    assert_eq!(cg.len(), 2);
    assert!(cg.is_constrained(0));
    assert!(cg.is_constrained(3));
    assert!(!cg.is_constrained(4));
    assert!(!cg.is_constrained(6));
}
