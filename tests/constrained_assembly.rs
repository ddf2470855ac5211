//! End-to-end checks of the constraint-aware scatter: Dirichlet rows,
//! weighted (hanging-node) rows, and pattern/value consistency.

use std::sync::Arc;

use fe_assembly::assembly::{ConstraintAwareScatter, LocalMatrix, LocalPattern};
use fe_assembly::backend::{DenseMatrix, GlobalMatrix, MapPattern};
use fe_assembly::constraints::ConstraintsContainer;
use fe_assembly::error::AssemblyError;
use fe_assembly::grid::{Cell, GeometryKind, PartitionKind};
use fe_assembly::space::{FiniteElementMap, LocalSpace, SpaceTree};

/// Two-DOF element with freely chosen global indices.
struct PairMap {
    globals: [usize; 2],
    size: usize,
}

impl FiniteElementMap for PairMap {
    fn size(&self) -> usize {
        self.size
    }

    fn local_size(&self, _cell: &Cell) -> usize {
        2
    }

    fn global_index(&self, _cell: &Cell, local: usize) -> Result<usize, AssemblyError> {
        self.globals
            .get(local)
            .copied()
            .ok_or(AssemblyError::LocalIndexOutOfRange {
                index: local,
                size: 2,
            })
    }

    fn facet_dofs(&self, _cell: &Cell, _facet: usize) -> Vec<usize> {
        Vec::new()
    }
}

fn cell() -> Cell {
    Cell {
        index: 0,
        geometry: GeometryKind::Cube(1),
        partition: PartitionKind::Interior,
    }
}

fn bound_space(globals: [usize; 2], size: usize) -> LocalSpace<f64> {
    let space = SpaceTree::leaf(Arc::new(PairMap { globals, size }));
    let mut lfs = LocalSpace::new(&space).unwrap();
    lfs.bind(&cell()).unwrap();
    lfs
}

#[test]
fn dirichlet_rows_receive_raw_values_then_become_trivial() {
    // DOF 0 is Dirichlet; the element couples DOFs 0 and 1
    let mut cg = ConstraintsContainer::new();
    cg.insert_dirichlet(0);
    let lfs = bound_space([0, 1], 2);
    let scatter = ConstraintAwareScatter::new(&cg, &cg);

    let local = LocalMatrix::from_rows(vec![vec![2.0, 1.0], vec![1.0, 3.0]]);
    let mut matrix = DenseMatrix::zeros(2, 2);
    scatter.etadd(&local, &lfs, &lfs, &mut matrix).unwrap();

    // a Dirichlet row expands as identity, so raw values land in place
    assert_eq!(matrix.get(0, 0).unwrap(), 2.0);
    assert_eq!(matrix.get(0, 1).unwrap(), 1.0);
    assert_eq!(matrix.get(1, 0).unwrap(), 1.0);
    assert_eq!(matrix.get(1, 1).unwrap(), 3.0);

    scatter.handle_dirichlet_constraints(&mut matrix).unwrap();
    assert_eq!(matrix.get(0, 0).unwrap(), 1.0);
    assert_eq!(matrix.get(0, 1).unwrap(), 0.0);
    assert_eq!(matrix.get(1, 1).unwrap(), 3.0);
}

#[test]
fn hanging_node_row_redistributes_to_its_parents() {
    // DOF 5 hangs between DOFs 2 and 3 with weight 1/2 each
    let mut cg = ConstraintsContainer::new();
    cg.insert_weighted(5, [(2, 0.5), (3, 0.5)]);
    let lfs = bound_space([5, 7], 8);
    let scatter = ConstraintAwareScatter::new(&cg, &cg);

    let mut local = LocalMatrix::zeros(2, 2);
    local.set(0, 1, 4.0).unwrap();
    let mut matrix = DenseMatrix::zeros(8, 8);
    scatter.etadd(&local, &lfs, &lfs, &mut matrix).unwrap();

    assert_eq!(matrix.get(2, 7).unwrap(), 2.0);
    assert_eq!(matrix.get(3, 7).unwrap(), 2.0);
    assert_eq!(matrix.get(5, 7).unwrap(), 0.0);
}

#[test]
fn hanging_node_columns_redistribute_too() {
    let mut cg = ConstraintsContainer::new();
    cg.insert_weighted(5, [(2, 0.5), (3, 0.5)]);
    let lfs = bound_space([5, 7], 8);
    let scatter = ConstraintAwareScatter::new(&cg, &cg);

    let mut local = LocalMatrix::zeros(2, 2);
    local.set(1, 0, 4.0).unwrap();
    let mut matrix = DenseMatrix::zeros(8, 8);
    scatter.etadd(&local, &lfs, &lfs, &mut matrix).unwrap();

    assert_eq!(matrix.get(7, 2).unwrap(), 2.0);
    assert_eq!(matrix.get(7, 3).unwrap(), 2.0);
    assert_eq!(matrix.get(7, 5).unwrap(), 0.0);
}

#[test]
fn pattern_covers_every_value_the_scatter_writes() {
    let mut cg = ConstraintsContainer::new();
    cg.insert_weighted(5, [(2, 0.5), (3, 0.5)]);
    cg.insert_dirichlet(0);
    let lfs = bound_space([5, 7], 8);
    let scatter = ConstraintAwareScatter::new(&cg, &cg);

    let mut lp = LocalPattern::new();
    for i in 0..2 {
        for j in 0..2 {
            lp.add(i, j);
        }
    }
    let mut pattern = MapPattern::new();
    scatter.add_entries(&mut pattern, &lfs, &lfs, &lp).unwrap();

    let mut local = LocalMatrix::zeros(2, 2);
    for i in 0..2 {
        for j in 0..2 {
            local.set(i, j, 1.0).unwrap();
        }
    }
    let mut matrix = DenseMatrix::zeros(8, 8);
    scatter.etadd(&local, &lfs, &lfs, &mut matrix).unwrap();

    for i in 0..8 {
        for j in 0..8 {
            if matrix.get(i, j).unwrap() != 0.0 {
                assert!(pattern.contains(i, j), "value at ({i}, {j}) outside pattern");
            }
        }
    }
}
