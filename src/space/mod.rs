//! Function-space trees.
//!
//! A [`SpaceTree`] composes leaf spaces (one [`FiniteElementMap`] each,
//! optionally with an attached constraints policy) into power and composite
//! nodes. Every node owns an ordering mapping child index ranges into its
//! own; the root ordering therefore spans the whole tree and root indices
//! are the global DOF numbering.

pub mod fem;
pub mod local;
pub mod ordering;

pub use fem::{FiniteElementMap, P0IntervalMap, P1IntervalMap, Q1QuadMap, RT0QuadMap};
pub use local::{LeafView, LocalSpace};
pub use ordering::{LexicographicOrdering, Ordering};

use crate::constraints::policies::ConstraintsPolicy;
use crate::error::AssemblyError;
use crate::grid::{Cell, GridTopology};
use crate::scalar::Scalar;
use crate::tree::{
    Accumulator, MaxOp, NodeKind, OrOp, Reduce, SumOp, TreeNode, TreePath, accumulate_with,
};
use std::sync::Arc;

/// A node of a function-space tree.
pub struct SpaceTree<T: Scalar> {
    data: NodeData<T>,
    ordering: LexicographicOrdering,
}

enum NodeData<T: Scalar> {
    Leaf {
        fem: Arc<dyn FiniteElementMap>,
        constraints: Option<Arc<dyn ConstraintsPolicy<T>>>,
    },
    Power(Vec<SpaceTree<T>>),
    Composite(Vec<SpaceTree<T>>),
}

impl<T: Scalar> std::fmt::Debug for SpaceTree<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.data {
            NodeData::Leaf { constraints, .. } => f
                .debug_struct("Leaf")
                .field("constrained", &constraints.is_some())
                .field("ordering", &self.ordering)
                .finish_non_exhaustive(),
            NodeData::Power(children) => f
                .debug_struct("Power")
                .field("children", children)
                .field("ordering", &self.ordering)
                .finish(),
            NodeData::Composite(children) => f
                .debug_struct("Composite")
                .field("children", children)
                .field("ordering", &self.ordering)
                .finish(),
        }
    }
}

impl<T: Scalar> SpaceTree<T> {
    /// An unconstrained leaf space.
    pub fn leaf(fem: Arc<dyn FiniteElementMap>) -> Self {
        let mut node = Self {
            data: NodeData::Leaf {
                fem,
                constraints: None,
            },
            ordering: LexicographicOrdering::new(),
        };
        node.update();
        node
    }

    /// A leaf space with an attached constraints policy.
    pub fn constrained_leaf(
        fem: Arc<dyn FiniteElementMap>,
        constraints: Arc<dyn ConstraintsPolicy<T>>,
    ) -> Self {
        let mut node = Self {
            data: NodeData::Leaf {
                fem,
                constraints: Some(constraints),
            },
            ordering: LexicographicOrdering::new(),
        };
        node.update();
        node
    }

    /// A power node; all children must share one shape.
    ///
    /// # Errors
    /// [`AssemblyError::PowerChildShapeMismatch`] when a child's shape
    /// differs from child 0.
    pub fn power(children: Vec<SpaceTree<T>>) -> Result<Self, AssemblyError> {
        for (i, c) in children.iter().enumerate().skip(1) {
            if !children[0].same_shape(c) {
                return Err(AssemblyError::PowerChildShapeMismatch { child: i });
            }
        }
        let mut node = Self {
            data: NodeData::Power(children),
            ordering: LexicographicOrdering::new(),
        };
        node.update();
        Ok(node)
    }

    /// A composite node with arbitrary, ordered children.
    pub fn composite(children: Vec<SpaceTree<T>>) -> Self {
        let mut node = Self {
            data: NodeData::Composite(children),
            ordering: LexicographicOrdering::new(),
        };
        node.update();
        node
    }

    /// Recompute all orderings bottom-up.
    ///
    /// Constructors call this; it only needs to be repeated after mutating
    /// children through [`child_mut`](Self::child_mut).
    pub fn update(&mut self) {
        let sizes: Vec<usize> = match &mut self.data {
            NodeData::Leaf { fem, .. } => vec![fem.size()],
            NodeData::Power(children) | NodeData::Composite(children) => children
                .iter_mut()
                .map(|c| {
                    c.update();
                    // children were just updated, their size reads cannot fail
                    c.size().unwrap_or(0)
                })
                .collect(),
        };
        self.ordering.update(&sizes);
    }

    /// Total DOF count of this node.
    ///
    /// # Errors
    /// [`AssemblyError::OrderingNotUpdated`] after an un-updated mutation.
    pub fn size(&self) -> Result<usize, AssemblyError> {
        self.ordering.size()
    }

    /// This node's ordering.
    pub fn ordering(&self) -> &dyn Ordering {
        &self.ordering
    }

    /// Mutable child access; marks this node's ordering dirty, so `update`
    /// must run before the next read.
    pub fn child_mut(&mut self, index: usize) -> Result<&mut SpaceTree<T>, AssemblyError> {
        self.ordering.mark_dirty();
        let children = match &mut self.data {
            NodeData::Leaf { .. } => {
                return Err(AssemblyError::ChildIndexOutOfRange { index, children: 0 });
            }
            NodeData::Power(c) | NodeData::Composite(c) => c,
        };
        let len = children.len();
        children
            .get_mut(index)
            .ok_or(AssemblyError::ChildIndexOutOfRange {
                index,
                children: len,
            })
    }

    /// The finite-element map of a leaf node.
    pub fn fem(&self) -> Option<&Arc<dyn FiniteElementMap>> {
        match &self.data {
            NodeData::Leaf { fem, .. } => Some(fem),
            _ => None,
        }
    }

    /// The constraints policy of a leaf node, if attached.
    pub fn constraints(&self) -> Option<&Arc<dyn ConstraintsPolicy<T>>> {
        match &self.data {
            NodeData::Leaf { constraints, .. } => constraints.as_ref(),
            _ => None,
        }
    }

    /// Whether any leaf in the tree carries a constraints policy.
    pub fn needs_constraints(&self) -> Result<bool, AssemblyError> {
        struct HasPolicy;
        impl<T: Scalar> Accumulator<SpaceTree<T>, bool> for HasPolicy {
            fn do_visit(&self, node: &SpaceTree<T>, _: &TreePath) -> bool {
                node.is_leaf()
            }
            fn visit(&self, node: &SpaceTree<T>, _: &TreePath) -> Result<bool, AssemblyError> {
                Ok(node.constraints().is_some())
            }
        }
        accumulate_with(self, &HasPolicy, &OrOp, false)
    }

    /// Number of DOFs the whole tree places on one cell.
    pub fn local_size(&self, cell: &Cell) -> Result<usize, AssemblyError> {
        struct PerCell<'a>(&'a Cell);
        impl<T: Scalar> Accumulator<SpaceTree<T>, usize> for PerCell<'_> {
            fn do_visit(&self, node: &SpaceTree<T>, _: &TreePath) -> bool {
                node.is_leaf()
            }
            fn visit(&self, node: &SpaceTree<T>, _: &TreePath) -> Result<usize, AssemblyError> {
                // do_visit restricts to leaves
                Ok(node.fem().map(|f| f.local_size(self.0)).unwrap_or(0))
            }
        }
        accumulate_with(self, &PerCell(cell), &SumOp, 0)
    }

    /// Largest per-cell DOF count over a grid view.
    pub fn max_local_size<G: GridTopology>(&self, grid: &G) -> Result<usize, AssemblyError> {
        let mut max = 0usize;
        for index in 0..grid.cell_count() {
            let cell = grid.cell(index)?;
            max = MaxOp.reduce(max, self.local_size(&cell)?);
        }
        Ok(max)
    }

    /// First root-level index of the node addressed by `path`.
    pub fn node_offset(&self, path: &TreePath) -> Result<usize, AssemblyError> {
        let mut node = self;
        let mut offset = 0usize;
        for &i in path.indices() {
            offset += node.ordering.child_offset(i)?;
            node = node.child(i)?;
        }
        Ok(offset)
    }

    fn same_shape(&self, other: &Self) -> bool {
        if self.kind() != other.kind() || self.child_count() != other.child_count() {
            return false;
        }
        match (&self.data, &other.data) {
            (NodeData::Leaf { fem: a, .. }, NodeData::Leaf { fem: b, .. }) => a.size() == b.size(),
            (NodeData::Power(a), NodeData::Power(b))
            | (NodeData::Composite(a), NodeData::Composite(b)) => {
                a.iter().zip(b).all(|(x, y)| x.same_shape(y))
            }
            _ => false,
        }
    }
}

impl<T: Scalar> TreeNode for SpaceTree<T> {
    fn kind(&self) -> NodeKind {
        match &self.data {
            NodeData::Leaf { .. } => NodeKind::Leaf,
            NodeData::Power(_) => NodeKind::Power,
            NodeData::Composite(_) => NodeKind::Composite,
        }
    }

    fn child_count(&self) -> usize {
        match &self.data {
            NodeData::Leaf { .. } => 0,
            NodeData::Power(c) | NodeData::Composite(c) => c.len(),
        }
    }

    fn child(&self, index: usize) -> Result<&Self, AssemblyError> {
        let children = match &self.data {
            NodeData::Leaf { .. } => {
                return Err(AssemblyError::ChildIndexOutOfRange { index, children: 0 });
            }
            NodeData::Power(c) | NodeData::Composite(c) => c,
        };
        children
            .get(index)
            .ok_or(AssemblyError::ChildIndexOutOfRange {
                index,
                children: children.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p1(cells: usize) -> SpaceTree<f64> {
        SpaceTree::leaf(Arc::new(P1IntervalMap::new(cells)))
    }

    #[test]
    fn leaf_size_follows_fem() {
        let s = p1(4);
        assert_eq!(s.size().unwrap(), 5);
        assert_eq!(s.kind(), NodeKind::Leaf);
    }

    #[test]
    fn composite_concatenates_children() {
        let s = SpaceTree::composite(vec![p1(4), SpaceTree::leaf(Arc::new(P0IntervalMap::new(4)))]);
        assert_eq!(s.size().unwrap(), 9);
        assert_eq!(s.ordering().child_offset(1).unwrap(), 5);
        // second child's indices shift by the first child's size
        assert_eq!(s.ordering().sub_map(1, 2).unwrap(), 7);
    }

    #[test]
    fn power_rejects_mixed_shapes() {
        let err = SpaceTree::<f64>::power(vec![
            p1(4),
            SpaceTree::leaf(Arc::new(P0IntervalMap::new(4))),
        ])
        .unwrap_err();
        assert_eq!(err, AssemblyError::PowerChildShapeMismatch { child: 1 });
        let ok = SpaceTree::<f64>::power(vec![p1(4), p1(4)]).unwrap();
        assert_eq!(ok.size().unwrap(), 10);
    }

    #[test]
    fn mutation_requires_update() {
        let mut s = SpaceTree::<f64>::power(vec![p1(4), p1(4)]).unwrap();
        s.child_mut(0).unwrap();
        assert_eq!(s.size(), Err(AssemblyError::OrderingNotUpdated));
        s.update();
        assert_eq!(s.size().unwrap(), 10);
    }

    #[test]
    fn node_offsets_compose_along_paths() {
        let s = SpaceTree::<f64>::composite(vec![
            SpaceTree::power(vec![p1(4), p1(4)]).unwrap(),
            p1(4),
        ]);
        assert_eq!(s.node_offset(&TreePath::root()).unwrap(), 0);
        assert_eq!(s.node_offset(&TreePath::from_indices(vec![0, 1])).unwrap(), 5);
        assert_eq!(s.node_offset(&TreePath::from_indices(vec![1])).unwrap(), 10);
    }

    #[test]
    fn local_size_sums_leaves() {
        use crate::grid::{GeometryKind, PartitionKind};
        let s = SpaceTree::<f64>::composite(vec![
            p1(4),
            SpaceTree::leaf(Arc::new(P0IntervalMap::new(4))),
        ]);
        let cell = Cell {
            index: 0,
            geometry: GeometryKind::Cube(1),
            partition: PartitionKind::Interior,
        };
        assert_eq!(s.local_size(&cell).unwrap(), 3);
        assert!(!s.needs_constraints().unwrap());
    }

    #[test]
    fn max_local_size_scans_the_grid() {
        use crate::grid::IntervalGrid;
        let grid = IntervalGrid::new(3, 3.0);
        let s = SpaceTree::<f64>::composite(vec![
            p1(3),
            SpaceTree::leaf(Arc::new(P0IntervalMap::new(3))),
        ]);
        assert_eq!(s.max_local_size(&grid).unwrap(), 3);
    }
}
