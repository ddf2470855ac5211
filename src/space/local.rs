//! Local function spaces: the per-cell view of a space tree.
//!
//! A [`LocalSpace`] flattens the leaves of a [`SpaceTree`] in depth-first
//! order and, once bound to a cell, maps every cell-local DOF to its root
//! (global) index. It is a reusable workspace: `bind` may be called for one
//! cell after another.

use crate::constraints::policies::ConstraintsPolicy;
use crate::error::AssemblyError;
use crate::grid::Cell;
use crate::scalar::Scalar;
use crate::space::{FiniteElementMap, SpaceTree};
use crate::tree::{TransformFactory, TreePath, transform};
use std::sync::Arc;

/// One leaf of a bound local space.
pub struct LeafView<T: Scalar> {
    path: TreePath,
    tree_offset: usize,
    fem: Arc<dyn FiniteElementMap>,
    constraints: Option<Arc<dyn ConstraintsPolicy<T>>>,
    local_offset: usize,
    global: Vec<usize>,
}

impl<T: Scalar> LeafView<T> {
    /// Path of this leaf within the space tree.
    pub fn path(&self) -> &TreePath {
        &self.path
    }

    /// Number of DOFs this leaf has on the bound cell.
    pub fn len(&self) -> usize {
        self.global.len()
    }

    /// True when the leaf has no DOFs on the bound cell.
    pub fn is_empty(&self) -> bool {
        self.global.is_empty()
    }

    /// Start of this leaf's range in the flat local numbering.
    pub fn local_offset(&self) -> usize {
        self.local_offset
    }

    /// Global index of a leaf-local DOF.
    ///
    /// # Errors
    /// [`AssemblyError::LocalIndexOutOfRange`] beyond [`len`](Self::len).
    pub fn global_index(&self, local: usize) -> Result<usize, AssemblyError> {
        self.global
            .get(local)
            .copied()
            .ok_or(AssemblyError::LocalIndexOutOfRange {
                index: local,
                size: self.global.len(),
            })
    }

    /// Global indices of all leaf-local DOFs, in local order.
    pub fn global(&self) -> &[usize] {
        &self.global
    }

    /// Leaf-local DOFs attached to `facet` with codimension greater than
    /// zero.
    pub fn facet_dofs(&self, cell: &Cell, facet: usize) -> Vec<usize> {
        self.fem.facet_dofs(cell, facet)
    }

    /// The constraints policy attached to this leaf, if any.
    pub fn constraints(&self) -> Option<&Arc<dyn ConstraintsPolicy<T>>> {
        self.constraints.as_ref()
    }
}

/// Flat per-cell view over all leaves of a space tree.
pub struct LocalSpace<T: Scalar> {
    leaves: Vec<LeafView<T>>,
    total: usize,
    bound: Option<Cell>,
}

struct CollectLeaves<'a, T: Scalar> {
    root: &'a SpaceTree<T>,
}

impl<'a, T: Scalar> TransformFactory<SpaceTree<T>> for CollectLeaves<'a, T> {
    type Output = Vec<LeafView<T>>;

    fn leaf(
        &mut self,
        node: &SpaceTree<T>,
        path: &TreePath,
    ) -> Result<Self::Output, AssemblyError> {
        let fem = node
            .fem()
            .cloned()
            .ok_or(AssemblyError::UnsupportedTreeCombination {
                param: "leaf",
                space: "interior",
            })?;
        Ok(vec![LeafView {
            path: path.clone(),
            tree_offset: self.root.node_offset(path)?,
            fem,
            constraints: node.constraints().cloned(),
            local_offset: 0,
            global: Vec::new(),
        }])
    }

    fn interior(
        &mut self,
        _node: &SpaceTree<T>,
        _path: &TreePath,
        children: Vec<Self::Output>,
    ) -> Result<Self::Output, AssemblyError> {
        Ok(children.into_iter().flatten().collect())
    }
}

impl<T: Scalar> LocalSpace<T> {
    /// Prepare a local space for `tree`; no cell is bound yet.
    pub fn new(tree: &SpaceTree<T>) -> Result<Self, AssemblyError> {
        let leaves = transform(tree, &mut CollectLeaves { root: tree })?;
        Ok(Self {
            leaves,
            total: 0,
            bound: None,
        })
    }

    /// Bind to a cell, recomputing every leaf's global indices.
    pub fn bind(&mut self, cell: &Cell) -> Result<(), AssemblyError> {
        let mut offset = 0usize;
        for leaf in &mut self.leaves {
            let n = leaf.fem.local_size(cell);
            leaf.local_offset = offset;
            leaf.global.clear();
            leaf.global.reserve(n);
            for l in 0..n {
                leaf.global.push(leaf.tree_offset + leaf.fem.global_index(cell, l)?);
            }
            offset += n;
        }
        self.total = offset;
        self.bound = Some(*cell);
        Ok(())
    }

    /// The cell currently bound.
    ///
    /// # Errors
    /// [`AssemblyError::LocalSpaceUnbound`] before the first `bind`.
    pub fn cell(&self) -> Result<&Cell, AssemblyError> {
        self.bound.as_ref().ok_or(AssemblyError::LocalSpaceUnbound)
    }

    /// Number of DOFs on the bound cell, over all leaves.
    pub fn size(&self) -> Result<usize, AssemblyError> {
        self.cell()?;
        Ok(self.total)
    }

    /// Global index of a flat local DOF.
    pub fn global_index(&self, local: usize) -> Result<usize, AssemblyError> {
        self.cell()?;
        for leaf in &self.leaves {
            if local < leaf.local_offset + leaf.global.len() {
                return leaf.global_index(local - leaf.local_offset);
            }
        }
        Err(AssemblyError::LocalIndexOutOfRange {
            index: local,
            size: self.total,
        })
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Leaves in depth-first order.
    pub fn leaves(&self) -> &[LeafView<T>] {
        &self.leaves
    }

    /// One leaf by flat position.
    pub fn leaf(&self, index: usize) -> Result<&LeafView<T>, AssemblyError> {
        self.leaves
            .get(index)
            .ok_or(AssemblyError::ChildIndexOutOfRange {
                index,
                children: self.leaves.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridTopology, IntervalGrid};
    use crate::space::{P0IntervalMap, P1IntervalMap};

    fn two_field_space() -> SpaceTree<f64> {
        SpaceTree::composite(vec![
            SpaceTree::leaf(Arc::new(P1IntervalMap::new(3))),
            SpaceTree::leaf(Arc::new(P0IntervalMap::new(3))),
        ])
    }

    #[test]
    fn unbound_reads_fail() {
        let space = two_field_space();
        let lfs = LocalSpace::new(&space).unwrap();
        assert_eq!(lfs.size(), Err(AssemblyError::LocalSpaceUnbound));
        assert_eq!(lfs.global_index(0), Err(AssemblyError::LocalSpaceUnbound));
    }

    #[test]
    fn bind_maps_into_tree_blocks() {
        let space = two_field_space();
        let grid = IntervalGrid::new(3, 3.0);
        let mut lfs = LocalSpace::new(&space).unwrap();
        lfs.bind(&grid.cell(1).unwrap()).unwrap();
        assert_eq!(lfs.size().unwrap(), 3);
        // P1 vertices 1, 2 then the P0 DOF shifted past the P1 block (4)
        assert_eq!(lfs.global_index(0).unwrap(), 1);
        assert_eq!(lfs.global_index(1).unwrap(), 2);
        assert_eq!(lfs.global_index(2).unwrap(), 4 + 1);
        assert!(matches!(
            lfs.global_index(3),
            Err(AssemblyError::LocalIndexOutOfRange { index: 3, .. })
        ));
    }

    #[test]
    fn rebinding_moves_the_window() {
        let space = two_field_space();
        let grid = IntervalGrid::new(3, 3.0);
        let mut lfs = LocalSpace::new(&space).unwrap();
        lfs.bind(&grid.cell(0).unwrap()).unwrap();
        assert_eq!(lfs.global_index(0).unwrap(), 0);
        lfs.bind(&grid.cell(2).unwrap()).unwrap();
        assert_eq!(lfs.global_index(0).unwrap(), 2);
        assert_eq!(lfs.cell().unwrap().index, 2);
    }

    #[test]
    fn leaf_views_expose_paths_and_facets() {
        let space = two_field_space();
        let grid = IntervalGrid::new(3, 3.0);
        let mut lfs = LocalSpace::new(&space).unwrap();
        let cell = grid.cell(1).unwrap();
        lfs.bind(&cell).unwrap();
        assert_eq!(lfs.leaf_count(), 2);
        let p1 = lfs.leaf(0).unwrap();
        assert_eq!(p1.path().indices(), &[0]);
        assert_eq!(p1.facet_dofs(&cell, 1), vec![1]);
        let p0 = lfs.leaf(1).unwrap();
        assert!(p0.facet_dofs(&cell, 0).is_empty());
        assert_eq!(p0.local_offset(), 2);
    }
}
