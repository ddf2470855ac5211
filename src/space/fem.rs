//! Finite-element map contract and reference implementations.
//!
//! A [`FiniteElementMap`] is the narrow surface a leaf space needs from the
//! host's element library: how many DOFs the leaf carries in total, how many
//! sit on a given cell, where each local DOF lands in the leaf's own global
//! numbering, and which local DOFs are attached to a facet with positive
//! codimension. Shape functions, quadrature, and geometry stay on the host
//! side.

use crate::error::AssemblyError;
use crate::grid::Cell;

/// Per-leaf DOF layout provider.
pub trait FiniteElementMap: Send + Sync {
    /// Total number of DOFs of this leaf over the whole grid view.
    fn size(&self) -> usize;

    /// Number of DOFs on one cell.
    fn local_size(&self, cell: &Cell) -> usize;

    /// Global index (within this leaf's numbering) of a cell-local DOF.
    ///
    /// # Errors
    /// [`AssemblyError::LocalIndexOutOfRange`] when `local` exceeds
    /// [`local_size`](Self::local_size).
    fn global_index(&self, cell: &Cell, local: usize) -> Result<usize, AssemblyError>;

    /// Local DOFs attached to `facet` with codimension greater than zero.
    ///
    /// Cell-interior DOFs never appear here; a return of the empty vector
    /// means nothing on this cell is pinned by a facet condition.
    fn facet_dofs(&self, cell: &Cell, facet: usize) -> Vec<usize>;
}

/// Continuous piecewise linears on a 1D interval grid: one DOF per vertex.
#[derive(Clone, Debug)]
pub struct P1IntervalMap {
    cells: usize,
}

impl P1IntervalMap {
    /// Map over a grid of `cells` line cells.
    pub fn new(cells: usize) -> Self {
        Self { cells }
    }
}

impl FiniteElementMap for P1IntervalMap {
    fn size(&self) -> usize {
        self.cells + 1
    }

    fn local_size(&self, _cell: &Cell) -> usize {
        2
    }

    fn global_index(&self, cell: &Cell, local: usize) -> Result<usize, AssemblyError> {
        if local >= 2 {
            return Err(AssemblyError::LocalIndexOutOfRange {
                index: local,
                size: 2,
            });
        }
        Ok(cell.index + local)
    }

    fn facet_dofs(&self, _cell: &Cell, facet: usize) -> Vec<usize> {
        // vertex `facet` sits on facet `facet`
        if facet < 2 { vec![facet] } else { Vec::new() }
    }
}

/// Piecewise constants on a 1D interval grid: one cell-interior DOF.
#[derive(Clone, Debug)]
pub struct P0IntervalMap {
    cells: usize,
}

impl P0IntervalMap {
    /// Map over a grid of `cells` line cells.
    pub fn new(cells: usize) -> Self {
        Self { cells }
    }
}

impl FiniteElementMap for P0IntervalMap {
    fn size(&self) -> usize {
        self.cells
    }

    fn local_size(&self, _cell: &Cell) -> usize {
        1
    }

    fn global_index(&self, cell: &Cell, local: usize) -> Result<usize, AssemblyError> {
        if local >= 1 {
            return Err(AssemblyError::LocalIndexOutOfRange {
                index: local,
                size: 1,
            });
        }
        Ok(cell.index)
    }

    fn facet_dofs(&self, _cell: &Cell, _facet: usize) -> Vec<usize> {
        Vec::new()
    }
}

/// Continuous bilinears on a structured quad grid: one DOF per vertex.
///
/// Local DOF order is (0,0), (1,0), (0,1), (1,1) in reference coordinates;
/// facets follow the grid convention 0 = left, 1 = right, 2 = bottom,
/// 3 = top.
#[derive(Clone, Debug)]
pub struct Q1QuadMap {
    nx: usize,
    ny: usize,
}

impl Q1QuadMap {
    /// Map over an `nx × ny` quad grid.
    pub fn new(nx: usize, ny: usize) -> Self {
        Self { nx, ny }
    }
}

impl FiniteElementMap for Q1QuadMap {
    fn size(&self) -> usize {
        (self.nx + 1) * (self.ny + 1)
    }

    fn local_size(&self, _cell: &Cell) -> usize {
        4
    }

    fn global_index(&self, cell: &Cell, local: usize) -> Result<usize, AssemblyError> {
        if local >= 4 {
            return Err(AssemblyError::LocalIndexOutOfRange {
                index: local,
                size: 4,
            });
        }
        let (x, y) = (cell.index % self.nx, cell.index / self.nx);
        let (dx, dy) = (local % 2, local / 2);
        Ok((y + dy) * (self.nx + 1) + x + dx)
    }

    fn facet_dofs(&self, _cell: &Cell, facet: usize) -> Vec<usize> {
        match facet {
            0 => vec![0, 2],
            1 => vec![1, 3],
            2 => vec![0, 1],
            3 => vec![2, 3],
            _ => Vec::new(),
        }
    }
}

/// Lowest-order face elements on a structured quad grid: one DOF per facet.
///
/// Vertical edges are numbered first (`y * (nx + 1) + x`), then horizontal
/// edges.
#[derive(Clone, Debug)]
pub struct RT0QuadMap {
    nx: usize,
    ny: usize,
}

impl RT0QuadMap {
    /// Map over an `nx × ny` quad grid.
    pub fn new(nx: usize, ny: usize) -> Self {
        Self { nx, ny }
    }

    fn vertical_count(&self) -> usize {
        (self.nx + 1) * self.ny
    }
}

impl FiniteElementMap for RT0QuadMap {
    fn size(&self) -> usize {
        self.vertical_count() + self.nx * (self.ny + 1)
    }

    fn local_size(&self, _cell: &Cell) -> usize {
        4
    }

    fn global_index(&self, cell: &Cell, local: usize) -> Result<usize, AssemblyError> {
        let (x, y) = (cell.index % self.nx, cell.index / self.nx);
        match local {
            0 => Ok(y * (self.nx + 1) + x),
            1 => Ok(y * (self.nx + 1) + x + 1),
            2 => Ok(self.vertical_count() + y * self.nx + x),
            3 => Ok(self.vertical_count() + (y + 1) * self.nx + x),
            _ => Err(AssemblyError::LocalIndexOutOfRange {
                index: local,
                size: 4,
            }),
        }
    }

    fn facet_dofs(&self, _cell: &Cell, facet: usize) -> Vec<usize> {
        if facet < 4 { vec![facet] } else { Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GeometryKind, PartitionKind};

    fn cell(index: usize, dim: u8) -> Cell {
        Cell {
            index,
            geometry: GeometryKind::Cube(dim),
            partition: PartitionKind::Interior,
        }
    }

    #[test]
    fn p1_interval_shares_vertices() {
        let fem = P1IntervalMap::new(3);
        assert_eq!(fem.size(), 4);
        assert_eq!(fem.global_index(&cell(1, 1), 0).unwrap(), 1);
        assert_eq!(fem.global_index(&cell(0, 1), 1).unwrap(), 1);
        assert_eq!(fem.facet_dofs(&cell(1, 1), 1), vec![1]);
    }

    #[test]
    fn p0_has_no_facet_dofs() {
        let fem = P0IntervalMap::new(3);
        assert_eq!(fem.size(), 3);
        assert!(fem.facet_dofs(&cell(0, 1), 0).is_empty());
    }

    #[test]
    fn q1_quad_vertex_numbering() {
        let fem = Q1QuadMap::new(2, 2);
        assert_eq!(fem.size(), 9);
        // cell 3 is (1,1); its (1,1) corner is vertex (2,2) = 8
        assert_eq!(fem.global_index(&cell(3, 2), 3).unwrap(), 8);
        // shared edge between cells 0 and 1: right facet of 0, left of 1
        let c0 = cell(0, 2);
        let c1 = cell(1, 2);
        let right: Vec<_> = fem
            .facet_dofs(&c0, 1)
            .into_iter()
            .map(|l| fem.global_index(&c0, l).unwrap())
            .collect();
        let left: Vec<_> = fem
            .facet_dofs(&c1, 0)
            .into_iter()
            .map(|l| fem.global_index(&c1, l).unwrap())
            .collect();
        assert_eq!(right, left);
    }

    #[test]
    fn rt0_one_dof_per_facet() {
        let fem = RT0QuadMap::new(2, 1);
        // 3 vertical + 4 horizontal edges
        assert_eq!(fem.size(), 7);
        let c0 = cell(0, 2);
        let c1 = cell(1, 2);
        // shared vertical edge
        assert_eq!(
            fem.global_index(&c0, 1).unwrap(),
            fem.global_index(&c1, 0).unwrap()
        );
        assert_eq!(fem.facet_dofs(&c0, 3), vec![3]);
    }
}
