//! Structured grids used as fixtures in tests and examples.
//!
//! These are deliberately small implementations of [`GridTopology`]; they
//! are not a grid library. Partition tags and an optional processor cut can
//! be assigned to emulate distributed views on a single rank.

use crate::error::AssemblyError;
use crate::grid::{Cell, CellIndex, GeometryKind, GridTopology, Intersection, PartitionKind};

/// Uniform 1D grid of `n` line cells on `[0, length]`.
///
/// Facet 0 of a cell is its left end, facet 1 its right end. An optional
/// processor cut between cells `k - 1` and `k` turns the two touching facets
/// into processor faces (no neighbor, not on the domain boundary).
#[derive(Clone, Debug)]
pub struct IntervalGrid {
    n: usize,
    h: f64,
    partitions: Vec<PartitionKind>,
    cut: Option<usize>,
}

impl IntervalGrid {
    /// Grid with all cells interior.
    pub fn new(n: usize, length: f64) -> Self {
        Self {
            n,
            h: length / n as f64,
            partitions: vec![PartitionKind::Interior; n],
            cut: None,
        }
    }

    /// Override per-cell partition tags; panics on length mismatch (fixture).
    pub fn with_partitions(mut self, partitions: Vec<PartitionKind>) -> Self {
        assert_eq!(partitions.len(), self.n);
        self.partitions = partitions;
        self
    }

    /// Insert a processor cut between cells `k - 1` and `k`.
    pub fn with_processor_cut(mut self, k: usize) -> Self {
        assert!(k > 0 && k < self.n);
        self.cut = Some(k);
        self
    }

    /// Cell width.
    pub fn h(&self) -> f64 {
        self.h
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.n + 1
    }
}

impl GridTopology for IntervalGrid {
    fn cell_count(&self) -> usize {
        self.n
    }

    fn cell(&self, index: CellIndex) -> Result<Cell, AssemblyError> {
        if index >= self.n {
            return Err(AssemblyError::UnknownCell { cell: index });
        }
        Ok(Cell {
            index,
            geometry: GeometryKind::Cube(1),
            partition: self.partitions[index],
        })
    }

    fn intersections(&self, index: CellIndex) -> Result<Vec<Intersection>, AssemblyError> {
        if index >= self.n {
            return Err(AssemblyError::UnknownCell { cell: index });
        }
        let cut_left = self.cut == Some(index);
        let cut_right = self.cut == Some(index + 1);
        let left = Intersection {
            inside: index,
            facet: 0,
            neighbor: if index > 0 && !cut_left {
                Some(index - 1)
            } else {
                None
            },
            boundary: index == 0,
            center: [index as f64 * self.h, 0.0],
        };
        let right = Intersection {
            inside: index,
            facet: 1,
            neighbor: if index + 1 < self.n && !cut_right {
                Some(index + 1)
            } else {
                None
            },
            boundary: index + 1 == self.n,
            center: [(index + 1) as f64 * self.h, 0.0],
        };
        Ok(vec![left, right])
    }
}

/// Uniform 2D grid of `nx × ny` quadrilaterals on `[0, lx] × [0, ly]`.
///
/// Cell `(x, y)` has index `y * nx + x`; facets are 0 = left, 1 = right,
/// 2 = bottom, 3 = top.
#[derive(Clone, Debug)]
pub struct QuadGrid {
    nx: usize,
    ny: usize,
    hx: f64,
    hy: f64,
    partitions: Vec<PartitionKind>,
}

impl QuadGrid {
    /// Grid with all cells interior.
    pub fn new(nx: usize, ny: usize, lx: f64, ly: f64) -> Self {
        Self {
            nx,
            ny,
            hx: lx / nx as f64,
            hy: ly / ny as f64,
            partitions: vec![PartitionKind::Interior; nx * ny],
        }
    }

    /// Override per-cell partition tags; panics on length mismatch (fixture).
    pub fn with_partitions(mut self, partitions: Vec<PartitionKind>) -> Self {
        assert_eq!(partitions.len(), self.nx * self.ny);
        self.partitions = partitions;
        self
    }

    /// Cells per row.
    pub fn nx(&self) -> usize {
        self.nx
    }

    /// Cells per column.
    pub fn ny(&self) -> usize {
        self.ny
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        (self.nx + 1) * (self.ny + 1)
    }

    /// Number of facets (vertical then horizontal edges).
    pub fn facet_count(&self) -> usize {
        (self.nx + 1) * self.ny + self.nx * (self.ny + 1)
    }

    fn coords(&self, index: CellIndex) -> (usize, usize) {
        (index % self.nx, index / self.nx)
    }
}

impl GridTopology for QuadGrid {
    fn cell_count(&self) -> usize {
        self.nx * self.ny
    }

    fn cell(&self, index: CellIndex) -> Result<Cell, AssemblyError> {
        if index >= self.nx * self.ny {
            return Err(AssemblyError::UnknownCell { cell: index });
        }
        Ok(Cell {
            index,
            geometry: GeometryKind::Cube(2),
            partition: self.partitions[index],
        })
    }

    fn intersections(&self, index: CellIndex) -> Result<Vec<Intersection>, AssemblyError> {
        if index >= self.nx * self.ny {
            return Err(AssemblyError::UnknownCell { cell: index });
        }
        let (x, y) = self.coords(index);
        let (hx, hy) = (self.hx, self.hy);
        let cx = x as f64 * hx;
        let cy = y as f64 * hy;
        let mk = |facet: usize, neighbor: Option<CellIndex>, boundary: bool, center: [f64; 2]| {
            Intersection {
                inside: index,
                facet,
                neighbor,
                boundary,
                center,
            }
        };
        Ok(vec![
            mk(
                0,
                (x > 0).then(|| index - 1),
                x == 0,
                [cx, cy + 0.5 * hy],
            ),
            mk(
                1,
                (x + 1 < self.nx).then(|| index + 1),
                x + 1 == self.nx,
                [cx + hx, cy + 0.5 * hy],
            ),
            mk(
                2,
                (y > 0).then(|| index - self.nx),
                y == 0,
                [cx + 0.5 * hx, cy],
            ),
            mk(
                3,
                (y + 1 < self.ny).then(|| index + self.nx),
                y + 1 == self.ny,
                [cx + 0.5 * hx, cy + hy],
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::IntersectionKind;

    #[test]
    fn interval_boundary_and_skeleton() {
        let g = IntervalGrid::new(3, 3.0);
        let first = g.intersections(0).unwrap();
        assert_eq!(first[0].kind(), IntersectionKind::Boundary);
        assert_eq!(first[1].kind(), IntersectionKind::Skeleton);
        assert_eq!(first[1].neighbor, Some(1));
        let last = g.intersections(2).unwrap();
        assert_eq!(last[1].kind(), IntersectionKind::Boundary);
        assert!((last[1].center[0] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn processor_cut_strips_the_neighbor() {
        let g = IntervalGrid::new(4, 4.0).with_processor_cut(2);
        let left = g.intersections(1).unwrap();
        assert_eq!(left[1].kind(), IntersectionKind::Processor);
        let right = g.intersections(2).unwrap();
        assert_eq!(right[0].kind(), IntersectionKind::Processor);
        // faces away from the cut are untouched
        assert_eq!(right[1].kind(), IntersectionKind::Skeleton);
    }

    #[test]
    fn quad_neighbors_and_centers() {
        let g = QuadGrid::new(2, 2, 2.0, 2.0);
        let f = g.intersections(0).unwrap();
        assert_eq!(f[0].kind(), IntersectionKind::Boundary);
        assert_eq!(f[1].neighbor, Some(1));
        assert_eq!(f[3].neighbor, Some(2));
        assert_eq!(f[1].center, [1.0, 0.5]);
        assert_eq!(f[3].center, [0.5, 1.0]);
    }

    #[test]
    fn unknown_cell_is_rejected() {
        let g = IntervalGrid::new(2, 1.0);
        assert!(matches!(
            g.cell(2),
            Err(AssemblyError::UnknownCell { cell: 2 })
        ));
    }
}
