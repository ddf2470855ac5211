//! Narrow grid contract consumed by the assembly engine.
//!
//! The engine never walks geometry itself; it sees cells with a partition
//! tag, a geometry kind, and per-cell intersections carrying a
//! (neighbor, boundary) pair. Everything else about the grid stays on the
//! host side. [`structured`] provides small structured grids used as test
//! fixtures and in examples.

pub mod structured;

pub use structured::{IntervalGrid, QuadGrid};

use crate::error::AssemblyError;
use hashbrown::HashMap;

/// Index of a cell within its grid view.
pub type CellIndex = usize;

/// Ownership class of a cell in a distributed grid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PartitionKind {
    /// Owned and computed here.
    Interior,
    /// Owned here, shared with a neighbor rank.
    Border,
    /// Copy of a remote-owned cell inside the overlap region.
    Overlap,
    /// Copy of a remote-owned cell outside the overlap region.
    Ghost,
}

impl PartitionKind {
    /// True for cells this rank assembles over.
    pub fn is_owned(self) -> bool {
        matches!(self, PartitionKind::Interior | PartitionKind::Border)
    }
}

/// Reference-geometry kind of a cell, by dimension.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum GeometryKind {
    /// Simplex of the given dimension (line, triangle, tetrahedron).
    Simplex(u8),
    /// Cube of the given dimension (line, quadrilateral, hexahedron).
    Cube(u8),
}

/// A cell as the engine sees it.
#[derive(Copy, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Cell {
    /// Index within the grid view.
    pub index: CellIndex,
    /// Reference geometry.
    pub geometry: GeometryKind,
    /// Ownership class.
    pub partition: PartitionKind,
}

/// Classification of an intersection from its (neighbor, boundary) pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum IntersectionKind {
    /// No neighbor, not on the domain boundary: a rank boundary.
    Processor,
    /// Neighbor, not on the domain boundary: an interior face.
    Skeleton,
    /// No neighbor, on the domain boundary.
    Boundary,
    /// Neighbor and on the domain boundary: a periodic face.
    Periodic,
}

impl IntersectionKind {
    /// Classify from the two flags the grid reports.
    pub fn classify(has_neighbor: bool, on_boundary: bool) -> Self {
        match (has_neighbor, on_boundary) {
            (false, false) => IntersectionKind::Processor,
            (true, false) => IntersectionKind::Skeleton,
            (false, true) => IntersectionKind::Boundary,
            (true, true) => IntersectionKind::Periodic,
        }
    }
}

/// One face of a cell, with the data intersection hooks need.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Intersection {
    /// Cell this intersection was taken from.
    pub inside: CellIndex,
    /// Facet number within the inside cell's reference geometry.
    pub facet: usize,
    /// The cell on the other side, if any.
    pub neighbor: Option<CellIndex>,
    /// Whether the face lies on the domain boundary.
    pub boundary: bool,
    /// Global coordinates of the face center.
    pub center: [f64; 2],
}

impl Intersection {
    /// Classification from the (neighbor, boundary) pair.
    pub fn kind(&self) -> IntersectionKind {
        IntersectionKind::classify(self.neighbor.is_some(), self.boundary)
    }
}

/// The topology surface the assembly engine requires of a grid.
pub trait GridTopology {
    /// Number of cells in the view.
    fn cell_count(&self) -> usize;

    /// Cell metadata.
    ///
    /// # Errors
    /// [`AssemblyError::UnknownCell`] for an index outside the view.
    fn cell(&self, index: CellIndex) -> Result<Cell, AssemblyError>;

    /// All intersections of a cell, in facet order.
    fn intersections(&self, index: CellIndex) -> Result<Vec<Intersection>, AssemblyError>;
}

/// Size of the id range claimed per geometry kind.
const GEOMETRY_CHUNK: u64 = 1 << 28;

/// Grid-wide unique cell ids.
///
/// Each geometry kind claims the next `1 << 28`-sized chunk of the id space
/// in first-seen cell order; a cell's id is its grid index plus its kind's
/// chunk offset. Ids are used to pick the owning side of a skeleton face.
#[derive(Clone, Debug, Default)]
pub struct CellIdMapper {
    offsets: HashMap<GeometryKind, u64>,
    next: u64,
}

impl CellIdMapper {
    /// Scan the grid once and assign chunk offsets.
    pub fn new<G: GridTopology>(grid: &G) -> Result<Self, AssemblyError> {
        let mut mapper = Self::default();
        for index in 0..grid.cell_count() {
            let cell = grid.cell(index)?;
            if !mapper.offsets.contains_key(&cell.geometry) {
                let off = mapper.next;
                mapper.next += GEOMETRY_CHUNK;
                mapper.offsets.insert(cell.geometry, off);
            }
        }
        Ok(mapper)
    }

    /// Unique id of a cell.
    ///
    /// # Errors
    /// [`AssemblyError::UnknownCell`] when the cell's geometry kind was not
    /// present during construction.
    pub fn id(&self, cell: &Cell) -> Result<u64, AssemblyError> {
        let off = self
            .offsets
            .get(&cell.geometry)
            .ok_or(AssemblyError::UnknownCell { cell: cell.index })?;
        Ok(off + cell.index as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_table() {
        assert_eq!(
            IntersectionKind::classify(false, false),
            IntersectionKind::Processor
        );
        assert_eq!(
            IntersectionKind::classify(true, false),
            IntersectionKind::Skeleton
        );
        assert_eq!(
            IntersectionKind::classify(false, true),
            IntersectionKind::Boundary
        );
        assert_eq!(
            IntersectionKind::classify(true, true),
            IntersectionKind::Periodic
        );
    }

    #[test]
    fn id_mapper_chunks_by_geometry() {
        struct Mixed;
        impl GridTopology for Mixed {
            fn cell_count(&self) -> usize {
                4
            }
            fn cell(&self, index: CellIndex) -> Result<Cell, AssemblyError> {
                let geometry = if index < 2 {
                    GeometryKind::Cube(2)
                } else {
                    GeometryKind::Simplex(2)
                };
                Ok(Cell {
                    index,
                    geometry,
                    partition: PartitionKind::Interior,
                })
            }
            fn intersections(&self, _: CellIndex) -> Result<Vec<Intersection>, AssemblyError> {
                Ok(Vec::new())
            }
        }

        let mapper = CellIdMapper::new(&Mixed).unwrap();
        let quad = Mixed.cell(1).unwrap();
        let tri = Mixed.cell(2).unwrap();
        assert_eq!(mapper.id(&quad).unwrap(), 1);
        assert_eq!(mapper.id(&tri).unwrap(), (1u64 << 28) + 2);
    }

    #[test]
    fn id_mapper_rejects_unseen_geometry() {
        let mapper = CellIdMapper::default();
        let cell = Cell {
            index: 0,
            geometry: GeometryKind::Cube(1),
            partition: PartitionKind::Interior,
        };
        assert_eq!(
            mapper.id(&cell),
            Err(AssemblyError::UnknownCell { cell: 0 })
        );
    }
}
