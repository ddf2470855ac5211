//! Rank-boundary data movement for partitioned grids.
//!
//! Transport is not provided here. A [`DofDataHandle`] packs and unpacks
//! per-cell payloads against a global vector, and a [`DofDelta`] policy
//! decides how a value leaves the sender (`restrict`), how it merges on
//! the receiver (`fuse`), and what happens to non-owned entries after a
//! round (`post_receive`). The caller pairs the handle with whatever
//! moves the bytes.

use crate::backend::GlobalVector;
use crate::error::AssemblyError;
use crate::grid::{CellIndex, GridTopology, PartitionKind};
use crate::scalar::Scalar;
use crate::space::{LocalSpace, SpaceTree};

/// Rank offset added to non-owned candidates during ownership election,
/// so any owned candidate wins the min-reduction.
pub const RANK_PENALTY: u64 = 1 << 24;

fn rank_penalty<T: Scalar>() -> T {
    T::from(RANK_PENALTY).unwrap_or_else(T::max_value)
}

/// Per-entry merge policy of one exchange round.
pub trait DofDelta<T: Scalar>: Send + Sync {
    /// Value the sender puts on the wire.
    fn restrict(&self, _part: PartitionKind, value: T) -> T {
        value
    }

    /// Merge an incoming value into the receiver's entry.
    fn fuse(&self, part: PartitionKind, local: &mut T, incoming: T);

    /// Cleanup applied to every entry after the round.
    fn post_receive(&self, _part: PartitionKind, _value: &mut T) {}
}

/// Sum contributions from all ranks.
#[derive(Copy, Clone, Debug, Default)]
pub struct AddDelta;

impl<T: Scalar> DofDelta<T> for AddDelta {
    fn fuse(&self, _part: PartitionKind, local: &mut T, incoming: T) {
        *local += incoming;
    }
}

/// Sum contributions, then zero the entries this rank does not own.
#[derive(Copy, Clone, Debug, Default)]
pub struct AddClearDelta;

impl<T: Scalar> DofDelta<T> for AddClearDelta {
    fn fuse(&self, _part: PartitionKind, local: &mut T, incoming: T) {
        *local += incoming;
    }

    fn post_receive(&self, part: PartitionKind, value: &mut T) {
        if !part.is_owned() {
            *value = T::zero();
        }
    }
}

/// Owner's value overwrites ghost copies.
#[derive(Copy, Clone, Debug, Default)]
pub struct CopyDelta;

impl<T: Scalar> DofDelta<T> for CopyDelta {
    fn restrict(&self, part: PartitionKind, value: T) -> T {
        // only owners publish; ghosts send neutral data
        if part.is_owned() { value } else { T::zero() }
    }

    fn fuse(&self, part: PartitionKind, local: &mut T, incoming: T) {
        if !part.is_owned() {
            *local = incoming;
        }
    }
}

/// Keep the smallest value seen across ranks.
#[derive(Copy, Clone, Debug, Default)]
pub struct MinDelta;

impl<T: Scalar> DofDelta<T> for MinDelta {
    fn fuse(&self, _part: PartitionKind, local: &mut T, incoming: T) {
        if incoming < *local {
            *local = incoming;
        }
    }
}

/// Keep the largest value seen across ranks.
#[derive(Copy, Clone, Debug, Default)]
pub struct MaxDelta;

impl<T: Scalar> DofDelta<T> for MaxDelta {
    fn fuse(&self, _part: PartitionKind, local: &mut T, incoming: T) {
        if incoming > *local {
            *local = incoming;
        }
    }
}

/// Ownership election: entries hold candidate ranks, non-owned senders
/// penalize theirs, and the min-reduction leaves the owning rank.
#[derive(Copy, Clone, Debug, Default)]
pub struct PartitionDelta;

impl<T: Scalar> DofDelta<T> for PartitionDelta {
    fn restrict(&self, part: PartitionKind, value: T) -> T {
        if part.is_owned() {
            value
        } else {
            value + rank_penalty::<T>()
        }
    }

    fn fuse(&self, _part: PartitionKind, local: &mut T, incoming: T) {
        if incoming < *local {
            *local = incoming;
        }
    }
}

/// Ghost detection: non-owned senders mark their entries with one.
#[derive(Copy, Clone, Debug, Default)]
pub struct GhostDelta;

impl<T: Scalar> DofDelta<T> for GhostDelta {
    fn restrict(&self, part: PartitionKind, value: T) -> T {
        if part.is_owned() { value } else { T::one() }
    }

    fn fuse(&self, _part: PartitionKind, local: &mut T, incoming: T) {
        if incoming > *local {
            *local = incoming;
        }
    }
}

/// Packs and unpacks per-cell payloads of a function space.
pub struct DofDataHandle<T: Scalar> {
    lfs: LocalSpace<T>,
}

impl<T: Scalar> DofDataHandle<T> {
    pub fn new(space: &SpaceTree<T>) -> Result<Self, AssemblyError> {
        Ok(Self {
            lfs: LocalSpace::new(space)?,
        })
    }

    /// Payload length of one cell.
    pub fn payload_len<G: GridTopology>(
        &mut self,
        grid: &G,
        cell: CellIndex,
    ) -> Result<usize, AssemblyError> {
        self.lfs.bind(&grid.cell(cell)?)?;
        self.lfs.size()
    }

    /// Collect the wire payload of one cell, restricted for sending.
    pub fn gather<G, D, X>(
        &mut self,
        grid: &G,
        cell: CellIndex,
        delta: &D,
        x: &X,
    ) -> Result<Vec<T>, AssemblyError>
    where
        G: GridTopology,
        D: DofDelta<T>,
        X: GlobalVector<T>,
    {
        let entity = grid.cell(cell)?;
        self.lfs.bind(&entity)?;
        let mut payload = Vec::with_capacity(self.lfs.size()?);
        for i in 0..self.lfs.size()? {
            let value = x.get(self.lfs.global_index(i)?)?;
            payload.push(delta.restrict(entity.partition, value));
        }
        Ok(payload)
    }

    /// Fuse an incoming payload into one cell's entries.
    pub fn scatter<G, D, X>(
        &mut self,
        grid: &G,
        cell: CellIndex,
        delta: &D,
        x: &mut X,
        payload: &[T],
    ) -> Result<(), AssemblyError>
    where
        G: GridTopology,
        D: DofDelta<T>,
        X: GlobalVector<T>,
    {
        let entity = grid.cell(cell)?;
        self.lfs.bind(&entity)?;
        let expected = self.lfs.size()?;
        if payload.len() != expected {
            return Err(AssemblyError::ScatterLengthMismatch {
                cell,
                expected,
                found: payload.len(),
            });
        }
        for (i, &incoming) in payload.iter().enumerate() {
            let g = self.lfs.global_index(i)?;
            let mut value = x.get(g)?;
            delta.fuse(entity.partition, &mut value, incoming);
            x.set(g, value)?;
        }
        Ok(())
    }

    /// Run a delta's cleanup over one cell's entries.
    pub fn post_receive<G, D, X>(
        &mut self,
        grid: &G,
        cell: CellIndex,
        delta: &D,
        x: &mut X,
    ) -> Result<(), AssemblyError>
    where
        G: GridTopology,
        D: DofDelta<T>,
        X: GlobalVector<T>,
    {
        let entity = grid.cell(cell)?;
        self.lfs.bind(&entity)?;
        for i in 0..self.lfs.size()? {
            let g = self.lfs.global_index(i)?;
            let mut value = x.get(g)?;
            delta.post_receive(entity.partition, &mut value);
            x.set(g, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::IntervalGrid;
    use crate::space::{P1IntervalMap, SpaceTree};
    use std::sync::Arc;

    fn setup() -> (IntervalGrid, SpaceTree<f64>) {
        let grid = IntervalGrid::new(3, 3.0).with_partitions(vec![
            PartitionKind::Interior,
            PartitionKind::Border,
            PartitionKind::Ghost,
        ]);
        let space = SpaceTree::leaf(Arc::new(P1IntervalMap::new(3)));
        (grid, space)
    }

    #[test]
    fn add_round_trip_accumulates() {
        let (grid, space) = setup();
        let mut handle = DofDataHandle::new(&space).unwrap();
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let payload = handle.gather(&grid, 1, &AddDelta, &x).unwrap();
        assert_eq!(payload, vec![2.0, 3.0]);

        let mut y = vec![10.0, 10.0, 10.0, 10.0];
        handle.scatter(&grid, 1, &AddDelta, &mut y, &payload).unwrap();
        assert_eq!(y, vec![10.0, 12.0, 13.0, 10.0]);
    }

    #[test]
    fn scatter_rejects_wrong_payload_length() {
        let (grid, space) = setup();
        let mut handle = DofDataHandle::new(&space).unwrap();
        let mut y = vec![0.0; 4];
        let err = handle
            .scatter(&grid, 0, &AddDelta, &mut y, &[1.0, 2.0, 3.0])
            .unwrap_err();
        assert_eq!(
            err,
            AssemblyError::ScatterLengthMismatch {
                cell: 0,
                expected: 2,
                found: 3,
            }
        );
    }

    #[test]
    fn copy_delta_only_overwrites_ghost_entries() {
        let (grid, space) = setup();
        let mut handle = DofDataHandle::new(&space).unwrap();
        let mut y = vec![5.0, 5.0, 5.0, 5.0];
        // cell 2 is a ghost cell; the owner's values replace ours
        handle
            .scatter(&grid, 2, &CopyDelta, &mut y, &[8.0, 9.0])
            .unwrap();
        assert_eq!(y, vec![5.0, 5.0, 8.0, 9.0]);
        // cell 0 is interior; incoming data must not clobber it
        handle
            .scatter(&grid, 0, &CopyDelta, &mut y, &[7.0, 7.0])
            .unwrap();
        assert_eq!(y[0], 5.0);
    }

    #[test]
    fn partition_delta_elects_the_owner() {
        let (grid, space) = setup();
        let mut handle = DofDataHandle::new(&space).unwrap();
        // entries hold this rank's id as the candidate
        let ranks = vec![3.0; 4];
        let owned = handle.gather(&grid, 0, &PartitionDelta, &ranks).unwrap();
        assert_eq!(owned, vec![3.0, 3.0]);
        let ghost = handle.gather(&grid, 2, &PartitionDelta, &ranks).unwrap();
        assert!(ghost.iter().all(|&v| v >= RANK_PENALTY as f64));

        // a penalized candidate loses against a genuine owner
        let mut local = vec![RANK_PENALTY as f64 + 1.0; 4];
        handle
            .scatter(&grid, 0, &PartitionDelta, &mut local, &[0.0, 0.0])
            .unwrap();
        assert_eq!(local[0], 0.0);
    }

    #[test]
    fn add_clear_zeroes_non_owned_after_the_round() {
        let (grid, space) = setup();
        let mut handle = DofDataHandle::new(&space).unwrap();
        let mut y = vec![1.0, 1.0, 1.0, 1.0];
        handle
            .post_receive(&grid, 2, &AddClearDelta, &mut y)
            .unwrap();
        // cell 2 is ghost, so its entries are cleared
        assert_eq!(y, vec![1.0, 1.0, 0.0, 0.0]);
        handle
            .post_receive(&grid, 0, &AddClearDelta, &mut y)
            .unwrap();
        assert_eq!(y[0], 1.0);
    }

    #[test]
    fn ghost_delta_marks_non_owned_senders() {
        let (grid, space) = setup();
        let mut handle = DofDataHandle::new(&space).unwrap();
        let flags = vec![0.0; 4];
        let from_ghost = handle.gather(&grid, 2, &GhostDelta, &flags).unwrap();
        assert_eq!(from_ghost, vec![1.0, 1.0]);
        let from_owner = handle.gather(&grid, 0, &GhostDelta, &flags).unwrap();
        assert_eq!(from_owner, vec![0.0, 0.0]);

        let mut local = vec![0.0; 4];
        handle
            .scatter(&grid, 2, &GhostDelta, &mut local, &from_ghost)
            .unwrap();
        assert_eq!(local, vec![0.0, 0.0, 1.0, 1.0]);
    }
}
