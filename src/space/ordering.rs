//! DOF orderings: mapping child-local indices into a node's index range.
//!
//! Every node of a function-space tree owns an ordering. The shipped
//! [`LexicographicOrdering`] concatenates child index ranges in child order;
//! alternative merge strategies implement [`Ordering`] with the same
//! contract.

use crate::error::{AssemblyError, DebugInvariants};
use itertools::Itertools;

/// Contract every ordering fulfills.
///
/// `update` must be called after any structural change below the owning
/// node; every read of a dirty ordering fails with
/// [`AssemblyError::OrderingNotUpdated`].
pub trait Ordering {
    /// Recompute internal tables from the current child sizes.
    fn update(&mut self, child_sizes: &[usize]);

    /// Mark the ordering as needing an update.
    fn mark_dirty(&mut self);

    /// Total number of indices managed by the owning node.
    fn size(&self) -> Result<usize, AssemblyError>;

    /// First index of child `child`'s range.
    fn child_offset(&self, child: usize) -> Result<usize, AssemblyError>;

    /// Map a child-local index into the owning node's range.
    fn sub_map(&self, child: usize, local: usize) -> Result<usize, AssemblyError>;

    /// Whether indices are grouped into per-entity blocks.
    fn blocked(&self) -> bool {
        false
    }

    /// First index of the block attached to an entity; only available on
    /// entity-blocked orderings.
    fn entity_offset(&self, _entity: usize) -> Result<usize, AssemblyError> {
        Err(AssemblyError::NotEntityBlocked {
            query: "entity_offset",
        })
    }

    /// First index of the block attached to an intersection; only available
    /// on entity-blocked orderings.
    fn intersection_offset(&self, _intersection: usize) -> Result<usize, AssemblyError> {
        Err(AssemblyError::NotEntityBlocked {
            query: "intersection_offset",
        })
    }
}

/// Child ranges concatenated in child order.
///
/// `offsets` has one entry per child plus a trailing total, so
/// `offsets[c]..offsets[c + 1]` is child `c`'s range.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct LexicographicOrdering {
    offsets: Vec<usize>,
    dirty: bool,
}

impl LexicographicOrdering {
    /// An ordering that has never been updated; reads fail until `update`.
    pub fn new() -> Self {
        Self {
            offsets: Vec::new(),
            dirty: true,
        }
    }

    /// The offset table, including the trailing total.
    pub fn offsets(&self) -> Result<&[usize], AssemblyError> {
        self.check()?;
        Ok(&self.offsets)
    }

    fn check(&self) -> Result<(), AssemblyError> {
        if self.dirty {
            return Err(AssemblyError::OrderingNotUpdated);
        }
        Ok(())
    }

    fn child_count(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }
}

impl Ordering for LexicographicOrdering {
    fn update(&mut self, child_sizes: &[usize]) {
        self.offsets.clear();
        self.offsets.reserve(child_sizes.len() + 1);
        let mut running = 0usize;
        self.offsets.push(running);
        for s in child_sizes {
            running += s;
            self.offsets.push(running);
        }
        self.dirty = false;
        self.debug_assert_invariants();
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn size(&self) -> Result<usize, AssemblyError> {
        self.check()?;
        Ok(*self.offsets.last().unwrap_or(&0))
    }

    fn child_offset(&self, child: usize) -> Result<usize, AssemblyError> {
        self.check()?;
        if child >= self.child_count() {
            return Err(AssemblyError::ChildIndexOutOfRange {
                index: child,
                children: self.child_count(),
            });
        }
        Ok(self.offsets[child])
    }

    fn sub_map(&self, child: usize, local: usize) -> Result<usize, AssemblyError> {
        let base = self.child_offset(child)?;
        let width = self.offsets[child + 1] - base;
        if local >= width {
            return Err(AssemblyError::LocalIndexOutOfRange {
                index: local,
                size: width,
            });
        }
        Ok(base + local)
    }
}

impl DebugInvariants for LexicographicOrdering {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "LexicographicOrdering");
    }

    fn validate_invariants(&self) -> Result<(), AssemblyError> {
        if self.dirty {
            return Ok(());
        }
        if self.offsets.first() != Some(&0) {
            return Err(AssemblyError::InvariantViolation {
                structure: "LexicographicOrdering",
                message: "offset table must start at 0".into(),
            });
        }
        for (a, b) in self.offsets.iter().tuple_windows() {
            if b < a {
                return Err(AssemblyError::InvariantViolation {
                    structure: "LexicographicOrdering",
                    message: format!("offsets not monotone: {a} followed by {b}"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_builds_running_sums() {
        let mut o = LexicographicOrdering::new();
        o.update(&[3, 0, 2]);
        assert_eq!(o.offsets().unwrap(), &[0, 3, 3, 5]);
        assert_eq!(o.size().unwrap(), 5);
        assert_eq!(o.child_offset(2).unwrap(), 3);
        assert_eq!(o.sub_map(0, 2).unwrap(), 2);
        assert_eq!(o.sub_map(2, 1).unwrap(), 4);
    }

    #[test]
    fn reads_before_update_fail() {
        let o = LexicographicOrdering::new();
        assert_eq!(o.size(), Err(AssemblyError::OrderingNotUpdated));
        let mut o = LexicographicOrdering::new();
        o.update(&[2]);
        o.mark_dirty();
        assert_eq!(o.sub_map(0, 0), Err(AssemblyError::OrderingNotUpdated));
    }

    #[test]
    fn out_of_range_queries_fail() {
        let mut o = LexicographicOrdering::new();
        o.update(&[2, 2]);
        assert!(matches!(
            o.child_offset(2),
            Err(AssemblyError::ChildIndexOutOfRange { index: 2, .. })
        ));
        assert!(matches!(
            o.sub_map(1, 2),
            Err(AssemblyError::LocalIndexOutOfRange { index: 2, size: 2 })
        ));
    }

    #[test]
    fn entity_queries_are_rejected() {
        let mut o = LexicographicOrdering::new();
        o.update(&[4]);
        assert_eq!(
            o.entity_offset(0),
            Err(AssemblyError::NotEntityBlocked {
                query: "entity_offset"
            })
        );
        assert_eq!(
            o.intersection_offset(0),
            Err(AssemblyError::NotEntityBlocked {
                query: "intersection_offset"
            })
        );
        assert!(!o.blocked());
    }
}
