//! Constraint containers.
//!
//! A [`ConstraintsContainer`] records, per constrained global DOF, the map
//! of DOFs it contributes to and the weight of each contribution. An empty
//! inner map is a pure Dirichlet constraint. Iteration order is ascending
//! global index everywhere, so assembly touching the container is
//! deterministic.

use crate::error::{AssemblyError, DebugInvariants};
use crate::scalar::Scalar;
use crate::space::LeafView;
use std::collections::BTreeMap;

/// Weighted contribution targets of one constrained DOF.
pub type ConstraintRow<T> = BTreeMap<usize, T>;

/// Global constraint store: contributor → {contributed → weight}.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConstraintsContainer<T: Scalar> {
    rows: BTreeMap<usize, ConstraintRow<T>>,
}

impl<T: Scalar> Default for ConstraintsContainer<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<T: Scalar> ConstraintsContainer<T> {
    /// An empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all constraints.
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Number of constrained DOFs.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when nothing is constrained.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Pin a DOF (pure Dirichlet: empty row). Replaces any previous row.
    pub fn insert_dirichlet(&mut self, dof: usize) {
        self.rows.insert(dof, ConstraintRow::new());
    }

    /// Constrain a DOF as a weighted combination of other DOFs. Replaces any
    /// previous row.
    pub fn insert_weighted(&mut self, dof: usize, terms: impl IntoIterator<Item = (usize, T)>) {
        self.rows.insert(dof, terms.into_iter().collect());
    }

    /// The row of a constrained DOF, if present.
    pub fn row(&self, dof: usize) -> Option<&ConstraintRow<T>> {
        self.rows.get(&dof)
    }

    /// Whether a DOF is constrained at all.
    pub fn is_constrained(&self, dof: usize) -> bool {
        self.rows.contains_key(&dof)
    }

    /// Constrained DOFs and their rows, ascending by index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &ConstraintRow<T>)> {
        self.rows.iter().map(|(k, v)| (*k, v))
    }

    /// Constrained DOF indices, ascending.
    pub fn constrained(&self) -> impl Iterator<Item = usize> + '_ {
        self.rows.keys().copied()
    }
}

impl<T: Scalar> DebugInvariants for ConstraintsContainer<T> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "ConstraintsContainer");
    }

    fn validate_invariants(&self) -> Result<(), AssemblyError> {
        // contribution targets must themselves be unconstrained
        for (dof, row) in &self.rows {
            for target in row.keys() {
                if self.rows.contains_key(target) {
                    return Err(AssemblyError::InvariantViolation {
                        structure: "ConstraintsContainer",
                        message: format!(
                            "constrained dof {dof} contributes to dof {target}, which is itself constrained"
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Per-element constraint rows in leaf-local numbering, as produced by
/// constraint policies before scattering into the global container.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LocalTransform<T: Scalar> {
    rows: BTreeMap<usize, BTreeMap<usize, T>>,
}

impl<T: Scalar> LocalTransform<T> {
    /// An empty transform.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no local DOF was constrained.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Pin a leaf-local DOF.
    pub fn constrain(&mut self, local: usize) {
        self.rows.insert(local, BTreeMap::new());
    }

    /// Constrain a leaf-local DOF as a weighted combination of other
    /// leaf-local DOFs.
    pub fn constrain_weighted(
        &mut self,
        local: usize,
        terms: impl IntoIterator<Item = (usize, T)>,
    ) {
        self.rows.insert(local, terms.into_iter().collect());
    }

    /// The constrained leaf-local rows.
    pub fn rows(&self) -> &BTreeMap<usize, BTreeMap<usize, T>> {
        &self.rows
    }

    /// Map local rows to global indices through a bound leaf and write them
    /// into the container, replacing existing rows.
    pub fn scatter(
        &self,
        leaf: &LeafView<T>,
        container: &mut ConstraintsContainer<T>,
    ) -> Result<(), AssemblyError> {
        for (local, terms) in &self.rows {
            let g = leaf.global_index(*local)?;
            let mut row = ConstraintRow::new();
            for (tl, w) in terms {
                row.insert(leaf.global_index(*tl)?, *w);
            }
            container.rows.insert(g, row);
        }
        Ok(())
    }
}
