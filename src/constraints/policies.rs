//! Constraint policies attached to leaf spaces.
//!
//! A policy declares, through [`ConstraintCaps`], which assembly hooks it
//! participates in; the hooks themselves default to a loud
//! [`AssemblyError::MissingCapability`] so an advertised-but-absent hook is
//! caught at the call site, never silently skipped.

use crate::constraints::container::LocalTransform;
use crate::error::AssemblyError;
use crate::grid::{Cell, GridTopology, Intersection, PartitionKind};
use crate::scalar::Scalar;
use crate::space::{LeafView, LocalSpace, SpaceTree};

/// Which assembly hooks a policy participates in, queried once per
/// assembly.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConstraintCaps {
    /// Run on every cell.
    pub volume: bool,
    /// Run on domain-boundary faces.
    pub boundary: bool,
    /// Run on interior faces.
    pub skeleton: bool,
    /// Run on processor-boundary faces.
    pub processor: bool,
}

/// Boundary-condition parameter evaluated per face.
pub trait BoundaryCondition: Send + Sync {
    /// Whether the face carries an essential (Dirichlet) condition.
    fn is_dirichlet(&self, face: &Intersection) -> bool;

    /// Whether the face carries a natural (Neumann) condition.
    fn is_neumann(&self, face: &Intersection) -> bool {
        !self.is_dirichlet(face)
    }
}

/// Dirichlet everywhere.
#[derive(Copy, Clone, Debug, Default)]
pub struct AllDirichlet;
impl BoundaryCondition for AllDirichlet {
    fn is_dirichlet(&self, _face: &Intersection) -> bool {
        true
    }
}

/// Neumann everywhere.
#[derive(Copy, Clone, Debug, Default)]
pub struct AllNeumann;
impl BoundaryCondition for AllNeumann {
    fn is_dirichlet(&self, _face: &Intersection) -> bool {
        false
    }
}

/// Condition type decided by a predicate on the face center.
pub struct DirichletWhere<F>(pub F);
impl<F: Fn(&[f64; 2]) -> bool + Send + Sync> BoundaryCondition for DirichletWhere<F> {
    fn is_dirichlet(&self, face: &Intersection) -> bool {
        (self.0)(&face.center)
    }
}

/// A constraints policy: produces per-element constraint rows.
pub trait ConstraintsPolicy<T: Scalar>: Send + Sync {
    /// Hook participation flags.
    fn caps(&self) -> ConstraintCaps;

    /// Cell hook.
    fn volume(
        &self,
        _cell: &Cell,
        _leaf: &LeafView<T>,
        _trafo: &mut LocalTransform<T>,
    ) -> Result<(), AssemblyError> {
        Err(AssemblyError::MissingCapability { hook: "volume" })
    }

    /// Domain-boundary hook.
    fn boundary(
        &self,
        _bc: &dyn BoundaryCondition,
        _face: &Intersection,
        _cell: &Cell,
        _leaf: &LeafView<T>,
        _trafo: &mut LocalTransform<T>,
    ) -> Result<(), AssemblyError> {
        Err(AssemblyError::MissingCapability { hook: "boundary" })
    }

    /// Processor-boundary hook.
    fn processor(
        &self,
        _face: &Intersection,
        _cell: &Cell,
        _leaf: &LeafView<T>,
        _trafo: &mut LocalTransform<T>,
    ) -> Result<(), AssemblyError> {
        Err(AssemblyError::MissingCapability { hook: "processor" })
    }

    /// Interior-face hook; sees both sides.
    #[allow(clippy::too_many_arguments)]
    fn skeleton(
        &self,
        _face: &Intersection,
        _cell_in: &Cell,
        _cell_out: &Cell,
        _leaf_in: &LeafView<T>,
        _leaf_out: &LeafView<T>,
        _trafo_in: &mut LocalTransform<T>,
        _trafo_out: &mut LocalTransform<T>,
    ) -> Result<(), AssemblyError> {
        Err(AssemblyError::MissingCapability { hook: "skeleton" })
    }
}

fn constrain_facet<T: Scalar>(cell: &Cell, facet: usize, leaf: &LeafView<T>, trafo: &mut LocalTransform<T>) {
    for local in leaf.facet_dofs(cell, facet) {
        trafo.constrain(local);
    }
}

/// Dirichlet constraints for conforming spaces: where the boundary
/// condition is essential, every facet-attached DOF is pinned.
#[derive(Copy, Clone, Debug, Default)]
pub struct ConformingDirichlet;

impl<T: Scalar> ConstraintsPolicy<T> for ConformingDirichlet {
    fn caps(&self) -> ConstraintCaps {
        ConstraintCaps {
            boundary: true,
            ..Default::default()
        }
    }

    fn boundary(
        &self,
        bc: &dyn BoundaryCondition,
        face: &Intersection,
        cell: &Cell,
        leaf: &LeafView<T>,
        trafo: &mut LocalTransform<T>,
    ) -> Result<(), AssemblyError> {
        if bc.is_dirichlet(face) {
            constrain_facet(cell, face.facet, leaf, trafo);
        }
        Ok(())
    }
}

/// [`ConformingDirichlet`] for overlapping grids: additionally pins
/// facet-attached DOFs on processor boundaries, making overlap regions pure
/// copies.
#[derive(Copy, Clone, Debug, Default)]
pub struct OverlappingConformingDirichlet;

impl<T: Scalar> ConstraintsPolicy<T> for OverlappingConformingDirichlet {
    fn caps(&self) -> ConstraintCaps {
        ConstraintCaps {
            boundary: true,
            processor: true,
            ..Default::default()
        }
    }

    fn boundary(
        &self,
        bc: &dyn BoundaryCondition,
        face: &Intersection,
        cell: &Cell,
        leaf: &LeafView<T>,
        trafo: &mut LocalTransform<T>,
    ) -> Result<(), AssemblyError> {
        if bc.is_dirichlet(face) {
            constrain_facet(cell, face.facet, leaf, trafo);
        }
        Ok(())
    }

    fn processor(
        &self,
        face: &Intersection,
        cell: &Cell,
        leaf: &LeafView<T>,
        trafo: &mut LocalTransform<T>,
    ) -> Result<(), AssemblyError> {
        constrain_facet(cell, face.facet, leaf, trafo);
        Ok(())
    }
}

/// Which DOFs of a space are ghosts: not touched by any owned cell.
///
/// Computed as an explicit step before constructing
/// [`NonoverlappingConformingDirichlet`]; the policy cannot exist without
/// one.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GhostClassification {
    ghost: Vec<bool>,
}

impl GhostClassification {
    /// Classify every DOF of `space` over `grid`.
    pub fn compute<T: Scalar, G: GridTopology>(
        space: &SpaceTree<T>,
        grid: &G,
    ) -> Result<Self, AssemblyError> {
        let mut ghost = vec![true; space.size()?];
        let mut lfs = LocalSpace::new(space)?;
        for index in 0..grid.cell_count() {
            let cell = grid.cell(index)?;
            if !cell.partition.is_owned() {
                continue;
            }
            lfs.bind(&cell)?;
            for local in 0..lfs.size()? {
                ghost[lfs.global_index(local)?] = false;
            }
        }
        Ok(Self { ghost })
    }

    /// Whether a global DOF is a ghost.
    pub fn is_ghost(&self, dof: usize) -> Result<bool, AssemblyError> {
        self.ghost
            .get(dof)
            .copied()
            .ok_or(AssemblyError::DofIndexOutOfBounds {
                index: dof,
                size: self.ghost.len(),
            })
    }

    /// Number of classified DOFs.
    pub fn len(&self) -> usize {
        self.ghost.len()
    }

    /// True when no DOF was classified.
    pub fn is_empty(&self) -> bool {
        self.ghost.is_empty()
    }
}

/// Dirichlet constraints for conforming spaces on nonoverlapping grids:
/// boundary behavior as [`ConformingDirichlet`], plus a volume hook pinning
/// every ghost DOF.
#[derive(Clone, Debug)]
pub struct NonoverlappingConformingDirichlet {
    ghosts: GhostClassification,
}

impl NonoverlappingConformingDirichlet {
    /// Build from a previously computed classification.
    pub fn new(ghosts: GhostClassification) -> Self {
        Self { ghosts }
    }
}

impl<T: Scalar> ConstraintsPolicy<T> for NonoverlappingConformingDirichlet {
    fn caps(&self) -> ConstraintCaps {
        ConstraintCaps {
            volume: true,
            boundary: true,
            ..Default::default()
        }
    }

    fn volume(
        &self,
        _cell: &Cell,
        leaf: &LeafView<T>,
        trafo: &mut LocalTransform<T>,
    ) -> Result<(), AssemblyError> {
        for local in 0..leaf.len() {
            if self.ghosts.is_ghost(leaf.global_index(local)?)? {
                trafo.constrain(local);
            }
        }
        Ok(())
    }

    fn boundary(
        &self,
        bc: &dyn BoundaryCondition,
        face: &Intersection,
        cell: &Cell,
        leaf: &LeafView<T>,
        trafo: &mut LocalTransform<T>,
    ) -> Result<(), AssemblyError> {
        if bc.is_dirichlet(face) {
            constrain_facet(cell, face.facet, leaf, trafo);
        }
        Ok(())
    }
}

/// For cell-wise constant spaces in parallel: pins every DOF on cells this
/// rank does not own.
#[derive(Copy, Clone, Debug, Default)]
pub struct P0Ghost;

impl<T: Scalar> ConstraintsPolicy<T> for P0Ghost {
    fn caps(&self) -> ConstraintCaps {
        ConstraintCaps {
            volume: true,
            ..Default::default()
        }
    }

    fn volume(
        &self,
        cell: &Cell,
        leaf: &LeafView<T>,
        trafo: &mut LocalTransform<T>,
    ) -> Result<(), AssemblyError> {
        if matches!(cell.partition, PartitionKind::Overlap | PartitionKind::Ghost) {
            for local in 0..leaf.len() {
                trafo.constrain(local);
            }
        }
        Ok(())
    }
}

/// For lowest-order face-based (flux) spaces: where the boundary condition
/// is natural, the face's DOF is pinned.
#[derive(Copy, Clone, Debug, Default)]
pub struct FluxConstraints;

impl<T: Scalar> ConstraintsPolicy<T> for FluxConstraints {
    fn caps(&self) -> ConstraintCaps {
        ConstraintCaps {
            boundary: true,
            ..Default::default()
        }
    }

    fn boundary(
        &self,
        bc: &dyn BoundaryCondition,
        face: &Intersection,
        cell: &Cell,
        leaf: &LeafView<T>,
        trafo: &mut LocalTransform<T>,
    ) -> Result<(), AssemblyError> {
        if bc.is_neumann(face) {
            constrain_facet(cell, face.facet, leaf, trafo);
        }
        Ok(())
    }
}
