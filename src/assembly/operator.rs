//! The local-operator contract.
//!
//! A local operator supplies per-element integrals (residual pieces,
//! jacobian blocks, matrix-free applications, sparsity couplings). What it
//! participates in is declared in [`OperatorCaps`], which the assembler
//! queries once per operator instance; every hook has a default body that
//! fails with [`AssemblyError::MissingCapability`], so a flagged-but-absent
//! hook is an error at the call site rather than a silent no-op.

use crate::assembly::local::{LocalMatrix, LocalPattern, LocalVector};
use crate::error::AssemblyError;
use crate::grid::{Cell, Intersection};
use crate::scalar::Scalar;
use crate::space::LocalSpace;

/// Participation flags of a local operator.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OperatorCaps {
    /// Solution-dependent cell term.
    pub alpha_volume: bool,
    /// Solution-dependent interior-face term.
    pub alpha_skeleton: bool,
    /// Solution-dependent boundary-face term.
    pub alpha_boundary: bool,
    /// Solution-dependent cell term evaluated after all faces.
    pub alpha_volume_post_skeleton: bool,
    /// Solution-independent cell term.
    pub lambda_volume: bool,
    /// Solution-independent interior-face term.
    pub lambda_skeleton: bool,
    /// Solution-independent boundary-face term.
    pub lambda_boundary: bool,
    /// Solution-independent cell term evaluated after all faces.
    pub lambda_volume_post_skeleton: bool,
    /// Cell couplings in the sparsity pattern.
    pub pattern_volume: bool,
    /// Cross-face couplings in the sparsity pattern.
    pub pattern_skeleton: bool,
    /// Boundary couplings in the sparsity pattern.
    pub pattern_boundary: bool,
    /// Interior faces are visited from both sides.
    pub two_sided_skeleton: bool,
}

/// Per-element integration kernels.
#[allow(clippy::too_many_arguments)]
pub trait LocalOperator<T: Scalar> {
    /// Participation flags; queried once per assembly.
    fn caps(&self) -> OperatorCaps;

    /// Absolute time for subsequent evaluations.
    fn set_time(&mut self, _time: T) {}

    /// Start of a time step covering `stages` stages.
    fn pre_step(&mut self, _time: T, _dt: T, _stages: usize) {}

    /// End of a time step.
    fn post_step(&mut self) {}

    /// Start of one stage.
    fn pre_stage(&mut self, _time: T, _stage: usize) {}

    /// End of one stage.
    fn post_stage(&mut self) {}

    /// Largest stable time step from this operator's point of view.
    fn suggest_timestep(&self, dt: T) -> T {
        dt
    }

    /// r += integral over the cell, depending on the solution.
    fn alpha_volume(
        &self,
        _cell: &Cell,
        _lfsu: &LocalSpace<T>,
        _x: &LocalVector<T>,
        _lfsv: &LocalSpace<T>,
        _r: &mut LocalVector<T>,
    ) -> Result<(), AssemblyError> {
        Err(AssemblyError::MissingCapability {
            hook: "alpha_volume",
        })
    }

    /// Like [`alpha_volume`](Self::alpha_volume), after all faces.
    fn alpha_volume_post_skeleton(
        &self,
        _cell: &Cell,
        _lfsu: &LocalSpace<T>,
        _x: &LocalVector<T>,
        _lfsv: &LocalSpace<T>,
        _r: &mut LocalVector<T>,
    ) -> Result<(), AssemblyError> {
        Err(AssemblyError::MissingCapability {
            hook: "alpha_volume_post_skeleton",
        })
    }

    /// r_s, r_n += integral over an interior face.
    fn alpha_skeleton(
        &self,
        _face: &Intersection,
        _lfsu_s: &LocalSpace<T>,
        _x_s: &LocalVector<T>,
        _lfsv_s: &LocalSpace<T>,
        _lfsu_n: &LocalSpace<T>,
        _x_n: &LocalVector<T>,
        _lfsv_n: &LocalSpace<T>,
        _r_s: &mut LocalVector<T>,
        _r_n: &mut LocalVector<T>,
    ) -> Result<(), AssemblyError> {
        Err(AssemblyError::MissingCapability {
            hook: "alpha_skeleton",
        })
    }

    /// r += integral over a boundary face.
    fn alpha_boundary(
        &self,
        _face: &Intersection,
        _lfsu: &LocalSpace<T>,
        _x: &LocalVector<T>,
        _lfsv: &LocalSpace<T>,
        _r: &mut LocalVector<T>,
    ) -> Result<(), AssemblyError> {
        Err(AssemblyError::MissingCapability {
            hook: "alpha_boundary",
        })
    }

    /// r += solution-independent cell term.
    fn lambda_volume(
        &self,
        _cell: &Cell,
        _lfsv: &LocalSpace<T>,
        _r: &mut LocalVector<T>,
    ) -> Result<(), AssemblyError> {
        Err(AssemblyError::MissingCapability {
            hook: "lambda_volume",
        })
    }

    /// Like [`lambda_volume`](Self::lambda_volume), after all faces.
    fn lambda_volume_post_skeleton(
        &self,
        _cell: &Cell,
        _lfsv: &LocalSpace<T>,
        _r: &mut LocalVector<T>,
    ) -> Result<(), AssemblyError> {
        Err(AssemblyError::MissingCapability {
            hook: "lambda_volume_post_skeleton",
        })
    }

    /// r_s, r_n += solution-independent interior-face term.
    fn lambda_skeleton(
        &self,
        _face: &Intersection,
        _lfsv_s: &LocalSpace<T>,
        _lfsv_n: &LocalSpace<T>,
        _r_s: &mut LocalVector<T>,
        _r_n: &mut LocalVector<T>,
    ) -> Result<(), AssemblyError> {
        Err(AssemblyError::MissingCapability {
            hook: "lambda_skeleton",
        })
    }

    /// r += solution-independent boundary-face term.
    fn lambda_boundary(
        &self,
        _face: &Intersection,
        _lfsv: &LocalSpace<T>,
        _r: &mut LocalVector<T>,
    ) -> Result<(), AssemblyError> {
        Err(AssemblyError::MissingCapability {
            hook: "lambda_boundary",
        })
    }

    /// m += cell jacobian block.
    fn jacobian_volume(
        &self,
        _cell: &Cell,
        _lfsu: &LocalSpace<T>,
        _x: &LocalVector<T>,
        _lfsv: &LocalSpace<T>,
        _m: &mut LocalMatrix<T>,
    ) -> Result<(), AssemblyError> {
        Err(AssemblyError::MissingCapability {
            hook: "jacobian_volume",
        })
    }

    /// Four jacobian blocks of an interior face (ss, sn, ns, nn).
    fn jacobian_skeleton(
        &self,
        _face: &Intersection,
        _lfsu_s: &LocalSpace<T>,
        _x_s: &LocalVector<T>,
        _lfsv_s: &LocalSpace<T>,
        _lfsu_n: &LocalSpace<T>,
        _x_n: &LocalVector<T>,
        _lfsv_n: &LocalSpace<T>,
        _m_ss: &mut LocalMatrix<T>,
        _m_sn: &mut LocalMatrix<T>,
        _m_ns: &mut LocalMatrix<T>,
        _m_nn: &mut LocalMatrix<T>,
    ) -> Result<(), AssemblyError> {
        Err(AssemblyError::MissingCapability {
            hook: "jacobian_skeleton",
        })
    }

    /// m += boundary-face jacobian block.
    fn jacobian_boundary(
        &self,
        _face: &Intersection,
        _lfsu: &LocalSpace<T>,
        _x: &LocalVector<T>,
        _lfsv: &LocalSpace<T>,
        _m: &mut LocalMatrix<T>,
    ) -> Result<(), AssemblyError> {
        Err(AssemblyError::MissingCapability {
            hook: "jacobian_boundary",
        })
    }

    /// y += cell jacobian applied to z, matrix-free.
    fn jacobian_apply_volume(
        &self,
        _cell: &Cell,
        _lfsu: &LocalSpace<T>,
        _x: &LocalVector<T>,
        _z: &LocalVector<T>,
        _lfsv: &LocalSpace<T>,
        _y: &mut LocalVector<T>,
    ) -> Result<(), AssemblyError> {
        Err(AssemblyError::MissingCapability {
            hook: "jacobian_apply_volume",
        })
    }

    /// y += interior-face jacobian blocks applied to z, matrix-free.
    #[allow(clippy::too_many_arguments)]
    fn jacobian_apply_skeleton(
        &self,
        _face: &Intersection,
        _lfsu_s: &LocalSpace<T>,
        _x_s: &LocalVector<T>,
        _z_s: &LocalVector<T>,
        _lfsv_s: &LocalSpace<T>,
        _lfsu_n: &LocalSpace<T>,
        _x_n: &LocalVector<T>,
        _z_n: &LocalVector<T>,
        _lfsv_n: &LocalSpace<T>,
        _y_s: &mut LocalVector<T>,
        _y_n: &mut LocalVector<T>,
    ) -> Result<(), AssemblyError> {
        Err(AssemblyError::MissingCapability {
            hook: "jacobian_apply_skeleton",
        })
    }

    /// y += boundary-face jacobian block applied to z, matrix-free.
    fn jacobian_apply_boundary(
        &self,
        _face: &Intersection,
        _lfsu: &LocalSpace<T>,
        _x: &LocalVector<T>,
        _z: &LocalVector<T>,
        _lfsv: &LocalSpace<T>,
        _y: &mut LocalVector<T>,
    ) -> Result<(), AssemblyError> {
        Err(AssemblyError::MissingCapability {
            hook: "jacobian_apply_boundary",
        })
    }

    /// Declare cell couplings.
    fn pattern_volume(
        &self,
        _lfsu: &LocalSpace<T>,
        _lfsv: &LocalSpace<T>,
        _pattern: &mut LocalPattern,
    ) -> Result<(), AssemblyError> {
        Err(AssemblyError::MissingCapability {
            hook: "pattern_volume",
        })
    }

    /// Declare cross-face couplings (sn and ns directions).
    fn pattern_skeleton(
        &self,
        _lfsu_s: &LocalSpace<T>,
        _lfsv_s: &LocalSpace<T>,
        _lfsu_n: &LocalSpace<T>,
        _lfsv_n: &LocalSpace<T>,
        _pattern_sn: &mut LocalPattern,
        _pattern_ns: &mut LocalPattern,
    ) -> Result<(), AssemblyError> {
        Err(AssemblyError::MissingCapability {
            hook: "pattern_skeleton",
        })
    }

    /// Declare boundary couplings.
    fn pattern_boundary(
        &self,
        _lfsu: &LocalSpace<T>,
        _lfsv: &LocalSpace<T>,
        _pattern: &mut LocalPattern,
    ) -> Result<(), AssemblyError> {
        Err(AssemblyError::MissingCapability {
            hook: "pattern_boundary",
        })
    }
}
