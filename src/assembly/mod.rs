//! Local-to-global assembly.
//!
//! Local operators produce per-element vectors, matrices, and sparsity
//! couplings; the constraint-aware scatter routes them into global
//! containers, expanding constrained rows and columns on the way. The
//! one-step assembler layers multi-stage time stepping on top.

pub mod global;
pub mod local;
pub mod method;
pub mod onestep;
pub mod operator;
pub mod pattern;

pub use global::{eadd, eread, ewrite, gather, scatter_add, ConstraintAwareScatter};
pub use local::{LocalMatrix, LocalPattern, LocalVector};
pub use method::{ExplicitEuler, ImplicitEuler, OneStepMethod};
pub use onestep::{NoSubTriangulation, OneStepAssembler, SubTriangulation};
pub use operator::{LocalOperator, OperatorCaps};
pub use pattern::{full_boundary_pattern, full_skeleton_pattern, full_volume_pattern};
