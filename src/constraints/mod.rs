//! Algebraic constraints: containers, policies, assembly, and vector
//! transforms.

pub mod assemble;
pub mod container;
pub mod policies;
pub mod transform;

pub use assemble::{
    BoundaryTree, ConstraintsAssemblyOptions, assemble_constraints, assemble_constraints_with,
};
pub use container::{ConstraintRow, ConstraintsContainer, LocalTransform};
pub use policies::{
    AllDirichlet, AllNeumann, BoundaryCondition, ConformingDirichlet, ConstraintCaps,
    ConstraintsPolicy, DirichletWhere, FluxConstraints, GhostClassification,
    NonoverlappingConformingDirichlet, OverlappingConformingDirichlet, P0Ghost,
};
pub use transform::{
    back_transform, check_constrained_dofs, constrain_residual, copy_constrained_dofs,
    copy_nonconstrained_dofs, forward_transform, set_constrained_dofs, set_nonconstrained_dofs,
    set_shifted_dofs,
};
