#![cfg_attr(docsrs, feature(doc_cfg))]
//! # fe-assembly
//!
//! fe-assembly is a modular Rust library for finite-element discretization plumbing: typed
//! function-space trees, deterministic degree-of-freedom ordering, algebraic constraints, and
//! constraint-aware local-to-global assembly, including a multi-stage one-step assembler for
//! instationary problems. It is backend-agnostic; grids, matrices, and vectors enter through
//! small traits, and dense reference containers are provided for tests and small problems.
//!
//! ## Features
//! - Composite/power/leaf function-space trees with tree-wide accumulation and transformation
//! - Lexicographic DOF ordering with explicit dirty tracking
//! - Constraint containers holding Dirichlet and weighted (hanging-node style) rows
//! - Pluggable constraint policies assembled over cells and faces, including parallel variants
//! - Constraint-aware scatter that expands constrained rows and columns during assembly
//! - One-step multi-stage time stepping with implicit and explicit modes
//! - Delta-based payload packing for rank-boundary exchange, transport left to the caller
//!
//! ## Determinism
//!
//! Orderings, constraint containers, and sparsity patterns iterate in ascending index order,
//! so repeated runs over the same grid produce identical numberings, rows, and patterns.
//!
//! ## Usage
//! Add `fe-assembly` as a dependency in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! fe-assembly = "0.3"
//! # Optional features:
//! # features = ["check-invariants"]
//! ```
//!
//! The `check-invariants` feature turns on structural validation in release builds; debug
//! builds always validate.

pub mod assembly;
pub mod backend;
pub mod constraints;
pub mod error;
pub mod exchange;
pub mod grid;
pub mod scalar;
pub mod space;
pub mod tree;

pub use error::{AssemblyError, DebugInvariants};
pub use scalar::Scalar;

/// Commonly used types for downstream code.
pub mod prelude {
    pub use crate::assembly::{
        ConstraintAwareScatter, ExplicitEuler, ImplicitEuler, LocalMatrix, LocalOperator,
        LocalPattern, LocalVector, OneStepAssembler, OneStepMethod, OperatorCaps,
    };
    pub use crate::backend::{DenseMatrix, GlobalMatrix, GlobalVector, MapMatrix, MapPattern, Pattern};
    pub use crate::constraints::{
        assemble_constraints, BoundaryCondition, BoundaryTree, ConstraintsContainer,
        ConstraintsPolicy,
    };
    pub use crate::error::{AssemblyError, DebugInvariants};
    pub use crate::grid::{
        Cell, CellIndex, GeometryKind, GridTopology, Intersection, IntersectionKind,
        PartitionKind,
    };
    pub use crate::scalar::Scalar;
    pub use crate::space::{FiniteElementMap, LocalSpace, Ordering, SpaceTree};
    pub use crate::tree::{TreeNode, TreePath};
}
