//! Error types for assembly operations.
//!
//! All fallible operations in this crate return [`AssemblyError`]. Variants
//! carry enough context to identify the offending index, phase, or tree
//! location without re-running the operation.

use thiserror::Error;

/// Error type for all fe-assembly operations.
#[derive(Debug, Error, PartialEq)]
pub enum AssemblyError {
    /// A child index was out of range for a tree node.
    #[error("child index {index} out of range for node with {children} children")]
    ChildIndexOutOfRange {
        /// Requested child index.
        index: usize,
        /// Number of children the node actually has.
        children: usize,
    },

    /// A power node was constructed from children of differing shape.
    #[error("power node children must share one shape; child {child} differs from child 0")]
    PowerChildShapeMismatch {
        /// First child whose shape disagrees with child 0.
        child: usize,
    },

    /// An ordering was read after a structural change without `update()`.
    #[error("ordering read while dirty; call update() after structural changes")]
    OrderingNotUpdated,

    /// An entity-blocked query was made on an ordering that is not blocked.
    #[error("{query} is not available: this ordering is not entity-blocked")]
    NotEntityBlocked {
        /// Name of the rejected query.
        query: &'static str,
    },

    /// A local DOF index exceeded the size recorded for its node.
    #[error("local index {index} out of range for node of size {size}")]
    LocalIndexOutOfRange {
        /// Offending local index.
        index: usize,
        /// Size of the node.
        size: usize,
    },

    /// A local space was read before `bind()`.
    #[error("local space read before bind()")]
    LocalSpaceUnbound,

    /// A global DOF index exceeded the backend container size.
    #[error("DOF index {index} out of bounds for container of size {size}")]
    DofIndexOutOfBounds {
        /// Offending global index.
        index: usize,
        /// Container size.
        size: usize,
    },

    /// Two containers that must agree in size did not.
    #[error("size mismatch in {context}: expected {expected}, found {found}")]
    SizeMismatch {
        /// What was being compared.
        context: &'static str,
        /// Expected size.
        expected: usize,
        /// Actual size.
        found: usize,
    },

    /// A parameter tree and a space tree could not be traversed in pairs.
    #[error("unsupported tree combination: parameter node is {param} but space node is {space}")]
    UnsupportedTreeCombination {
        /// Kind of the parameter node.
        param: &'static str,
        /// Kind of the space node.
        space: &'static str,
    },

    /// A local-operator or constraints hook was invoked that the
    /// implementation claims via its capability flags but does not provide.
    #[error("capability `{hook}` is advertised but not implemented")]
    MissingCapability {
        /// Name of the missing hook.
        hook: &'static str,
    },

    /// A stage index was out of range for the active time-stepping method.
    #[error("stage {stage} out of range for method with {stages} stages")]
    InvalidStage {
        /// Requested stage.
        stage: usize,
        /// Stage count of the method.
        stages: usize,
    },

    /// A stage was prepared with the wrong number of previous solutions.
    #[error("expected {expected} stage solutions, found {found}")]
    WrongSolutionCount {
        /// Required count for the current stage.
        expected: usize,
        /// Provided count.
        found: usize,
    },

    /// Explicit-mode assembly was requested with an implicit scheme.
    #[error("explicit jacobian/residual assembly requires an explicit scheme; `{method}` is implicit")]
    ExplicitModeWithImplicitScheme {
        /// Name of the offending method.
        method: String,
    },

    /// An assembler entry point was called out of phase order.
    #[error("assembler phase violation: {operation} called in phase {phase}")]
    InvalidPhase {
        /// Entry point that was called.
        operation: &'static str,
        /// Phase the assembler was in.
        phase: &'static str,
    },

    /// A scatter payload did not match the receiving entity's DOF count.
    #[error("scatter payload for cell {cell} has length {found}, expected {expected}")]
    ScatterLengthMismatch {
        /// Receiving cell index.
        cell: usize,
        /// Expected payload length.
        expected: usize,
        /// Actual payload length.
        found: usize,
    },

    /// A cell index was unknown to the grid or id mapper.
    #[error("cell {cell} is unknown to the grid")]
    UnknownCell {
        /// Offending cell index.
        cell: usize,
    },

    /// An internal invariant failed validation.
    #[error("invariant violation in {structure}: {message}")]
    InvariantViolation {
        /// Structure whose invariant failed.
        structure: &'static str,
        /// Description of the failure.
        message: String,
    },
}

/// Trait for validating data structure invariants.
pub trait DebugInvariants {
    /// Assert invariants in debug builds or when invariant checking is enabled.
    fn debug_assert_invariants(&self);
    /// Validate invariants and return the first error encountered.
    fn validate_invariants(&self) -> Result<(), AssemblyError>;
}

/// Helper macro to run a fallible check and panic on error when invariant
/// checking is enabled.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}
