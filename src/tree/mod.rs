//! Generic tree machinery shared by function-space and parameter trees.
//!
//! The [`TreeNode`] trait gives every tree in this crate a uniform runtime
//! surface (kind, child count, child access); [`accumulate`] folds a value
//! over a tree with pluggable reductions, and [`transform`] maps a tree to a
//! parallel tree of the same shape.

pub mod accumulate;
pub mod path;

pub use accumulate::{
    Accumulator, AndOp, DiffOp, FnOp, MaxOp, MinOp, OrOp, ProdOp, Reduce, SumOp, TransformFactory,
    accumulate, accumulate_with, transform,
};
pub use path::TreePath;

use crate::error::AssemblyError;

/// Runtime tag for the three node categories of a tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum NodeKind {
    /// A terminal node carrying payload.
    Leaf,
    /// An interior node whose children all share one shape.
    Power,
    /// An interior node with arbitrary, ordered children.
    Composite,
}

impl NodeKind {
    /// Short name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Leaf => "leaf",
            NodeKind::Power => "power",
            NodeKind::Composite => "composite",
        }
    }
}

/// Uniform runtime access to a tree's structure.
pub trait TreeNode: Sized {
    /// Category of this node.
    fn kind(&self) -> NodeKind;
    /// Number of children; zero for leaves.
    fn child_count(&self) -> usize;
    /// Borrow the `index`-th child.
    ///
    /// # Errors
    /// [`AssemblyError::ChildIndexOutOfRange`] when `index >= child_count()`.
    fn child(&self, index: usize) -> Result<&Self, AssemblyError>;

    /// True when this node has no children.
    fn is_leaf(&self) -> bool {
        self.kind() == NodeKind::Leaf
    }
}
