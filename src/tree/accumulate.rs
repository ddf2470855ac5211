//! Accumulation and transformation over trees.
//!
//! [`accumulate`] performs a left-to-right depth-first fold: a functor
//! computes a value per visited node, sibling results are combined with one
//! reduction, and a subtree's combined child value is folded into its
//! parent's value with a second (parent-child) reduction. The common case of
//! a single reduction for both roles is [`accumulate_with`].
//!
//! [`transform`] maps a tree to a parallel tree of the same shape through a
//! factory keyed on node kind.

use crate::error::AssemblyError;
use crate::tree::path::TreePath;
use crate::tree::{NodeKind, TreeNode};

/// An associative binary reduction over values of type `V`.
pub trait Reduce<V> {
    /// Combine two values.
    fn reduce(&self, a: V, b: V) -> V;
}

/// Logical or.
#[derive(Copy, Clone, Debug, Default)]
pub struct OrOp;
impl Reduce<bool> for OrOp {
    fn reduce(&self, a: bool, b: bool) -> bool {
        a || b
    }
}

/// Logical and.
#[derive(Copy, Clone, Debug, Default)]
pub struct AndOp;
impl Reduce<bool> for AndOp {
    fn reduce(&self, a: bool, b: bool) -> bool {
        a && b
    }
}

/// Addition.
#[derive(Copy, Clone, Debug, Default)]
pub struct SumOp;
impl<V: std::ops::Add<Output = V>> Reduce<V> for SumOp {
    fn reduce(&self, a: V, b: V) -> V {
        a + b
    }
}

/// Subtraction. Not associative; meaningful only where the fold order is
/// part of the contract.
#[derive(Copy, Clone, Debug, Default)]
pub struct DiffOp;
impl<V: std::ops::Sub<Output = V>> Reduce<V> for DiffOp {
    fn reduce(&self, a: V, b: V) -> V {
        a - b
    }
}

/// Multiplication.
#[derive(Copy, Clone, Debug, Default)]
pub struct ProdOp;
impl<V: std::ops::Mul<Output = V>> Reduce<V> for ProdOp {
    fn reduce(&self, a: V, b: V) -> V {
        a * b
    }
}

/// Minimum.
#[derive(Copy, Clone, Debug, Default)]
pub struct MinOp;
impl<V: PartialOrd> Reduce<V> for MinOp {
    fn reduce(&self, a: V, b: V) -> V {
        if b < a { b } else { a }
    }
}

/// Maximum.
#[derive(Copy, Clone, Debug, Default)]
pub struct MaxOp;
impl<V: PartialOrd> Reduce<V> for MaxOp {
    fn reduce(&self, a: V, b: V) -> V {
        if b > a { b } else { a }
    }
}

/// Adapter implementing [`Reduce`] for a closure.
#[derive(Copy, Clone, Debug)]
pub struct FnOp<F>(pub F);
impl<V, F: Fn(V, V) -> V> Reduce<V> for FnOp<F> {
    fn reduce(&self, a: V, b: V) -> V {
        (self.0)(a, b)
    }
}

/// Per-node functor driving [`accumulate`].
pub trait Accumulator<N: TreeNode, V> {
    /// Whether the node contributes a value; skipped nodes still have their
    /// children visited.
    fn do_visit(&self, _node: &N, _path: &TreePath) -> bool {
        true
    }

    /// Compute this node's contribution.
    ///
    /// # Errors
    /// Functors reject nodes they cannot handle; the fold aborts on the
    /// first error.
    fn visit(&self, node: &N, path: &TreePath) -> Result<V, AssemblyError>;
}

/// Fold `functor` over the tree rooted at `root`.
///
/// Sibling results combine left-to-right with `sibling`; a node's combined
/// child value folds into the node's own value with `parent_child`. The
/// `seed` is the result for an entirely skipped tree and is combined with the
/// root's result otherwise.
///
/// # Determinism
/// Traversal order is fixed (depth-first, children in index order), so the
/// result is deterministic even for non-commutative reductions.
pub fn accumulate<N, V, F, RS, RP>(
    root: &N,
    functor: &F,
    sibling: &RS,
    parent_child: &RP,
    seed: V,
) -> Result<V, AssemblyError>
where
    N: TreeNode,
    F: Accumulator<N, V>,
    RS: Reduce<V>,
    RP: Reduce<V>,
{
    match walk(root, &TreePath::root(), functor, sibling, parent_child)? {
        Some(v) => Ok(parent_child.reduce(seed, v)),
        None => Ok(seed),
    }
}

/// [`accumulate`] with one reduction for both the sibling and parent-child
/// roles.
pub fn accumulate_with<N, V, F, R>(
    root: &N,
    functor: &F,
    op: &R,
    seed: V,
) -> Result<V, AssemblyError>
where
    N: TreeNode,
    F: Accumulator<N, V>,
    R: Reduce<V>,
{
    accumulate(root, functor, op, op, seed)
}

fn walk<N, V, F, RS, RP>(
    node: &N,
    path: &TreePath,
    functor: &F,
    sibling: &RS,
    parent_child: &RP,
) -> Result<Option<V>, AssemblyError>
where
    N: TreeNode,
    F: Accumulator<N, V>,
    RS: Reduce<V>,
    RP: Reduce<V>,
{
    let own = if functor.do_visit(node, path) {
        Some(functor.visit(node, path)?)
    } else {
        None
    };

    let mut kids: Option<V> = None;
    for i in 0..node.child_count() {
        let child = node.child(i)?;
        if let Some(cv) = walk(child, &path.child(i), functor, sibling, parent_child)? {
            kids = Some(match kids {
                Some(acc) => sibling.reduce(acc, cv),
                None => cv,
            });
        }
    }

    Ok(match (own, kids) {
        (Some(o), Some(k)) => Some(parent_child.reduce(o, k)),
        (Some(o), None) => Some(o),
        (None, k) => k,
    })
}

/// Factory driving [`transform`], keyed on node kind.
pub trait TransformFactory<N: TreeNode> {
    /// Node type of the mapped tree.
    type Output;

    /// Map a leaf.
    fn leaf(&mut self, node: &N, path: &TreePath) -> Result<Self::Output, AssemblyError>;

    /// Map an interior node from its already-mapped children. `node.kind()`
    /// distinguishes power from composite.
    fn interior(
        &mut self,
        node: &N,
        path: &TreePath,
        children: Vec<Self::Output>,
    ) -> Result<Self::Output, AssemblyError>;
}

/// Map the tree rooted at `root` to a parallel tree of the same shape.
pub fn transform<N, F>(root: &N, factory: &mut F) -> Result<F::Output, AssemblyError>
where
    N: TreeNode,
    F: TransformFactory<N>,
{
    transform_at(root, &TreePath::root(), factory)
}

fn transform_at<N, F>(
    node: &N,
    path: &TreePath,
    factory: &mut F,
) -> Result<F::Output, AssemblyError>
where
    N: TreeNode,
    F: TransformFactory<N>,
{
    match node.kind() {
        NodeKind::Leaf => factory.leaf(node, path),
        NodeKind::Power | NodeKind::Composite => {
            let mut children = Vec::with_capacity(node.child_count());
            for i in 0..node.child_count() {
                children.push(transform_at(node.child(i)?, &path.child(i), factory)?);
            }
            factory.interior(node, path, children)
        }
    }
}
