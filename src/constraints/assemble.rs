//! Constraints assembly: one grid traversal filling a container.
//!
//! Boundary-condition parameters form a tree mirroring the space tree; a
//! parameter leaf standing against a non-leaf space node broadcasts to all
//! space leaves below it, any other shape mismatch fails loudly. Hooks are
//! dispatched per cell and per intersection according to each policy's
//! capability flags, queried once up front.

use crate::constraints::container::{ConstraintsContainer, LocalTransform};
use crate::constraints::policies::{BoundaryCondition, ConstraintCaps, ConstraintsPolicy};
use crate::error::{AssemblyError, DebugInvariants};
use crate::grid::{CellIdMapper, GridTopology, IntersectionKind};
use crate::scalar::Scalar;
use crate::space::{LeafView, LocalSpace, SpaceTree};
use crate::tree::{NodeKind, TreeNode};
use log::debug;
use std::sync::Arc;

/// Boundary-condition parameter tree mirroring a space tree.
pub enum BoundaryTree {
    /// Condition for one leaf space (or broadcast over a subtree).
    Leaf(Arc<dyn BoundaryCondition>),
    /// Children mirroring a power node.
    Power(Vec<BoundaryTree>),
    /// Children mirroring a composite node.
    Composite(Vec<BoundaryTree>),
}

impl BoundaryTree {
    /// Leaf from any condition value.
    pub fn of(bc: impl BoundaryCondition + 'static) -> Self {
        BoundaryTree::Leaf(Arc::new(bc))
    }
}

impl TreeNode for BoundaryTree {
    fn kind(&self) -> NodeKind {
        match self {
            BoundaryTree::Leaf(_) => NodeKind::Leaf,
            BoundaryTree::Power(_) => NodeKind::Power,
            BoundaryTree::Composite(_) => NodeKind::Composite,
        }
    }

    fn child_count(&self) -> usize {
        match self {
            BoundaryTree::Leaf(_) => 0,
            BoundaryTree::Power(c) | BoundaryTree::Composite(c) => c.len(),
        }
    }

    fn child(&self, index: usize) -> Result<&Self, AssemblyError> {
        match self {
            BoundaryTree::Leaf(_) => Err(AssemblyError::ChildIndexOutOfRange { index, children: 0 }),
            BoundaryTree::Power(c) | BoundaryTree::Composite(c) => {
                c.get(index).ok_or(AssemblyError::ChildIndexOutOfRange {
                    index,
                    children: c.len(),
                })
            }
        }
    }
}

/// Pair parameter nodes with space leaves, in space-leaf depth-first order.
fn pair_leaves<T: Scalar>(
    params: &BoundaryTree,
    space: &SpaceTree<T>,
    out: &mut Vec<Arc<dyn BoundaryCondition>>,
) -> Result<(), AssemblyError> {
    match (params, space.kind()) {
        (BoundaryTree::Leaf(bc), NodeKind::Leaf) => {
            out.push(Arc::clone(bc));
            Ok(())
        }
        (BoundaryTree::Leaf(bc), _) => {
            // broadcast over every leaf below
            for i in 0..space.child_count() {
                let sub = BoundaryTree::Leaf(Arc::clone(bc));
                pair_leaves(&sub, space.child(i)?, out)?;
            }
            Ok(())
        }
        (_, NodeKind::Leaf) => Err(AssemblyError::UnsupportedTreeCombination {
            param: params.kind().name(),
            space: "leaf",
        }),
        (_, kind) => {
            if params.child_count() != space.child_count() {
                return Err(AssemblyError::UnsupportedTreeCombination {
                    param: params.kind().name(),
                    space: kind.name(),
                });
            }
            for i in 0..space.child_count() {
                pair_leaves(params.child(i)?, space.child(i)?, out)?;
            }
            Ok(())
        }
    }
}

/// Options for [`assemble_constraints_with`].
#[derive(Copy, Clone, Debug, Default)]
pub struct ConstraintsAssemblyOptions {
    /// Log every constrained DOF with its terms.
    pub verbose: bool,
}

fn report<T: Scalar>(
    verbose: bool,
    hook: &str,
    leaf: &LeafView<T>,
    trafo: &LocalTransform<T>,
) -> Result<(), AssemblyError> {
    if !verbose {
        return Ok(());
    }
    for (local, terms) in trafo.rows() {
        let g = leaf.global_index(*local)?;
        if terms.is_empty() {
            debug!("{hook}: dof {g} pinned");
        } else {
            let pretty: Vec<String> = terms
                .iter()
                .map(|(tl, w)| {
                    leaf.global_index(*tl)
                        .map(|tg| format!("({tg}, {w})"))
                        .unwrap_or_else(|_| format!("(?{tl}, {w})"))
                })
                .collect();
            debug!("{hook}: dof {g} -> {}", pretty.join(" "));
        }
    }
    Ok(())
}

/// [`assemble_constraints_with`] with default options.
pub fn assemble_constraints<T: Scalar, G: GridTopology>(
    params: &BoundaryTree,
    space: &SpaceTree<T>,
    grid: &G,
) -> Result<ConstraintsContainer<T>, AssemblyError> {
    assemble_constraints_with(params, space, grid, ConstraintsAssemblyOptions::default())
}

/// Assemble the constraints container for `space` over `grid`.
///
/// Every cell is visited regardless of partition (ghost-cell policies rely
/// on that); skeleton hooks fire once per interior face, from the side
/// whose cell has the larger unique id. Periodic faces take the skeleton
/// path.
pub fn assemble_constraints_with<T: Scalar, G: GridTopology>(
    params: &BoundaryTree,
    space: &SpaceTree<T>,
    grid: &G,
    opts: ConstraintsAssemblyOptions,
) -> Result<ConstraintsContainer<T>, AssemblyError> {
    let mut container = ConstraintsContainer::new();
    let mut lfs = LocalSpace::new(space)?;
    let mut lfs_out = LocalSpace::new(space)?;

    let mut bcs = Vec::new();
    pair_leaves(params, space, &mut bcs)?;
    if bcs.len() != lfs.leaf_count() {
        return Err(AssemblyError::SizeMismatch {
            context: "boundary parameter tree",
            expected: lfs.leaf_count(),
            found: bcs.len(),
        });
    }

    // capability flags are queried once per policy instance
    let plan: Vec<Option<(Arc<dyn ConstraintsPolicy<T>>, ConstraintCaps)>> = (0..lfs.leaf_count())
        .map(|i| {
            lfs.leaf(i).map(|leaf| {
                leaf.constraints()
                    .map(|p| (Arc::clone(p), p.caps()))
            })
        })
        .collect::<Result<_, _>>()?;
    let any_face = plan.iter().flatten().any(|(_, c)| {
        c.boundary || c.processor || c.skeleton
    });
    let ids = CellIdMapper::new(grid)?;

    for index in 0..grid.cell_count() {
        let cell = grid.cell(index)?;
        lfs.bind(&cell)?;

        for (li, entry) in plan.iter().enumerate() {
            let Some((policy, caps)) = entry else { continue };
            if caps.volume {
                let leaf = lfs.leaf(li)?;
                let mut trafo = LocalTransform::new();
                policy.volume(&cell, leaf, &mut trafo)?;
                report(opts.verbose, "volume", leaf, &trafo)?;
                trafo.scatter(leaf, &mut container)?;
            }
        }

        if !any_face {
            continue;
        }

        for face in grid.intersections(index)? {
            match face.kind() {
                IntersectionKind::Boundary => {
                    for (li, entry) in plan.iter().enumerate() {
                        let Some((policy, caps)) = entry else { continue };
                        if !caps.boundary {
                            continue;
                        }
                        let leaf = lfs.leaf(li)?;
                        let mut trafo = LocalTransform::new();
                        policy.boundary(bcs[li].as_ref(), &face, &cell, leaf, &mut trafo)?;
                        report(opts.verbose, "boundary", leaf, &trafo)?;
                        trafo.scatter(leaf, &mut container)?;
                    }
                }
                IntersectionKind::Processor => {
                    for (li, entry) in plan.iter().enumerate() {
                        let Some((policy, caps)) = entry else { continue };
                        if !caps.processor {
                            continue;
                        }
                        let leaf = lfs.leaf(li)?;
                        let mut trafo = LocalTransform::new();
                        policy.processor(&face, &cell, leaf, &mut trafo)?;
                        report(opts.verbose, "processor", leaf, &trafo)?;
                        trafo.scatter(leaf, &mut container)?;
                    }
                }
                IntersectionKind::Skeleton | IntersectionKind::Periodic => {
                    if !plan.iter().flatten().any(|(_, c)| c.skeleton) {
                        continue;
                    }
                    let neighbor_index = face.neighbor.ok_or(AssemblyError::UnknownCell {
                        cell: index,
                    })?;
                    let neighbor = grid.cell(neighbor_index)?;
                    // visited once, from the larger unique id
                    if ids.id(&cell)? <= ids.id(&neighbor)? {
                        continue;
                    }
                    lfs_out.bind(&neighbor)?;
                    for (li, entry) in plan.iter().enumerate() {
                        let Some((policy, caps)) = entry else { continue };
                        if !caps.skeleton {
                            continue;
                        }
                        let leaf_in = lfs.leaf(li)?;
                        let leaf_out = lfs_out.leaf(li)?;
                        let mut trafo_in = LocalTransform::new();
                        let mut trafo_out = LocalTransform::new();
                        policy.skeleton(
                            &face,
                            &cell,
                            &neighbor,
                            leaf_in,
                            leaf_out,
                            &mut trafo_in,
                            &mut trafo_out,
                        )?;
                        report(opts.verbose, "skeleton(in)", leaf_in, &trafo_in)?;
                        report(opts.verbose, "skeleton(out)", leaf_out, &trafo_out)?;
                        trafo_in.scatter(leaf_in, &mut container)?;
                        trafo_out.scatter(leaf_out, &mut container)?;
                    }
                }
            }
        }
    }

    container.debug_assert_invariants();
    Ok(container)
}
