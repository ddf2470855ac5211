//! Multi-stage one-step assembly.
//!
//! [`OneStepAssembler`] drives a spatial and a temporal local operator
//! through the stages of a [`OneStepMethod`]. A step is a fixed call
//! sequence: `pre_step`, then per stage `pre_stage` / residual-jacobian
//! work / `post_stage`, then `post_step`. Calls out of order fail with
//! [`AssemblyError::InvalidPhase`].
//!
//! Within stage `s` the residual is
//!
//! ```text
//!   sum_i a(s, i) * m(u_i)  +  dt * sum_i b(s, i) * r(u_i)
//! ```
//!
//! where `m` is the temporal and `r` the spatial form. The contributions
//! of the already-known stage solutions `u_0 .. u_{s-1}` are folded into a
//! constant part once per stage by [`OneStepAssembler::pre_stage`]; the
//! current-stage entry points only evaluate the forms at the iterate.
//! Coefficients with magnitude at or below
//! [`Scalar::coefficient_tolerance`] skip their pass entirely.

use log::trace;

use crate::assembly::global::{gather, scatter_add, ConstraintAwareScatter};
use crate::assembly::local::{LocalMatrix, LocalPattern, LocalVector};
use crate::assembly::method::OneStepMethod;
use crate::assembly::operator::{LocalOperator, OperatorCaps};
use crate::backend::{GlobalMatrix, GlobalVector, Pattern};
use crate::constraints::{constrain_residual, copy_constrained_dofs, ConstraintsContainer};
use crate::error::AssemblyError;
use crate::grid::{Cell, CellIdMapper, GridTopology, IntersectionKind, PartitionKind};
use crate::scalar::Scalar;
use crate::space::{LocalSpace, SpaceTree};

/// Splits a cell into integration parts.
///
/// The default keeps the cell whole; cut-cell or interface schemes
/// substitute their own decomposition. Parts are treated as cells of the
/// host cell's function space, so their degrees of freedom are the host's.
pub trait SubTriangulation: Send + Sync {
    /// Parts the volume terms integrate over.
    fn sub_cells(&self, cell: &Cell) -> Vec<Cell> {
        vec![*cell]
    }
}

/// Pass-through decomposition: every cell is its own single part.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoSubTriangulation;

impl SubTriangulation for NoSubTriangulation {}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    InStep,
    InStage,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::InStep => "InStep",
            Phase::InStage => "InStage",
        }
    }
}

/// Shared read-only state of one element sweep.
struct PassCtx<'a, T: Scalar, G: GridTopology> {
    grid: &'a G,
    ids: &'a CellIdMapper,
    trial: &'a SpaceTree<T>,
    test: &'a SpaceTree<T>,
    sub: &'a dyn SubTriangulation,
    nonoverlapping: bool,
}

impl<T: Scalar, G: GridTopology> PassCtx<'_, T, G> {
    /// Normal mode skips cells another rank owns; nonoverlapping mode
    /// skips everything except interior cells, so each contribution is
    /// computed by exactly one rank's interior view.
    fn skip_cell(&self, cell: &Cell) -> bool {
        if self.nonoverlapping {
            cell.partition != PartitionKind::Interior
        } else {
            !cell.partition.is_owned()
        }
    }

    /// Interior faces are visited once, from the side with the larger
    /// cell id, unless the operator demands two-sided visiting.
    fn skip_face(
        &self,
        caps: OperatorCaps,
        cell: &Cell,
        neighbor: &Cell,
    ) -> Result<bool, AssemblyError> {
        if caps.two_sided_skeleton {
            return Ok(false);
        }
        Ok(self.ids.id(cell)? <= self.ids.id(neighbor)?)
    }
}

/// One weighted residual sweep: `r += weight * form(x)` over all terms
/// the capability flags enable.
fn residual_pass<T, G, O, X, R>(
    ctx: &PassCtx<'_, T, G>,
    op: &mut O,
    caps: OperatorCaps,
    time: T,
    x: &X,
    weight: T,
    r: &mut R,
) -> Result<(), AssemblyError>
where
    T: Scalar,
    G: GridTopology,
    O: LocalOperator<T> + ?Sized,
    X: GlobalVector<T>,
    R: GlobalVector<T>,
{
    op.set_time(time);
    let mut lfsu = LocalSpace::new(ctx.trial)?;
    let mut lfsv = LocalSpace::new(ctx.test)?;
    let mut lfsu_n = LocalSpace::new(ctx.trial)?;
    let mut lfsv_n = LocalSpace::new(ctx.test)?;
    let faces = caps.alpha_skeleton
        || caps.alpha_boundary
        || caps.lambda_skeleton
        || caps.lambda_boundary;
    let post = caps.alpha_volume_post_skeleton || caps.lambda_volume_post_skeleton;

    for index in 0..ctx.grid.cell_count() {
        let cell = ctx.grid.cell(index)?;
        if ctx.skip_cell(&cell) {
            continue;
        }

        if caps.alpha_volume || caps.lambda_volume {
            for part in ctx.sub.sub_cells(&cell) {
                lfsu.bind(&part)?;
                lfsv.bind(&part)?;
                let xl = gather(x, &lfsu)?;
                let mut rl = LocalVector::zeros(lfsv.size()?);
                if caps.alpha_volume {
                    op.alpha_volume(&part, &lfsu, &xl, &lfsv, &mut rl)?;
                }
                if caps.lambda_volume {
                    op.lambda_volume(&part, &lfsv, &mut rl)?;
                }
                rl.scale(weight);
                scatter_add(&rl, &lfsv, r)?;
            }
        }

        if !(faces || post) {
            continue;
        }
        lfsu.bind(&cell)?;
        lfsv.bind(&cell)?;
        let xl = gather(x, &lfsu)?;

        if faces {
            for face in ctx.grid.intersections(index)? {
                match face.kind() {
                    IntersectionKind::Boundary => {
                        if !(caps.alpha_boundary || caps.lambda_boundary) {
                            continue;
                        }
                        let mut rl = LocalVector::zeros(lfsv.size()?);
                        if caps.alpha_boundary {
                            op.alpha_boundary(&face, &lfsu, &xl, &lfsv, &mut rl)?;
                        }
                        if caps.lambda_boundary {
                            op.lambda_boundary(&face, &lfsv, &mut rl)?;
                        }
                        rl.scale(weight);
                        scatter_add(&rl, &lfsv, r)?;
                    }
                    IntersectionKind::Skeleton | IntersectionKind::Periodic => {
                        if !(caps.alpha_skeleton || caps.lambda_skeleton) {
                            continue;
                        }
                        let neighbor = match face.neighbor {
                            Some(n) => ctx.grid.cell(n)?,
                            None => continue,
                        };
                        if ctx.skip_face(caps, &cell, &neighbor)? {
                            continue;
                        }
                        lfsu_n.bind(&neighbor)?;
                        lfsv_n.bind(&neighbor)?;
                        let xl_n = gather(x, &lfsu_n)?;
                        let mut rl_s = LocalVector::zeros(lfsv.size()?);
                        let mut rl_n = LocalVector::zeros(lfsv_n.size()?);
                        if caps.alpha_skeleton {
                            op.alpha_skeleton(
                                &face, &lfsu, &xl, &lfsv, &lfsu_n, &xl_n, &lfsv_n, &mut rl_s,
                                &mut rl_n,
                            )?;
                        }
                        if caps.lambda_skeleton {
                            op.lambda_skeleton(&face, &lfsv, &lfsv_n, &mut rl_s, &mut rl_n)?;
                        }
                        rl_s.scale(weight);
                        rl_n.scale(weight);
                        scatter_add(&rl_s, &lfsv, r)?;
                        scatter_add(&rl_n, &lfsv_n, r)?;
                    }
                    IntersectionKind::Processor => {}
                }
            }
        }

        if post {
            let mut rl = LocalVector::zeros(lfsv.size()?);
            if caps.alpha_volume_post_skeleton {
                op.alpha_volume_post_skeleton(&cell, &lfsu, &xl, &lfsv, &mut rl)?;
            }
            if caps.lambda_volume_post_skeleton {
                op.lambda_volume_post_skeleton(&cell, &lfsv, &mut rl)?;
            }
            rl.scale(weight);
            scatter_add(&rl, &lfsv, r)?;
        }
    }
    Ok(())
}

/// One weighted jacobian sweep. Jacobian hooks follow the `alpha` flags,
/// since a solution-dependent term implies a derivative.
fn jacobian_pass<T, G, O, X, M>(
    ctx: &PassCtx<'_, T, G>,
    op: &mut O,
    caps: OperatorCaps,
    scatter: &ConstraintAwareScatter<'_, T>,
    time: T,
    x: &X,
    weight: T,
    matrix: &mut M,
) -> Result<(), AssemblyError>
where
    T: Scalar,
    G: GridTopology,
    O: LocalOperator<T> + ?Sized,
    X: GlobalVector<T>,
    M: GlobalMatrix<T>,
{
    op.set_time(time);
    let mut lfsu = LocalSpace::new(ctx.trial)?;
    let mut lfsv = LocalSpace::new(ctx.test)?;
    let mut lfsu_n = LocalSpace::new(ctx.trial)?;
    let mut lfsv_n = LocalSpace::new(ctx.test)?;
    let faces = caps.alpha_skeleton || caps.alpha_boundary;

    for index in 0..ctx.grid.cell_count() {
        let cell = ctx.grid.cell(index)?;
        if ctx.skip_cell(&cell) {
            continue;
        }

        if caps.alpha_volume {
            for part in ctx.sub.sub_cells(&cell) {
                lfsu.bind(&part)?;
                lfsv.bind(&part)?;
                let xl = gather(x, &lfsu)?;
                let mut ml = LocalMatrix::zeros(lfsv.size()?, lfsu.size()?);
                op.jacobian_volume(&part, &lfsu, &xl, &lfsv, &mut ml)?;
                ml.scale(weight);
                scatter.etadd(&ml, &lfsv, &lfsu, matrix)?;
            }
        }

        if !faces {
            continue;
        }
        lfsu.bind(&cell)?;
        lfsv.bind(&cell)?;
        let xl = gather(x, &lfsu)?;

        for face in ctx.grid.intersections(index)? {
            match face.kind() {
                IntersectionKind::Boundary => {
                    if !caps.alpha_boundary {
                        continue;
                    }
                    let mut ml = LocalMatrix::zeros(lfsv.size()?, lfsu.size()?);
                    op.jacobian_boundary(&face, &lfsu, &xl, &lfsv, &mut ml)?;
                    ml.scale(weight);
                    scatter.etadd(&ml, &lfsv, &lfsu, matrix)?;
                }
                IntersectionKind::Skeleton | IntersectionKind::Periodic => {
                    if !caps.alpha_skeleton {
                        continue;
                    }
                    let neighbor = match face.neighbor {
                        Some(n) => ctx.grid.cell(n)?,
                        None => continue,
                    };
                    if ctx.skip_face(caps, &cell, &neighbor)? {
                        continue;
                    }
                    lfsu_n.bind(&neighbor)?;
                    lfsv_n.bind(&neighbor)?;
                    let xl_n = gather(x, &lfsu_n)?;
                    let mut m_ss = LocalMatrix::zeros(lfsv.size()?, lfsu.size()?);
                    let mut m_sn = LocalMatrix::zeros(lfsv.size()?, lfsu_n.size()?);
                    let mut m_ns = LocalMatrix::zeros(lfsv_n.size()?, lfsu.size()?);
                    let mut m_nn = LocalMatrix::zeros(lfsv_n.size()?, lfsu_n.size()?);
                    op.jacobian_skeleton(
                        &face, &lfsu, &xl, &lfsv, &lfsu_n, &xl_n, &lfsv_n, &mut m_ss, &mut m_sn,
                        &mut m_ns, &mut m_nn,
                    )?;
                    m_ss.scale(weight);
                    m_sn.scale(weight);
                    m_ns.scale(weight);
                    m_nn.scale(weight);
                    scatter.etadd(&m_ss, &lfsv, &lfsu, matrix)?;
                    scatter.etadd(&m_sn, &lfsv, &lfsu_n, matrix)?;
                    scatter.etadd(&m_ns, &lfsv_n, &lfsu, matrix)?;
                    scatter.etadd(&m_nn, &lfsv_n, &lfsu_n, matrix)?;
                }
                IntersectionKind::Processor => {}
            }
        }
    }
    Ok(())
}

/// One weighted matrix-free sweep: `y += weight * J(x) z` over all terms
/// the `alpha` flags enable. Linearization point and argument are gathered
/// from the same global vectors the caller passes.
fn jacobian_apply_pass<T, G, O, X, Z, Y>(
    ctx: &PassCtx<'_, T, G>,
    op: &mut O,
    caps: OperatorCaps,
    time: T,
    x: &X,
    z: &Z,
    weight: T,
    y: &mut Y,
) -> Result<(), AssemblyError>
where
    T: Scalar,
    G: GridTopology,
    O: LocalOperator<T> + ?Sized,
    X: GlobalVector<T>,
    Z: GlobalVector<T>,
    Y: GlobalVector<T>,
{
    op.set_time(time);
    let faces = caps.alpha_skeleton || caps.alpha_boundary;
    if !(caps.alpha_volume || faces) {
        return Ok(());
    }
    let mut lfsu = LocalSpace::new(ctx.trial)?;
    let mut lfsv = LocalSpace::new(ctx.test)?;
    let mut lfsu_n = LocalSpace::new(ctx.trial)?;
    let mut lfsv_n = LocalSpace::new(ctx.test)?;
    for index in 0..ctx.grid.cell_count() {
        let cell = ctx.grid.cell(index)?;
        if ctx.skip_cell(&cell) {
            continue;
        }

        if caps.alpha_volume {
            for part in ctx.sub.sub_cells(&cell) {
                lfsu.bind(&part)?;
                lfsv.bind(&part)?;
                let xl = gather(x, &lfsu)?;
                let zl = gather(z, &lfsu)?;
                let mut yl = LocalVector::zeros(lfsv.size()?);
                op.jacobian_apply_volume(&part, &lfsu, &xl, &zl, &lfsv, &mut yl)?;
                yl.scale(weight);
                scatter_add(&yl, &lfsv, y)?;
            }
        }

        if !faces {
            continue;
        }
        lfsu.bind(&cell)?;
        lfsv.bind(&cell)?;
        let xl = gather(x, &lfsu)?;
        let zl = gather(z, &lfsu)?;

        for face in ctx.grid.intersections(index)? {
            match face.kind() {
                IntersectionKind::Boundary => {
                    if !caps.alpha_boundary {
                        continue;
                    }
                    let mut yl = LocalVector::zeros(lfsv.size()?);
                    op.jacobian_apply_boundary(&face, &lfsu, &xl, &zl, &lfsv, &mut yl)?;
                    yl.scale(weight);
                    scatter_add(&yl, &lfsv, y)?;
                }
                IntersectionKind::Skeleton | IntersectionKind::Periodic => {
                    if !caps.alpha_skeleton {
                        continue;
                    }
                    let neighbor = match face.neighbor {
                        Some(n) => ctx.grid.cell(n)?,
                        None => continue,
                    };
                    if ctx.skip_face(caps, &cell, &neighbor)? {
                        continue;
                    }
                    lfsu_n.bind(&neighbor)?;
                    lfsv_n.bind(&neighbor)?;
                    let xl_n = gather(x, &lfsu_n)?;
                    let zl_n = gather(z, &lfsu_n)?;
                    let mut yl_s = LocalVector::zeros(lfsv.size()?);
                    let mut yl_n = LocalVector::zeros(lfsv_n.size()?);
                    op.jacobian_apply_skeleton(
                        &face, &lfsu, &xl, &zl, &lfsv, &lfsu_n, &xl_n, &zl_n, &lfsv_n,
                        &mut yl_s, &mut yl_n,
                    )?;
                    yl_s.scale(weight);
                    yl_n.scale(weight);
                    scatter_add(&yl_s, &lfsv, y)?;
                    scatter_add(&yl_n, &lfsv_n, y)?;
                }
                IntersectionKind::Processor => {}
            }
        }
    }
    Ok(())
}

/// One sparsity sweep over the couplings an operator declares.
fn pattern_pass<T, G, O, P>(
    ctx: &PassCtx<'_, T, G>,
    op: &O,
    caps: OperatorCaps,
    scatter: &ConstraintAwareScatter<'_, T>,
    pattern: &mut P,
) -> Result<(), AssemblyError>
where
    T: Scalar,
    G: GridTopology,
    O: LocalOperator<T> + ?Sized,
    P: Pattern,
{
    let mut lfsu = LocalSpace::new(ctx.trial)?;
    let mut lfsv = LocalSpace::new(ctx.test)?;
    let mut lfsu_n = LocalSpace::new(ctx.trial)?;
    let mut lfsv_n = LocalSpace::new(ctx.test)?;
    if !(caps.pattern_volume || caps.pattern_skeleton || caps.pattern_boundary) {
        return Ok(());
    }

    for index in 0..ctx.grid.cell_count() {
        let cell = ctx.grid.cell(index)?;
        if ctx.skip_cell(&cell) {
            continue;
        }
        lfsu.bind(&cell)?;
        lfsv.bind(&cell)?;

        if caps.pattern_volume {
            let mut lp = LocalPattern::new();
            op.pattern_volume(&lfsu, &lfsv, &mut lp)?;
            scatter.add_entries(pattern, &lfsv, &lfsu, &lp)?;
        }

        if !(caps.pattern_skeleton || caps.pattern_boundary) {
            continue;
        }
        for face in ctx.grid.intersections(index)? {
            match face.kind() {
                IntersectionKind::Boundary => {
                    if !caps.pattern_boundary {
                        continue;
                    }
                    let mut lp = LocalPattern::new();
                    op.pattern_boundary(&lfsu, &lfsv, &mut lp)?;
                    scatter.add_entries(pattern, &lfsv, &lfsu, &lp)?;
                }
                IntersectionKind::Skeleton | IntersectionKind::Periodic => {
                    if !caps.pattern_skeleton {
                        continue;
                    }
                    let neighbor = match face.neighbor {
                        Some(n) => ctx.grid.cell(n)?,
                        None => continue,
                    };
                    if ctx.skip_face(caps, &cell, &neighbor)? {
                        continue;
                    }
                    lfsu_n.bind(&neighbor)?;
                    lfsv_n.bind(&neighbor)?;
                    let mut lp_sn = LocalPattern::new();
                    let mut lp_ns = LocalPattern::new();
                    op.pattern_skeleton(&lfsu, &lfsv, &lfsu_n, &lfsv_n, &mut lp_sn, &mut lp_ns)?;
                    scatter.add_entries(pattern, &lfsv, &lfsu_n, &lp_sn)?;
                    scatter.add_entries(pattern, &lfsv_n, &lfsu, &lp_ns)?;
                }
                IntersectionKind::Processor => {}
            }
        }
    }
    Ok(())
}

// Built as direct field borrows so the operators stay mutably borrowable
// alongside the sweep context.
macro_rules! pass_ctx {
    ($self:ident) => {
        PassCtx {
            grid: $self.grid,
            ids: &$self.ids,
            trial: $self.trial,
            test: $self.test,
            sub: &*$self.sub,
            nonoverlapping: $self.nonoverlapping,
        }
    };
}

/// Constraint-aware assembler for one-step multi-stage schemes.
pub struct OneStepAssembler<'a, T, G, SP, TP>
where
    T: Scalar,
    G: GridTopology,
    SP: LocalOperator<T>,
    TP: LocalOperator<T>,
{
    grid: &'a G,
    trial: &'a SpaceTree<T>,
    test: &'a SpaceTree<T>,
    trial_constraints: &'a ConstraintsContainer<T>,
    test_constraints: &'a ConstraintsContainer<T>,
    spatial: SP,
    temporal: TP,
    method: &'a dyn OneStepMethod<T>,
    ids: CellIdMapper,
    sub: Box<dyn SubTriangulation>,
    nonoverlapping: bool,
    spatial_caps: OperatorCaps,
    temporal_caps: OperatorCaps,
    time: T,
    dt: T,
    stage: usize,
    r0: Vec<T>,
    phase: Phase,
}

impl<'a, T, G, SP, TP> OneStepAssembler<'a, T, G, SP, TP>
where
    T: Scalar,
    G: GridTopology,
    SP: LocalOperator<T>,
    TP: LocalOperator<T>,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        grid: &'a G,
        trial: &'a SpaceTree<T>,
        test: &'a SpaceTree<T>,
        trial_constraints: &'a ConstraintsContainer<T>,
        test_constraints: &'a ConstraintsContainer<T>,
        spatial: SP,
        temporal: TP,
        method: &'a dyn OneStepMethod<T>,
    ) -> Result<Self, AssemblyError> {
        let spatial_caps = spatial.caps();
        let temporal_caps = temporal.caps();
        let ids = CellIdMapper::new(grid)?;
        let r0 = vec![T::zero(); test.size()?];
        Ok(Self {
            grid,
            trial,
            test,
            trial_constraints,
            test_constraints,
            spatial,
            temporal,
            method,
            ids,
            sub: Box::new(NoSubTriangulation),
            nonoverlapping: false,
            spatial_caps,
            temporal_caps,
            time: T::zero(),
            dt: T::zero(),
            stage: 0,
            r0,
            phase: Phase::Idle,
        })
    }

    /// Restrict every sweep to interior cells, for nonoverlapping
    /// decompositions where border and ghost contributions belong to
    /// another rank's interior view.
    pub fn nonoverlapping_mode(mut self, on: bool) -> Self {
        self.nonoverlapping = on;
        self
    }

    /// Replace the volume-term decomposition.
    pub fn with_sub_triangulation(mut self, sub: Box<dyn SubTriangulation>) -> Self {
        self.sub = sub;
        self
    }

    /// Current stage, 1-based; 0 outside a stage.
    pub fn stage(&self) -> usize {
        self.stage
    }

    fn scatter(&self) -> ConstraintAwareScatter<'a, T> {
        ConstraintAwareScatter::new(self.trial_constraints, self.test_constraints)
    }

    fn require_phase(
        &self,
        expected: Phase,
        operation: &'static str,
    ) -> Result<(), AssemblyError> {
        if self.phase != expected {
            return Err(AssemblyError::InvalidPhase {
                operation,
                phase: self.phase.name(),
            });
        }
        Ok(())
    }

    /// Stage time of solution `i` in the running step.
    fn stage_time(&self, i: usize) -> T {
        self.time + self.method.d(i) * self.dt
    }

    /// Begin a step over `[time, time + dt]`.
    pub fn pre_step(&mut self, time: T, dt: T) -> Result<(), AssemblyError> {
        self.require_phase(Phase::Idle, "pre_step")?;
        self.time = time;
        self.dt = dt;
        self.stage = 0;
        for v in &mut self.r0 {
            *v = T::zero();
        }
        let stages = self.method.stages();
        self.spatial.pre_step(time, dt, stages);
        self.temporal.pre_step(time, dt, stages);
        self.phase = Phase::InStep;
        trace!("one-step: begin step at t={time}, dt={dt}, {stages} stages");
        Ok(())
    }

    /// Begin the next stage. `solutions` holds the stage solutions known
    /// so far, `u_0 .. u_{s-1}`, and their contributions are folded into
    /// the constant residual part.
    pub fn pre_stage<X: GlobalVector<T>>(
        &mut self,
        solutions: &[&X],
    ) -> Result<(), AssemblyError> {
        self.require_phase(Phase::InStep, "pre_stage")?;
        let stage = self.stage + 1;
        let stages = self.method.stages();
        if stage > stages {
            return Err(AssemblyError::InvalidStage { stage, stages });
        }
        if solutions.len() != stage {
            return Err(AssemblyError::WrongSolutionCount {
                expected: stage,
                found: solutions.len(),
            });
        }
        self.stage = stage;
        let stage_time = self.stage_time(stage);
        self.spatial.pre_stage(stage_time, stage);
        self.temporal.pre_stage(stage_time, stage);
        for v in &mut self.r0 {
            *v = T::zero();
        }

        let tol = T::coefficient_tolerance();
        for (i, x) in solutions.iter().enumerate() {
            let t_i = self.stage_time(i);
            let b = self.method.b(stage, i);
            if b.abs() > tol {
                let ctx = pass_ctx!(self);
                residual_pass(
                    &ctx,
                    &mut self.spatial,
                    self.spatial_caps,
                    t_i,
                    *x,
                    self.dt * b,
                    &mut self.r0,
                )?;
            }
            let a = self.method.a(stage, i);
            if a.abs() > tol {
                let ctx = pass_ctx!(self);
                residual_pass(
                    &ctx,
                    &mut self.temporal,
                    self.temporal_caps,
                    t_i,
                    *x,
                    a,
                    &mut self.r0,
                )?;
            }
        }
        self.phase = Phase::InStage;
        trace!("one-step: stage {stage}/{stages} prepared");
        Ok(())
    }

    /// Stage residual at the iterate `x`, constrained on the test side.
    pub fn residual<X, R>(&mut self, x: &X, r: &mut R) -> Result<(), AssemblyError>
    where
        X: GlobalVector<T>,
        R: GlobalVector<T>,
    {
        self.require_phase(Phase::InStage, "residual")?;
        if r.len() != self.r0.len() {
            return Err(AssemblyError::SizeMismatch {
                context: "residual",
                expected: self.r0.len(),
                found: r.len(),
            });
        }
        for (i, &v) in self.r0.iter().enumerate() {
            r.set(i, v)?;
        }
        let stage = self.stage;
        let stage_time = self.stage_time(stage);
        let b = self.method.b(stage, stage);
        if b.abs() > T::coefficient_tolerance() {
            let ctx = pass_ctx!(self);
            residual_pass(
                &ctx,
                &mut self.spatial,
                self.spatial_caps,
                stage_time,
                x,
                self.dt * b,
                r,
            )?;
        }
        // temporal weight is a(s, s) == 1 by normalization
        let ctx = pass_ctx!(self);
        residual_pass(
            &ctx,
            &mut self.temporal,
            self.temporal_caps,
            stage_time,
            x,
            T::one(),
            r,
        )?;
        constrain_residual(self.test_constraints, r)
    }

    /// Stage jacobian at the iterate `x`. Test-constrained rows end up as
    /// unit-diagonal rows.
    pub fn jacobian<X, M>(&mut self, x: &X, matrix: &mut M) -> Result<(), AssemblyError>
    where
        X: GlobalVector<T>,
        M: GlobalMatrix<T>,
    {
        self.require_phase(Phase::InStage, "jacobian")?;
        let stage = self.stage;
        let stage_time = self.stage_time(stage);
        let scatter = self.scatter();
        let b = self.method.b(stage, stage);
        if b.abs() > T::coefficient_tolerance() {
            let ctx = pass_ctx!(self);
            jacobian_pass(
                &ctx,
                &mut self.spatial,
                self.spatial_caps,
                &scatter,
                stage_time,
                x,
                self.dt * b,
                matrix,
            )?;
        }
        let ctx = pass_ctx!(self);
        jacobian_pass(
            &ctx,
            &mut self.temporal,
            self.temporal_caps,
            &scatter,
            stage_time,
            x,
            T::one(),
            matrix,
        )?;
        scatter.handle_dirichlet_constraints(matrix)
    }

    /// Matrix-free stage jacobian: `y = J(x) z`, with `y[i] = z[i]` on
    /// test-constrained rows.
    pub fn jacobian_apply<X, Z, Y>(
        &mut self,
        x: &X,
        z: &Z,
        y: &mut Y,
    ) -> Result<(), AssemblyError>
    where
        X: GlobalVector<T>,
        Z: GlobalVector<T>,
        Y: GlobalVector<T>,
    {
        self.require_phase(Phase::InStage, "jacobian_apply")?;
        for i in 0..y.len() {
            y.set(i, T::zero())?;
        }
        let stage = self.stage;
        let stage_time = self.stage_time(stage);
        let b = self.method.b(stage, stage);
        if b.abs() > T::coefficient_tolerance() {
            let ctx = pass_ctx!(self);
            jacobian_apply_pass(
                &ctx,
                &mut self.spatial,
                self.spatial_caps,
                stage_time,
                x,
                z,
                self.dt * b,
                y,
            )?;
        }
        let ctx = pass_ctx!(self);
        jacobian_apply_pass(
            &ctx,
            &mut self.temporal,
            self.temporal_caps,
            stage_time,
            x,
            z,
            T::one(),
            y,
        )?;
        for row in self.test_constraints.constrained() {
            y.set(row, z.get(row)?)?;
        }
        Ok(())
    }

    /// Explicit-mode stage assembly: the temporal jacobian (typically a
    /// mass matrix) at the newest solution, plus split residual parts
    ///
    /// ```text
    ///   r_alpha -= a(s, i) * m(u_i)      r_beta -= b(s, i) * r(u_i)
    /// ```
    ///
    /// over the known solutions, without the dt factor; the caller scales
    /// `r_beta` by the time step it finally picks. `solutions` must hold
    /// `u_0 .. u_s`, with the slot for the current stage carrying the
    /// value the temporal form is linearized at. Constrained rows of
    /// `r_beta` are zeroed; constrained rows of `r_alpha` take the newest
    /// solution's values, so boundary conditions survive the diagonal
    /// solve. Returns the spatial operator's stable time step.
    #[allow(clippy::too_many_arguments)]
    pub fn explicit_jacobian_residual<X, M, RA, RB>(
        &mut self,
        solutions: &[&X],
        matrix: &mut M,
        r_alpha: &mut RA,
        r_beta: &mut RB,
    ) -> Result<T, AssemblyError>
    where
        X: GlobalVector<T>,
        M: GlobalMatrix<T>,
        RA: GlobalVector<T>,
        RB: GlobalVector<T>,
    {
        self.require_phase(Phase::InStage, "explicit_jacobian_residual")?;
        if self.method.implicit() {
            return Err(AssemblyError::ExplicitModeWithImplicitScheme {
                method: self.method.name().to_owned(),
            });
        }
        let stage = self.stage;
        if solutions.len() != stage + 1 {
            return Err(AssemblyError::WrongSolutionCount {
                expected: stage + 1,
                found: solutions.len(),
            });
        }
        let stage_time = self.stage_time(stage);
        let scatter = self.scatter();
        let ctx = pass_ctx!(self);
        jacobian_pass(
            &ctx,
            &mut self.temporal,
            self.temporal_caps,
            &scatter,
            stage_time,
            solutions[stage],
            T::one(),
            matrix,
        )?;

        let tol = T::coefficient_tolerance();
        for (i, x) in solutions.iter().enumerate().take(stage) {
            let t_i = self.stage_time(i);
            let a = self.method.a(stage, i);
            if a.abs() > tol {
                let ctx = pass_ctx!(self);
                residual_pass(
                    &ctx,
                    &mut self.temporal,
                    self.temporal_caps,
                    t_i,
                    *x,
                    -a,
                    r_alpha,
                )?;
            }
            let b = self.method.b(stage, i);
            if b.abs() > tol {
                let ctx = pass_ctx!(self);
                residual_pass(
                    &ctx,
                    &mut self.spatial,
                    self.spatial_caps,
                    t_i,
                    *x,
                    -b,
                    r_beta,
                )?;
            }
        }
        constrain_residual(self.test_constraints, r_beta)?;
        // the temporal part instead carries the newest solution's values on
        // constrained rows, so the diagonal solve reproduces them
        copy_constrained_dofs(self.trial_constraints, solutions[stage], r_alpha)?;
        scatter.handle_dirichlet_constraints(matrix)?;
        Ok(self.spatial.suggest_timestep(self.dt))
    }

    /// Sparsity pattern of the stage jacobian, expanded through the
    /// constraints. Spatial couplings only enter the stage matrix for
    /// implicit schemes, so they are skipped for explicit ones.
    pub fn pattern<P: Pattern>(&mut self, pattern: &mut P) -> Result<(), AssemblyError> {
        let scatter = self.scatter();
        if self.method.implicit() {
            let ctx = pass_ctx!(self);
            pattern_pass(&ctx, &self.spatial, self.spatial_caps, &scatter, pattern)?;
        }
        let ctx = pass_ctx!(self);
        pattern_pass(&ctx, &self.temporal, self.temporal_caps, &scatter, pattern)
    }

    /// End the current stage.
    pub fn post_stage(&mut self) -> Result<(), AssemblyError> {
        self.require_phase(Phase::InStage, "post_stage")?;
        self.spatial.post_stage();
        self.temporal.post_stage();
        self.phase = Phase::InStep;
        trace!("one-step: stage {} done", self.stage);
        Ok(())
    }

    /// End the step and return to idle.
    pub fn post_step(&mut self) -> Result<(), AssemblyError> {
        self.require_phase(Phase::InStep, "post_step")?;
        self.spatial.post_step();
        self.temporal.post_step();
        self.stage = 0;
        self.phase = Phase::Idle;
        trace!("one-step: step done at t={}", self.time);
        Ok(())
    }

    /// Stable time step: the smaller of `dt` and what the operators allow.
    pub fn suggest_timestep(&self, dt: T) -> T {
        let s = self.spatial.suggest_timestep(dt);
        let t = self.temporal.suggest_timestep(dt);
        if s < t { s } else { t }
    }
}
