//! One-step time-stepping method parameters.
//!
//! A method is consumed as a coefficient table: at stage `s` (1-based) the
//! residual combines temporal terms weighted `a(s, i)` and spatial terms
//! weighted `dt * b(s, i)` over the stage solutions `i = 0..=s`, with stage
//! times `t + d(i) * dt`. Tables are normalized so `a(s, s) == 1`.

use crate::scalar::Scalar;

/// Coefficient table of a one-step multi-stage scheme.
pub trait OneStepMethod<T: Scalar>: Send + Sync {
    /// Method name for diagnostics.
    fn name(&self) -> &str;

    /// Number of stages.
    fn stages(&self) -> usize;

    /// Temporal weight of solution `i` at stage `stage`.
    fn a(&self, stage: usize, i: usize) -> T;

    /// Spatial weight of solution `i` at stage `stage` (multiplied by dt).
    fn b(&self, stage: usize, i: usize) -> T;

    /// Fraction of dt at which solution `i` lives.
    fn d(&self, i: usize) -> T;

    /// Whether the scheme couples the current stage into the spatial term.
    fn implicit(&self) -> bool;
}

/// Backward Euler: one implicit stage.
#[derive(Copy, Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct ImplicitEuler;

impl<T: Scalar> OneStepMethod<T> for ImplicitEuler {
    fn name(&self) -> &str {
        "implicit Euler"
    }

    fn stages(&self) -> usize {
        1
    }

    fn a(&self, _stage: usize, i: usize) -> T {
        if i == 0 { -T::one() } else { T::one() }
    }

    fn b(&self, _stage: usize, i: usize) -> T {
        if i == 0 { T::zero() } else { T::one() }
    }

    fn d(&self, i: usize) -> T {
        if i == 0 { T::zero() } else { T::one() }
    }

    fn implicit(&self) -> bool {
        true
    }
}

/// Forward Euler: one explicit stage.
#[derive(Copy, Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct ExplicitEuler;

impl<T: Scalar> OneStepMethod<T> for ExplicitEuler {
    fn name(&self) -> &str {
        "explicit Euler"
    }

    fn stages(&self) -> usize {
        1
    }

    fn a(&self, _stage: usize, i: usize) -> T {
        if i == 0 { -T::one() } else { T::one() }
    }

    fn b(&self, _stage: usize, i: usize) -> T {
        if i == 0 { T::one() } else { T::zero() }
    }

    fn d(&self, i: usize) -> T {
        if i == 0 { T::zero() } else { T::one() }
    }

    fn implicit(&self) -> bool {
        false
    }
}
