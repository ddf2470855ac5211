//! Scalar bound used throughout the crate.

use num_traits::Float;
use std::fmt::{Debug, Display};
use std::ops::{AddAssign, DivAssign, MulAssign, SubAssign};

/// Field type of vectors, matrices, and constraint weights.
///
/// Blanket-implemented; `f32` and `f64` qualify.
pub trait Scalar:
    Float + AddAssign + SubAssign + MulAssign + DivAssign + Default + Debug + Display + Send + Sync + 'static
{
    /// Tolerance below which time-stepping coefficients are treated as zero.
    fn coefficient_tolerance() -> Self {
        Self::from(1e-6).unwrap_or_else(Self::epsilon)
    }
}

impl<T> Scalar for T where
    T: Float
        + AddAssign
        + SubAssign
        + MulAssign
        + DivAssign
        + Default
        + Debug
        + Display
        + Send
        + Sync
        + 'static
{
}
