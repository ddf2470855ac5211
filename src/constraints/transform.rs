//! Vector transforms driven by a constraints container.
//!
//! These are the standalone helpers hosts call around solves: propagating
//! values between constrained and contributing DOFs, zeroing constrained
//! residual entries, and copying or overwriting (non)constrained subsets.

use crate::backend::GlobalVector;
use crate::constraints::container::ConstraintsContainer;
use crate::error::AssemblyError;
use crate::scalar::Scalar;

/// Push every constrained DOF's value into the DOFs it contributes to,
/// weighted per term. With `post_restrict`, constrained entries are zeroed
/// afterwards.
pub fn forward_transform<T: Scalar, X: GlobalVector<T>>(
    x: &mut X,
    constraints: &ConstraintsContainer<T>,
    post_restrict: bool,
) -> Result<(), AssemblyError> {
    for (contributor, row) in constraints.iter() {
        let v = x.get(contributor)?;
        for (&target, &w) in row {
            x.add(target, w * v)?;
        }
    }
    if post_restrict {
        for contributor in constraints.constrained() {
            x.set(contributor, T::zero())?;
        }
    }
    Ok(())
}

/// Rebuild every constrained DOF's value from the DOFs it contributes to,
/// weighted per term. With `pre_restrict`, constrained entries are zeroed
/// first, so the result is exactly the weighted combination.
pub fn back_transform<T: Scalar, X: GlobalVector<T>>(
    x: &mut X,
    constraints: &ConstraintsContainer<T>,
    pre_restrict: bool,
) -> Result<(), AssemblyError> {
    for (contributor, row) in constraints.iter() {
        if pre_restrict {
            x.set(contributor, T::zero())?;
        }
        let mut v = x.get(contributor)?;
        for (&target, &w) in row {
            v += w * x.get(target)?;
        }
        x.set(contributor, v)?;
    }
    Ok(())
}

/// Fold constrained residual entries into their contribution targets, then
/// zero every constrained entry. The two passes are ordered: all scattering
/// happens before any zeroing.
pub fn constrain_residual<T: Scalar, R: GlobalVector<T>>(
    constraints: &ConstraintsContainer<T>,
    r: &mut R,
) -> Result<(), AssemblyError> {
    for (contributor, row) in constraints.iter() {
        let v = r.get(contributor)?;
        for (&target, &w) in row {
            r.add(target, w * v)?;
        }
    }
    for contributor in constraints.constrained() {
        r.set(contributor, T::zero())?;
    }
    Ok(())
}

/// Overwrite every constrained entry with `value`.
pub fn set_constrained_dofs<T: Scalar, X: GlobalVector<T>>(
    constraints: &ConstraintsContainer<T>,
    value: T,
    x: &mut X,
) -> Result<(), AssemblyError> {
    for dof in constraints.constrained() {
        x.set(dof, value)?;
    }
    Ok(())
}

/// Overwrite every unconstrained entry with `value`.
pub fn set_nonconstrained_dofs<T: Scalar, X: GlobalVector<T>>(
    constraints: &ConstraintsContainer<T>,
    value: T,
    x: &mut X,
) -> Result<(), AssemblyError> {
    for dof in 0..x.len() {
        if !constraints.is_constrained(dof) {
            x.set(dof, value)?;
        }
    }
    Ok(())
}

/// Copy constrained entries from `src` into `dst`.
pub fn copy_constrained_dofs<T: Scalar, X: GlobalVector<T>, Y: GlobalVector<T>>(
    constraints: &ConstraintsContainer<T>,
    src: &X,
    dst: &mut Y,
) -> Result<(), AssemblyError> {
    for dof in constraints.constrained() {
        dst.set(dof, src.get(dof)?)?;
    }
    Ok(())
}

/// Copy unconstrained entries from `src` into `dst`.
pub fn copy_nonconstrained_dofs<T: Scalar, X: GlobalVector<T>, Y: GlobalVector<T>>(
    constraints: &ConstraintsContainer<T>,
    src: &X,
    dst: &mut Y,
) -> Result<(), AssemblyError> {
    if src.len() != dst.len() {
        return Err(AssemblyError::SizeMismatch {
            context: "copy_nonconstrained_dofs",
            expected: src.len(),
            found: dst.len(),
        });
    }
    for dof in 0..src.len() {
        if !constraints.is_constrained(dof) {
            dst.set(dof, src.get(dof)?)?;
        }
    }
    Ok(())
}

/// Overwrite every entry that is either unconstrained or constrained with a
/// non-empty row (i.e. everything except pure Dirichlet DOFs).
pub fn set_shifted_dofs<T: Scalar, X: GlobalVector<T>>(
    constraints: &ConstraintsContainer<T>,
    value: T,
    x: &mut X,
) -> Result<(), AssemblyError> {
    for dof in 0..x.len() {
        match constraints.row(dof) {
            None => x.set(dof, value)?,
            Some(row) if !row.is_empty() => x.set(dof, value)?,
            Some(_) => {}
        }
    }
    Ok(())
}

/// Compare two vectors on constrained entries only, within `tol`.
pub fn check_constrained_dofs<T: Scalar, X: GlobalVector<T>, Y: GlobalVector<T>>(
    constraints: &ConstraintsContainer<T>,
    a: &X,
    b: &Y,
    tol: T,
) -> Result<bool, AssemblyError> {
    for dof in constraints.constrained() {
        if (a.get(dof)? - b.get(dof)?).abs() > tol {
            return Ok(false);
        }
    }
    Ok(true)
}
