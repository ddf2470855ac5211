//! Full-coupling pattern helpers for local operators.
//!
//! Operators whose kernels couple every test DOF with every trial DOF call
//! these from their pattern hooks instead of spelling the loops out.

use crate::assembly::local::LocalPattern;
use crate::error::AssemblyError;
use crate::scalar::Scalar;
use crate::space::LocalSpace;

/// Couple every (test, trial) pair of one cell.
pub fn full_volume_pattern<T: Scalar>(
    lfsu: &LocalSpace<T>,
    lfsv: &LocalSpace<T>,
    pattern: &mut LocalPattern,
) -> Result<(), AssemblyError> {
    for i in 0..lfsv.size()? {
        for j in 0..lfsu.size()? {
            pattern.add(i, j);
        }
    }
    Ok(())
}

/// Couple every test DOF of one side with every trial DOF of the other, in
/// both directions.
pub fn full_skeleton_pattern<T: Scalar>(
    lfsu_s: &LocalSpace<T>,
    lfsv_s: &LocalSpace<T>,
    lfsu_n: &LocalSpace<T>,
    lfsv_n: &LocalSpace<T>,
    pattern_sn: &mut LocalPattern,
    pattern_ns: &mut LocalPattern,
) -> Result<(), AssemblyError> {
    for i in 0..lfsv_s.size()? {
        for j in 0..lfsu_n.size()? {
            pattern_sn.add(i, j);
        }
    }
    for i in 0..lfsv_n.size()? {
        for j in 0..lfsu_s.size()? {
            pattern_ns.add(i, j);
        }
    }
    Ok(())
}

/// Couple every (test, trial) pair of a boundary cell.
pub fn full_boundary_pattern<T: Scalar>(
    lfsu: &LocalSpace<T>,
    lfsv: &LocalSpace<T>,
    pattern: &mut LocalPattern,
) -> Result<(), AssemblyError> {
    full_volume_pattern(lfsu, lfsv, pattern)
}
