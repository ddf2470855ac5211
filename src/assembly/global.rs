//! Constraint-aware scattering of per-element contributions.
//!
//! [`ConstraintAwareScatter`] expands every local matrix entry through the
//! trial- and test-side constraint containers before it reaches the global
//! matrix. An unconstrained or pure-Dirichlet index expands to itself with
//! weight one; a weighted row expands to its (target, weight) list. Entries
//! redirected beyond the identity go through the backend's foreign-DOF
//! accessor, since they may land outside the element's own rows.

use crate::assembly::local::{LocalMatrix, LocalPattern, LocalVector};
use crate::backend::{GlobalMatrix, GlobalVector, Pattern};
use crate::constraints::container::{ConstraintRow, ConstraintsContainer};
use crate::error::AssemblyError;
use crate::scalar::Scalar;
use crate::space::LocalSpace;

/// Expansion of one global index through a constraints container.
enum Expansion<'a, T: Scalar> {
    /// Unconstrained or pure Dirichlet: the index itself, weight one.
    Identity(usize),
    /// Weighted constraint row.
    Weighted(&'a ConstraintRow<T>),
}

impl<'a, T: Scalar> Expansion<'a, T> {
    fn of(container: &'a ConstraintsContainer<T>, index: usize) -> Self {
        match container.row(index) {
            Some(row) if !row.is_empty() => Expansion::Weighted(row),
            _ => Expansion::Identity(index),
        }
    }

    fn is_weighted(&self) -> bool {
        matches!(self, Expansion::Weighted(_))
    }

    fn each(&self, mut f: impl FnMut(usize, T) -> Result<(), AssemblyError>) -> Result<(), AssemblyError> {
        match self {
            Expansion::Identity(i) => f(*i, T::one()),
            Expansion::Weighted(row) => {
                for (&target, &w) in row.iter() {
                    f(target, w)?;
                }
                Ok(())
            }
        }
    }
}

/// Trial- and test-side constraint containers bundled for assembly.
#[derive(Copy, Clone)]
pub struct ConstraintAwareScatter<'a, T: Scalar> {
    trial: &'a ConstraintsContainer<T>,
    test: &'a ConstraintsContainer<T>,
}

impl<'a, T: Scalar> ConstraintAwareScatter<'a, T> {
    /// Bundle the two containers; for symmetric problems pass the same one
    /// twice.
    pub fn new(trial: &'a ConstraintsContainer<T>, test: &'a ConstraintsContainer<T>) -> Self {
        Self { trial, test }
    }

    /// The test-side container.
    pub fn test_constraints(&self) -> &'a ConstraintsContainer<T> {
        self.test
    }

    /// Scatter a local matrix into the global one, expanding rows through
    /// the test container and columns through the trial container.
    ///
    /// Exact-zero expanded entries are skipped; everything else accumulates.
    pub fn etadd<M: GlobalMatrix<T>>(
        &self,
        local: &LocalMatrix<T>,
        lfsv: &LocalSpace<T>,
        lfsu: &LocalSpace<T>,
        matrix: &mut M,
    ) -> Result<(), AssemblyError> {
        for i in 0..local.rows() {
            let gi = lfsv.global_index(i)?;
            let row_exp = Expansion::of(self.test, gi);
            for j in 0..local.cols() {
                let v = local.get(i, j)?;
                if v == T::zero() {
                    continue;
                }
                let gj = lfsu.global_index(j)?;
                let col_exp = Expansion::of(self.trial, gj);
                let foreign = row_exp.is_weighted() || col_exp.is_weighted();
                row_exp.each(|ri, wv| {
                    col_exp.each(|ci, wu| {
                        let t = v * wv * wu;
                        if t == T::zero() {
                            return Ok(());
                        }
                        if foreign {
                            matrix.add_global(ri, ci, t)
                        } else {
                            matrix.add(ri, ci, t)
                        }
                    })
                })?;
            }
        }
        Ok(())
    }

    /// [`etadd`](Self::etadd) when trial and test share one local space.
    pub fn etadd_symmetric<M: GlobalMatrix<T>>(
        &self,
        local: &LocalMatrix<T>,
        lfs: &LocalSpace<T>,
        matrix: &mut M,
    ) -> Result<(), AssemblyError> {
        self.etadd(local, lfs, lfs, matrix)
    }

    /// Record one (row, col) coupling in the pattern, expanded exactly the
    /// way [`etadd`](Self::etadd) expands values, plus the diagonal link
    /// for row == col so trivial rows always have their diagonal.
    pub fn add_entry<P: Pattern>(&self, pattern: &mut P, gi: usize, gj: usize) {
        if gi == gj {
            pattern.add_link(gi, gj);
        }
        let row_exp = Expansion::of(self.test, gi);
        let col_exp = Expansion::of(self.trial, gj);
        // infallible closures; errors cannot occur here
        let _ = row_exp.each(|ri, _| {
            col_exp.each(|ci, _| {
                pattern.add_link(ri, ci);
                Ok(())
            })
        });
    }

    /// Record every coupling a local pattern declares.
    pub fn add_entries<P: Pattern>(
        &self,
        pattern: &mut P,
        lfsv: &LocalSpace<T>,
        lfsu: &LocalSpace<T>,
        local: &LocalPattern,
    ) -> Result<(), AssemblyError> {
        for (i, j) in local.iter() {
            let gi = lfsv.global_index(i)?;
            let gj = lfsu.global_index(j)?;
            self.add_entry(pattern, gi, gj);
        }
        Ok(())
    }

    /// Clear a row and put one on its diagonal.
    pub fn set_trivial_row<M: GlobalMatrix<T>>(
        &self,
        row: usize,
        matrix: &mut M,
    ) -> Result<(), AssemblyError> {
        matrix.clear_row(row, T::one())
    }

    /// Turn every test-constrained row into a trivial row: flush pending
    /// contributions, rewrite the rows in ascending index order, finalize.
    pub fn handle_dirichlet_constraints<M: GlobalMatrix<T>>(
        &self,
        matrix: &mut M,
    ) -> Result<(), AssemblyError> {
        matrix.flush()?;
        for row in self.test.constrained() {
            self.set_trivial_row(row, matrix)?;
        }
        matrix.finalize()
    }
}

/// Read the element's block of a global matrix into a local one.
pub fn eread<T: Scalar, M: GlobalMatrix<T>>(
    lfsv: &LocalSpace<T>,
    lfsu: &LocalSpace<T>,
    matrix: &M,
) -> Result<LocalMatrix<T>, AssemblyError> {
    let mut local = LocalMatrix::zeros(lfsv.size()?, lfsu.size()?);
    for i in 0..local.rows() {
        for j in 0..local.cols() {
            local.set(i, j, matrix.get(lfsv.global_index(i)?, lfsu.global_index(j)?)?)?;
        }
    }
    Ok(local)
}

/// Overwrite the element's block of a global matrix.
pub fn ewrite<T: Scalar, M: GlobalMatrix<T>>(
    local: &LocalMatrix<T>,
    lfsv: &LocalSpace<T>,
    lfsu: &LocalSpace<T>,
    matrix: &mut M,
) -> Result<(), AssemblyError> {
    for i in 0..local.rows() {
        for j in 0..local.cols() {
            matrix.set(lfsv.global_index(i)?, lfsu.global_index(j)?, local.get(i, j)?)?;
        }
    }
    Ok(())
}

/// Accumulate into the element's block of a global matrix, without
/// constraint expansion.
pub fn eadd<T: Scalar, M: GlobalMatrix<T>>(
    local: &LocalMatrix<T>,
    lfsv: &LocalSpace<T>,
    lfsu: &LocalSpace<T>,
    matrix: &mut M,
) -> Result<(), AssemblyError> {
    for i in 0..local.rows() {
        for j in 0..local.cols() {
            matrix.add(lfsv.global_index(i)?, lfsu.global_index(j)?, local.get(i, j)?)?;
        }
    }
    Ok(())
}

/// Gather the element's entries of a global vector.
pub fn gather<T: Scalar, X: GlobalVector<T>>(
    x: &X,
    lfs: &LocalSpace<T>,
) -> Result<LocalVector<T>, AssemblyError> {
    let mut local = LocalVector::zeros(lfs.size()?);
    for i in 0..local.len() {
        local.set(i, x.get(lfs.global_index(i)?)?)?;
    }
    Ok(local)
}

/// Accumulate a local vector into a global one.
pub fn scatter_add<T: Scalar, R: GlobalVector<T>>(
    local: &LocalVector<T>,
    lfs: &LocalSpace<T>,
    r: &mut R,
) -> Result<(), AssemblyError> {
    for i in 0..local.len() {
        r.add(lfs.global_index(i)?, local.get(i)?)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DenseMatrix, MapPattern};
    use crate::grid::{GridTopology, IntervalGrid};
    use crate::space::{LocalSpace, P1IntervalMap, SpaceTree};
    use std::sync::Arc;

    fn bound_p1(cells: usize, cell: usize) -> LocalSpace<f64> {
        let space = SpaceTree::leaf(Arc::new(P1IntervalMap::new(cells)));
        let grid = IntervalGrid::new(cells, cells as f64);
        let mut lfs = LocalSpace::new(&space).unwrap();
        lfs.bind(&grid.cell(cell).unwrap()).unwrap();
        lfs
    }

    #[test]
    fn unconstrained_entries_pass_through() {
        let cg = ConstraintsContainer::new();
        let scatter = ConstraintAwareScatter::new(&cg, &cg);
        let lfs = bound_p1(3, 1);
        let local = LocalMatrix::from_rows(vec![vec![2.0, -1.0], vec![-1.0, 2.0]]);
        let mut m = DenseMatrix::zeros(4, 4);
        scatter.etadd_symmetric(&local, &lfs, &mut m).unwrap();
        assert_eq!(m.get(1, 1).unwrap(), 2.0);
        assert_eq!(m.get(1, 2).unwrap(), -1.0);
        assert_eq!(m.get(2, 1).unwrap(), -1.0);
    }

    #[test]
    fn pure_dirichlet_rows_receive_raw_values() {
        let mut cg = ConstraintsContainer::new();
        cg.insert_dirichlet(0);
        let scatter = ConstraintAwareScatter::new(&cg, &cg);
        let lfs = bound_p1(3, 0);
        let local = LocalMatrix::from_rows(vec![vec![2.0, 1.0], vec![1.0, 3.0]]);
        let mut m = DenseMatrix::zeros(4, 4);
        scatter.etadd_symmetric(&local, &lfs, &mut m).unwrap();
        // no expansion for Dirichlet rows or columns
        assert_eq!(m.get(0, 1).unwrap(), 1.0);
        assert_eq!(m.get(1, 0).unwrap(), 1.0);
        assert_eq!(m.get(0, 0).unwrap(), 2.0);
        // the Dirichlet row is rewritten afterwards
        scatter.handle_dirichlet_constraints(&mut m).unwrap();
        assert_eq!(m.get(0, 0).unwrap(), 1.0);
        assert_eq!(m.get(0, 1).unwrap(), 0.0);
        assert_eq!(m.get(1, 0).unwrap(), 1.0);
    }

    #[test]
    fn pattern_is_a_superset_of_values() {
        let mut cg = ConstraintsContainer::new();
        cg.insert_weighted(2, [(0, 0.5), (1, 0.5)]);
        let scatter = ConstraintAwareScatter::new(&cg, &cg);
        let lfs = bound_p1(3, 1);
        let local = LocalMatrix::from_rows(vec![vec![2.0, -1.0], vec![-1.0, 2.0]]);

        let mut pattern = MapPattern::new();
        for i in 0..2 {
            for j in 0..2 {
                scatter.add_entry(
                    &mut pattern,
                    lfs.global_index(i).unwrap(),
                    lfs.global_index(j).unwrap(),
                );
            }
        }

        let mut m = DenseMatrix::zeros(4, 4);
        scatter.etadd_symmetric(&local, &lfs, &mut m).unwrap();
        for row in 0..4 {
            for col in 0..4 {
                if m.get(row, col).unwrap() != 0.0 {
                    assert!(pattern.contains(row, col), "missing link ({row}, {col})");
                }
            }
        }
    }

    #[test]
    fn eread_ewrite_round_trip() {
        let cg = ConstraintsContainer::<f64>::new();
        let _ = ConstraintAwareScatter::new(&cg, &cg);
        let lfs = bound_p1(3, 2);
        let mut m = DenseMatrix::zeros(4, 4);
        let local = LocalMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        ewrite(&local, &lfs, &lfs, &mut m).unwrap();
        assert_eq!(eread(&lfs, &lfs, &m).unwrap(), local);
        eadd(&local, &lfs, &lfs, &mut m).unwrap();
        assert_eq!(m.get(2, 2).unwrap(), 2.0);
    }

    #[test]
    fn vector_gather_scatter() {
        let lfs = bound_p1(3, 1);
        let x = vec![0.0, 1.0, 2.0, 3.0];
        let local = gather(&x, &lfs).unwrap();
        assert_eq!(local.as_slice(), &[1.0, 2.0]);
        let mut r = vec![0.0; 4];
        scatter_add(&local, &lfs, &mut r).unwrap();
        assert_eq!(r, vec![0.0, 1.0, 2.0, 0.0]);
    }
}
