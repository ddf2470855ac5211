//! Per-element containers local operators write into.

use crate::error::AssemblyError;
use crate::scalar::Scalar;
use std::collections::BTreeSet;

/// Dense per-element vector.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalVector<T: Scalar> {
    data: Vec<T>,
}

impl<T: Scalar> LocalVector<T> {
    /// A zero vector of the given length.
    pub fn zeros(len: usize) -> Self {
        Self {
            data: vec![T::zero(); len],
        }
    }

    /// Length.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for length zero.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Resize and zero.
    pub fn reset(&mut self, len: usize) {
        self.data.clear();
        self.data.resize(len, T::zero());
    }

    /// Read one entry.
    pub fn get(&self, index: usize) -> Result<T, AssemblyError> {
        self.data
            .get(index)
            .copied()
            .ok_or(AssemblyError::LocalIndexOutOfRange {
                index,
                size: self.data.len(),
            })
    }

    /// Overwrite one entry.
    pub fn set(&mut self, index: usize, value: T) -> Result<(), AssemblyError> {
        let size = self.data.len();
        *self
            .data
            .get_mut(index)
            .ok_or(AssemblyError::LocalIndexOutOfRange { index, size })? = value;
        Ok(())
    }

    /// Accumulate into one entry.
    pub fn add(&mut self, index: usize, value: T) -> Result<(), AssemblyError> {
        let size = self.data.len();
        *self
            .data
            .get_mut(index)
            .ok_or(AssemblyError::LocalIndexOutOfRange { index, size })? += value;
        Ok(())
    }

    /// Scale all entries.
    pub fn scale(&mut self, factor: T) {
        for v in &mut self.data {
            *v *= factor;
        }
    }

    /// The raw entries.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

/// Dense row-major per-element matrix, rows = test DOFs, cols = trial DOFs.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalMatrix<T: Scalar> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Scalar> LocalMatrix<T> {
    /// A zero matrix of the given shape.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![T::zero(); rows * cols],
        }
    }

    /// Build from row-major data; panics on shape mismatch (test helper).
    pub fn from_rows(rows: Vec<Vec<T>>) -> Self {
        let r = rows.len();
        let c = rows.first().map(Vec::len).unwrap_or(0);
        let data: Vec<T> = rows.into_iter().flatten().collect();
        assert_eq!(data.len(), r * c);
        Self {
            rows: r,
            cols: c,
            data,
        }
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Resize and zero.
    pub fn reset(&mut self, rows: usize, cols: usize) {
        self.rows = rows;
        self.cols = cols;
        self.data.clear();
        self.data.resize(rows * cols, T::zero());
    }

    fn index(&self, row: usize, col: usize) -> Result<usize, AssemblyError> {
        if row >= self.rows {
            return Err(AssemblyError::LocalIndexOutOfRange {
                index: row,
                size: self.rows,
            });
        }
        if col >= self.cols {
            return Err(AssemblyError::LocalIndexOutOfRange {
                index: col,
                size: self.cols,
            });
        }
        Ok(row * self.cols + col)
    }

    /// Read one entry.
    pub fn get(&self, row: usize, col: usize) -> Result<T, AssemblyError> {
        Ok(self.data[self.index(row, col)?])
    }

    /// Overwrite one entry.
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<(), AssemblyError> {
        let i = self.index(row, col)?;
        self.data[i] = value;
        Ok(())
    }

    /// Accumulate into one entry.
    pub fn add(&mut self, row: usize, col: usize, value: T) -> Result<(), AssemblyError> {
        let i = self.index(row, col)?;
        self.data[i] += value;
        Ok(())
    }

    /// Scale all entries.
    pub fn scale(&mut self, factor: T) {
        for v in &mut self.data {
            *v *= factor;
        }
    }
}

/// Set of (test, trial) local index pairs a pattern hook declares.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocalPattern {
    pairs: BTreeSet<(usize, usize)>,
}

impl LocalPattern {
    /// An empty pattern.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare one coupling.
    pub fn add(&mut self, test: usize, trial: usize) {
        self.pairs.insert((test, trial));
    }

    /// Declared couplings in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.pairs.iter().copied()
    }

    /// Number of couplings.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when nothing was declared.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Drop all couplings.
    pub fn clear(&mut self) {
        self.pairs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_accumulates_and_scales() {
        let mut v = LocalVector::<f64>::zeros(2);
        v.add(0, 2.0).unwrap();
        v.add(0, 1.0).unwrap();
        v.scale(2.0);
        assert_eq!(v.get(0).unwrap(), 6.0);
        assert!(v.get(2).is_err());
    }

    #[test]
    fn matrix_shape_checks() {
        let m = LocalMatrix::<f64>::from_rows(vec![vec![2.0, 1.0], vec![1.0, 3.0]]);
        assert_eq!(m.get(1, 0).unwrap(), 1.0);
        assert!(m.get(0, 2).is_err());
        assert!(m.get(2, 0).is_err());
    }

    #[test]
    fn reset_clears_content() {
        let mut m = LocalMatrix::<f64>::zeros(1, 1);
        m.add(0, 0, 5.0).unwrap();
        m.reset(2, 2);
        assert_eq!(m.get(0, 0).unwrap(), 0.0);
        assert_eq!(m.rows(), 2);
    }
}
