//! Backend contracts for global vectors, matrices, and sparsity patterns.
//!
//! The engine only ever touches linear algebra through these traits; hosts
//! plug in their own storage. [`DenseMatrix`] and [`MapPattern`] are simple
//! reference implementations used by the tests and small problems.

use crate::error::AssemblyError;
use crate::scalar::Scalar;
use std::collections::{BTreeMap, BTreeSet};

/// Indexed access to a global solution or residual vector.
pub trait GlobalVector<T: Scalar> {
    /// Number of entries.
    fn len(&self) -> usize;

    /// True for a zero-length vector.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read one entry.
    ///
    /// # Errors
    /// [`AssemblyError::DofIndexOutOfBounds`] outside `0..len()`.
    fn get(&self, index: usize) -> Result<T, AssemblyError>;

    /// Overwrite one entry.
    fn set(&mut self, index: usize, value: T) -> Result<(), AssemblyError>;

    /// Accumulate into one entry.
    fn add(&mut self, index: usize, value: T) -> Result<(), AssemblyError>;
}

impl<T: Scalar> GlobalVector<T> for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn get(&self, index: usize) -> Result<T, AssemblyError> {
        self.as_slice()
            .get(index)
            .copied()
            .ok_or(AssemblyError::DofIndexOutOfBounds {
                index,
                size: Vec::len(self),
            })
    }

    fn set(&mut self, index: usize, value: T) -> Result<(), AssemblyError> {
        let size = Vec::len(self);
        *self
            .as_mut_slice()
            .get_mut(index)
            .ok_or(AssemblyError::DofIndexOutOfBounds { index, size })? = value;
        Ok(())
    }

    fn add(&mut self, index: usize, value: T) -> Result<(), AssemblyError> {
        let size = Vec::len(self);
        *self
            .as_mut_slice()
            .get_mut(index)
            .ok_or(AssemblyError::DofIndexOutOfBounds { index, size })? += value;
        Ok(())
    }
}

/// Collector for the nonzero structure of a global matrix.
pub trait Pattern {
    /// Record that entry (row, col) may become nonzero.
    fn add_link(&mut self, row: usize, col: usize);
}

/// Ordered set of (row, col) links; the reference [`Pattern`].
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MapPattern {
    links: BTreeSet<(usize, usize)>,
}

impl MapPattern {
    /// An empty pattern.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a link was recorded.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.links.contains(&(row, col))
    }

    /// Number of links.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// True when no link was recorded.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Links in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.links.iter().copied()
    }
}

impl Pattern for MapPattern {
    fn add_link(&mut self, row: usize, col: usize) {
        self.links.insert((row, col));
    }
}

/// Write access to a global matrix.
///
/// `add` is the fast path for entries owned by the current element;
/// `add_global` is the accessor for entries redirected by constraint
/// expansion, which may land far away from the element's own rows. Backends
/// without a distinction forward one to the other.
pub trait GlobalMatrix<T: Scalar> {
    /// Number of rows.
    fn rows(&self) -> usize;

    /// Number of columns.
    fn cols(&self) -> usize;

    /// Read one entry.
    fn get(&self, row: usize, col: usize) -> Result<T, AssemblyError>;

    /// Overwrite one entry.
    fn set(&mut self, row: usize, col: usize, value: T) -> Result<(), AssemblyError>;

    /// Accumulate into one entry.
    fn add(&mut self, row: usize, col: usize, value: T) -> Result<(), AssemblyError>;

    /// Accumulate into an entry reached through constraint expansion.
    fn add_global(&mut self, row: usize, col: usize, value: T) -> Result<(), AssemblyError> {
        self.add(row, col, value)
    }

    /// Zero a row and put `diagonal` on its diagonal.
    fn clear_row(&mut self, row: usize, diagonal: T) -> Result<(), AssemblyError>;

    /// Push pending off-process contributions; a no-op for local backends.
    fn flush(&mut self) -> Result<(), AssemblyError> {
        Ok(())
    }

    /// Finish assembly; a no-op for local backends.
    fn finalize(&mut self) -> Result<(), AssemblyError> {
        Ok(())
    }
}

/// Row-major dense matrix; the reference [`GlobalMatrix`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DenseMatrix<T: Scalar> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Scalar> DenseMatrix<T> {
    /// A zero matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![T::zero(); rows * cols],
        }
    }

    fn index(&self, row: usize, col: usize) -> Result<usize, AssemblyError> {
        if row >= self.rows {
            return Err(AssemblyError::DofIndexOutOfBounds {
                index: row,
                size: self.rows,
            });
        }
        if col >= self.cols {
            return Err(AssemblyError::DofIndexOutOfBounds {
                index: col,
                size: self.cols,
            });
        }
        Ok(row * self.cols + col)
    }
}

impl<T: Scalar> GlobalMatrix<T> for DenseMatrix<T> {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn get(&self, row: usize, col: usize) -> Result<T, AssemblyError> {
        Ok(self.data[self.index(row, col)?])
    }

    fn set(&mut self, row: usize, col: usize, value: T) -> Result<(), AssemblyError> {
        let i = self.index(row, col)?;
        self.data[i] = value;
        Ok(())
    }

    fn add(&mut self, row: usize, col: usize, value: T) -> Result<(), AssemblyError> {
        let i = self.index(row, col)?;
        self.data[i] += value;
        Ok(())
    }

    fn clear_row(&mut self, row: usize, diagonal: T) -> Result<(), AssemblyError> {
        let start = self.index(row, 0)?;
        for v in &mut self.data[start..start + self.cols] {
            *v = T::zero();
        }
        if row < self.cols {
            self.data[start + row] = diagonal;
        }
        Ok(())
    }
}

/// Sparse matrix over an ordered map; pairs with [`MapPattern`] when a test
/// needs to tell a stored zero from an entry that was never touched.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MapMatrix<T: Scalar> {
    rows: usize,
    cols: usize,
    entries: BTreeMap<(usize, usize), T>,
}

impl<T: Scalar> MapMatrix<T> {
    /// An empty matrix of the given shape.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            entries: BTreeMap::new(),
        }
    }

    /// Number of stored entries.
    pub fn stored(&self) -> usize {
        self.entries.len()
    }

    /// Whether an entry was ever written.
    pub fn touched(&self, row: usize, col: usize) -> bool {
        self.entries.contains_key(&(row, col))
    }

    /// Stored entries in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        self.entries.iter().map(|(&(r, c), &v)| (r, c, v))
    }

    fn check(&self, row: usize, col: usize) -> Result<(), AssemblyError> {
        if row >= self.rows {
            return Err(AssemblyError::DofIndexOutOfBounds {
                index: row,
                size: self.rows,
            });
        }
        if col >= self.cols {
            return Err(AssemblyError::DofIndexOutOfBounds {
                index: col,
                size: self.cols,
            });
        }
        Ok(())
    }
}

impl<T: Scalar> GlobalMatrix<T> for MapMatrix<T> {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn get(&self, row: usize, col: usize) -> Result<T, AssemblyError> {
        self.check(row, col)?;
        Ok(self.entries.get(&(row, col)).copied().unwrap_or_else(T::zero))
    }

    fn set(&mut self, row: usize, col: usize, value: T) -> Result<(), AssemblyError> {
        self.check(row, col)?;
        self.entries.insert((row, col), value);
        Ok(())
    }

    fn add(&mut self, row: usize, col: usize, value: T) -> Result<(), AssemblyError> {
        self.check(row, col)?;
        *self.entries.entry((row, col)).or_insert_with(T::zero) += value;
        Ok(())
    }

    fn clear_row(&mut self, row: usize, diagonal: T) -> Result<(), AssemblyError> {
        self.check(row, 0)?;
        self.entries.retain(|&(r, _), _| r != row);
        if row < self.cols {
            self.entries.insert((row, row), diagonal);
        }
        Ok(())
    }
}
