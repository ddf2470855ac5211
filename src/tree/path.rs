//! Paths addressing nodes inside a tree.

use std::fmt;

/// A path from a tree's root to one of its nodes, as a sequence of child
/// indices. The empty path addresses the root.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TreePath(Vec<usize>);

impl TreePath {
    /// The root path.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path from explicit child indices.
    pub fn from_indices(indices: impl Into<Vec<usize>>) -> Self {
        Self(indices.into())
    }

    /// Descend into child `index`.
    pub fn push(&mut self, index: usize) {
        self.0.push(index);
    }

    /// Ascend one level; no-op at the root.
    pub fn pop(&mut self) -> Option<usize> {
        self.0.pop()
    }

    /// The last child index, if any.
    pub fn back(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// Depth of the addressed node.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the root path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The child indices, root first.
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// A child path of `self`.
    pub fn child(&self, index: usize) -> Self {
        let mut p = self.clone();
        p.push(index);
        p
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        let mut first = true;
        for i in &self.0 {
            if !first {
                write!(f, "/")?;
            }
            write!(f, "{i}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_round_trip() {
        let mut p = TreePath::root();
        assert!(p.is_empty());
        p.push(0);
        p.push(2);
        assert_eq!(p.len(), 2);
        assert_eq!(p.back(), Some(2));
        assert_eq!(p.pop(), Some(2));
        assert_eq!(p.indices(), &[0]);
    }

    #[test]
    fn display_joins_with_slashes() {
        assert_eq!(TreePath::root().to_string(), "<root>");
        assert_eq!(TreePath::from_indices(vec![0, 2, 1]).to_string(), "0/2/1");
    }

    #[test]
    fn child_does_not_mutate_parent() {
        let p = TreePath::from_indices(vec![1]);
        let c = p.child(3);
        assert_eq!(p.len(), 1);
        assert_eq!(c.indices(), &[1, 3]);
    }
}
