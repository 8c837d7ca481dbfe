//! This module defines [Column].

use std::{ops::Deref, sync::Arc};

/// Immutable, reference-counted sequence of values.
///
/// Cloning a column is cheap, which allows segments and nodes
/// to share their data across rule executions without copying.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column<T> {
    data: Arc<[T]>,
}

impl<T> Column<T> {
    /// Create a new [Column] from a vector of values.
    pub fn new(values: Vec<T>) -> Self {
        Self {
            data: Arc::from(values),
        }
    }

    /// Return the number of entries in this column.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Return `true` if the column has no entries.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Return the values of this column as a slice.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

impl<T: Clone> Column<T> {
    /// Create a column of the given length where every entry is `value`.
    pub fn constant(value: T, length: usize) -> Self {
        Self::new(vec![value; length])
    }

    /// Create a new column by picking the entries at the given positions.
    pub fn gather(&self, positions: &[usize]) -> Self {
        Self::new(
            positions
                .iter()
                .map(|&position| self.data[position].clone())
                .collect(),
        )
    }
}

impl<T: Ord> Column<T> {
    /// Return `true` if the values are in ascending order.
    pub fn is_sorted(&self) -> bool {
        self.data.windows(2).all(|pair| pair[0] <= pair[1])
    }
}

impl<T> Default for Column<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T> Deref for Column<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<T> From<Vec<T>> for Column<T> {
    fn from(values: Vec<T>) -> Self {
        Self::new(values)
    }
}

impl<T> FromIterator<T> for Column<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::Column;

    #[test]
    fn gather_and_sortedness() {
        let column = Column::new(vec![5u64, 1, 3, 3]);

        assert!(!column.is_sorted());
        assert_eq!(column.gather(&[1, 2, 3]).as_slice(), &[1, 3, 3]);
        assert!(column.gather(&[1, 2, 3]).is_sorted());
        assert_eq!(Column::constant(4u64, 3).as_slice(), &[4, 4, 4]);
    }

    #[test]
    fn clones_share_data() {
        let column = Column::new(vec![1u64, 2, 3]);
        let copy = column.clone();

        assert_eq!(column.as_slice().as_ptr(), copy.as_slice().as_ptr());
    }
}
