//! Fixed-capacity list used for every per-table entry list.

use std::ops::{Deref, DerefMut};

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Returned by [`BoundedVec::try_push`] when the list is already full.
///
/// Carries the entry that did not fit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("capacity of {capacity} entries exceeded")]
pub struct CapacityExceeded<T> {
    capacity: usize,
    rejected: T,
}

impl<T> CapacityExceeded<T> {
    /// Capacity of the list that refused the entry.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Give back the entry that did not fit.
    pub fn into_inner(self) -> T {
        self.rejected
    }
}

/// An ordered list that never holds more than `N` entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedVec<T, const N: usize> {
    items: Vec<T>,
}

impl<T, const N: usize> BoundedVec<T, N> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Maximum number of entries.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Whether another push would fail.
    pub fn is_full(&self) -> bool {
        self.items.len() >= N
    }

    /// Append an entry, or hand it back if the list is full.
    pub fn try_push(&mut self, item: T) -> Result<(), CapacityExceeded<T>> {
        if self.is_full() {
            return Err(CapacityExceeded {
                capacity: N,
                rejected: item,
            });
        }
        self.items.push(item);
        Ok(())
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Borrow the entries as a slice.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T, const N: usize> Default for BoundedVec<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Deref for BoundedVec<T, N> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T, const N: usize> DerefMut for BoundedVec<T, N> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.items
    }
}

impl<'a, T, const N: usize> IntoIterator for &'a BoundedVec<T, N> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Serialize, const N: usize> Serialize for BoundedVec<T, N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.items.iter())
    }
}
