// In-memory sort buffer holding records that have not been spilled yet

use std::cmp::Ordering;

use rayon::prelude::*;

/// Below this many records a parallel sort is not worth the fork/join.
pub const PARALLEL_SORT_THRESHOLD: usize = 1 << 13;

/// Fixed-capacity record store. Slots emptied by [`Elements::get_and_clear`]
/// stay allocated until the next [`Elements::clear`].
pub struct Elements<T> {
    slots: Vec<Option<T>>,
    capacity: usize,
}

impl<T> Elements<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Callers check [`Elements::is_full`] first.
    pub fn add(&mut self, record: T) {
        debug_assert!(!self.is_full(), "add on a full buffer");
        self.slots.push(Some(record));
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn get_and_clear(&mut self, index: usize) -> Option<T> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Stable sort of the occupied slots. Cleared slots move to the end.
    pub fn sort<F>(&mut self, compare: F, parallel: bool)
    where
        T: Send,
        F: Fn(&T, &T) -> Ordering + Sync,
    {
        let by_slot = |a: &Option<T>, b: &Option<T>| match (a, b) {
            (Some(a), Some(b)) => compare(a, b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };

        if parallel && self.slots.len() > PARALLEL_SORT_THRESHOLD {
            self.slots.par_sort_by(by_slot);
        } else {
            self.slots.sort_by(by_slot);
        }
    }

    /// Remove every remaining record in slot order, keeping the allocation.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.slots.drain(..).flatten()
    }
}

impl<T> IntoIterator for Elements<T> {
    type Item = T;
    type IntoIter = std::iter::Flatten<std::vec::IntoIter<Option<T>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.into_iter().flatten()
    }
}
