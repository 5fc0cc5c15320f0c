// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The deduplicating min-queue of proxies awaiting an update.

use alloc::collections::BinaryHeap;
use core::cmp::Reverse;

use hashbrown::HashSet;

/// A set of tree indices popped in ascending order.
///
/// Because proxies are indexed in pre-order, ascending order visits every
/// parent before its descendants.
#[derive(Clone, Debug, Default)]
pub struct WidgetUpdateList {
    heap: BinaryHeap<Reverse<u32>>,
    members: HashSet<u32>,
}

impl WidgetUpdateList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `index`. Returns `false` (and does nothing) if it is already
    /// queued.
    pub fn push(&mut self, index: u32) -> bool {
        if !self.members.insert(index) {
            return false;
        }
        self.heap.push(Reverse(index));
        true
    }

    /// Removes and returns the smallest queued index.
    pub fn pop(&mut self) -> Option<u32> {
        let Reverse(index) = self.heap.pop()?;
        self.members.remove(&index);
        Some(index)
    }

    /// The smallest queued index.
    #[must_use]
    pub fn peek(&self) -> Option<u32> {
        self.heap.peek().map(|&Reverse(index)| index)
    }

    /// Whether `index` is queued.
    #[must_use]
    pub fn contains(&self, index: u32) -> bool {
        self.members.contains(&index)
    }

    /// Number of queued indices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drops every queued index.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.members.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_ascending_order() {
        let mut list = WidgetUpdateList::new();
        list.push(5);
        list.push(1);
        list.push(3);
        assert_eq!(list.peek(), Some(1));
        assert_eq!(list.pop(), Some(1));
        assert_eq!(list.pop(), Some(3));
        assert_eq!(list.pop(), Some(5));
        assert_eq!(list.pop(), None);
    }

    #[test]
    fn duplicate_push_is_a_no_op() {
        let mut list = WidgetUpdateList::new();
        assert!(list.push(4));
        assert!(!list.push(4));
        assert_eq!(list.len(), 1);
        assert!(list.contains(4));
        assert_eq!(list.pop(), Some(4));
        assert!(!list.contains(4));
        // Popped indices can be queued again.
        assert!(list.push(4));
    }

    #[test]
    fn clear_empties() {
        let mut list = WidgetUpdateList::new();
        list.push(2);
        list.push(9);
        list.clear();
        assert!(list.is_empty());
        assert!(!list.contains(2));
    }
}
