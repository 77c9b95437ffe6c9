//! Expiry queue shared by all keys of one cache
//!
//! A min-heap of `(deadline, slot, key)` records. The cache keeps at most
//! one record per live entry: touching an entry only moves the entry's own
//! deadline, and the sweeper re-queues a popped record when the entry turns
//! out to have been touched since. Records whose slot no longer matches the
//! stored entry belong to a removed or replaced entry and are dropped.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use tokio::time::Instant;

/// A pending expiration check
#[derive(Debug)]
pub(crate) struct Scheduled<K> {
    pub deadline: Instant,
    pub slot: u64,
    pub key: K,
}

impl<K> PartialEq for Scheduled<K> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.slot == other.slot
    }
}

impl<K> Eq for Scheduled<K> {}

impl<K> PartialOrd for Scheduled<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for Scheduled<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then_with(|| self.slot.cmp(&other.slot))
    }
}

/// Min-heap of expiration checks ordered by deadline
#[derive(Debug)]
pub(crate) struct ExpiryQueue<K> {
    heap: BinaryHeap<Reverse<Scheduled<K>>>,
}

impl<K> Default for ExpiryQueue<K> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }
}

impl<K> ExpiryQueue<K> {
    /// Queue a check for `key` at `deadline`
    pub fn schedule(&mut self, key: K, slot: u64, deadline: Instant) {
        self.heap.push(Reverse(Scheduled { deadline, slot, key }));
    }

    /// Earliest queued deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(s)| s.deadline)
    }

    /// Pop the earliest record if it is due at `now`
    pub fn pop_due(&mut self, now: Instant) -> Option<Scheduled<K>> {
        if self.next_deadline()? <= now {
            self.heap.pop().map(|Reverse(s)| s)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
