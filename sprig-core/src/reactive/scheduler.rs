//! Dirty Queue
//!
//! The dirty queue collects the consumers that must run at the end of the
//! current tick. The host decides when a tick ends; the engine only offers
//! `mark_dirty` and `drain_dirty`.
//!
//! # Ordering
//!
//! 1. A consumer marked dirty several times in one tick is drained once.
//! 2. Draining yields consumers in ascending id order. Ids are handed out
//!    at construction, so this is registration order, and a parent render
//!    unit runs before the children it created.
//! 3. Removing a consumer (destruction) takes it out of the queue, so a
//!    destroyed consumer is never drained.

use std::collections::btree_set;
use std::collections::BTreeSet;

use super::consumer::ConsumerId;

#[derive(Debug, Default)]
pub(crate) struct DirtyQueue {
    pending: BTreeSet<ConsumerId>,
}

impl DirtyQueue {
    /// Queue a consumer. Returns false if it was already queued.
    pub(crate) fn mark(&mut self, id: ConsumerId) -> bool {
        self.pending.insert(id)
    }

    /// Remove a consumer from the queue.
    pub(crate) fn remove(&mut self, id: ConsumerId) -> bool {
        self.pending.remove(&id)
    }

    pub(crate) fn contains(&self, id: ConsumerId) -> bool {
        self.pending.contains(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    /// Take everything queued so far, leaving the queue empty.
    pub(crate) fn drain(&mut self) -> DrainDirty {
        DrainDirty {
            inner: std::mem::take(&mut self.pending).into_iter(),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Consumers drained from the dirty queue, in registration order.
#[derive(Debug)]
pub struct DrainDirty {
    inner: btree_set::IntoIter<ConsumerId>,
}

impl Iterator for DrainDirty {
    type Item = ConsumerId;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for DrainDirty {}

/// What a `Tracker::flush` did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Drain rounds until the queue stayed empty.
    pub rounds: usize,
    /// Consumers run across all rounds.
    pub runs: usize,
}
