//! Per-session queue store.
//!
//! Holds pending items, the current item, and the loop/shuffle flags. The
//! store itself is plain data; the owning controller serializes all mutation.

use std::collections::VecDeque;

use rand::Rng;

use playqueue_types::Item;

#[derive(Debug, Default)]
pub struct QueueStore {
    pending: VecDeque<Item>,
    current: Option<Item>,
    loop_current: bool,
    shuffle: bool,
}

impl QueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item and return its 1-based position in the pending queue.
    pub fn enqueue(&mut self, item: Item) -> usize {
        self.pending.push_back(item);
        self.pending.len()
    }

    /// Remove the next item to play.
    ///
    /// With shuffle enabled and at least two pending items a uniformly random
    /// index is taken; otherwise the head.
    pub fn take_next(&mut self) -> Option<Item> {
        self.take_next_with(&mut rand::rng())
    }

    /// Same as [`QueueStore::take_next`] with a caller-provided RNG.
    pub fn take_next_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Item> {
        if self.shuffle && self.pending.len() >= 2 {
            let index = rng.random_range(0..self.pending.len());
            return self.pending.remove(index);
        }
        self.pending.pop_front()
    }

    /// Drop every pending item and the current item.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.current = None;
    }

    /// Drop pending items only, returning how many were removed.
    pub fn clear_pending(&mut self) -> usize {
        let removed = self.pending.len();
        self.pending.clear();
        removed
    }

    pub fn set_loop(&mut self, enabled: bool) {
        self.loop_current = enabled;
    }

    pub fn set_shuffle(&mut self, enabled: bool) {
        self.shuffle = enabled;
    }

    pub fn loop_current(&self) -> bool {
        self.loop_current
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn current(&self) -> Option<&Item> {
        self.current.as_ref()
    }

    /// Install the item associated with the active attempt.
    pub(crate) fn set_current(&mut self, item: Item) {
        self.current = Some(item);
    }

    /// Release the current item, handing it back to the caller.
    pub(crate) fn take_current(&mut self) -> Option<Item> {
        self.current.take()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Snapshot of pending items in queue order.
    pub fn list_pending(&self) -> Vec<Item> {
        self.pending.iter().cloned().collect()
    }
}
