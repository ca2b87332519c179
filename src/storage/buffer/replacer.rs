//! Approximate-LRU victim selection among evictable frames.
//!
//! Recency is tracked as a logical clock bumped on `record_release`, not on
//! access: the clock advances only when a frame's pin count returns to
//! zero, matching the replacement policy described for this pool (LRU over
//! release order, not touch order). The victim is the evictable frame with
//! the *largest* `last_used` tick, mirroring the original scan's running
//! comparison (`victim->last_used < it->last_used` keeps the maximum) —
//! this is a literal rule of the replacement policy, not a substitutable
//! implementation detail.

use std::collections::HashMap;

pub type FrameId = usize;

pub struct LruReplacer {
    clock: u64,
    last_used: HashMap<FrameId, u64>,
    evictable: HashMap<FrameId, bool>,
}

impl LruReplacer {
    pub fn new() -> Self {
        LruReplacer {
            clock: 0,
            last_used: HashMap::new(),
            evictable: HashMap::new(),
        }
    }

    /// Starts tracking a freshly occupied frame. Untracked frames are never
    /// returned by `victim`.
    pub fn track(&mut self, frame_id: FrameId) {
        self.last_used.insert(frame_id, 0);
        self.evictable.insert(frame_id, false);
    }

    /// Stops tracking a frame, e.g. because it was just evicted.
    pub fn remove(&mut self, frame_id: FrameId) {
        self.last_used.remove(&frame_id);
        self.evictable.remove(&frame_id);
    }

    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if let Some(slot) = self.evictable.get_mut(&frame_id) {
            *slot = evictable;
        }
    }

    /// Bumps the logical clock and records `frame_id` as most-recently
    /// released. Call this when a frame's pin count drops to zero.
    pub fn record_release(&mut self, frame_id: FrameId) {
        self.clock += 1;
        self.last_used.insert(frame_id, self.clock);
    }

    /// Returns the evictable frame with the largest `last_used` tick, if
    /// any. Ties (e.g. several frames never released since being tracked)
    /// break toward the smallest frame id.
    pub fn victim(&self) -> Option<FrameId> {
        let mut candidates: Vec<FrameId> = self
            .evictable
            .iter()
            .filter(|(_, &is_evictable)| is_evictable)
            .map(|(&frame_id, _)| frame_id)
            .collect();
        // Descending frame-id order so that `max_by_key`, which keeps the
        // *last* element seen on a tie, resolves ties toward the smallest
        // frame id.
        candidates.sort_unstable_by(|a, b| b.cmp(a));
        candidates.into_iter().max_by_key(|frame_id| self.last_used[frame_id])
    }
}

impl Default for LruReplacer {
    fn default() -> Self {
        Self::new()
    }
}
