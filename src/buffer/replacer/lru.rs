//! LRU (Least Recently Used) replacement policy.

use crate::common::FrameId;

use super::Replacer;

/// Evicts the evictable frame with the oldest access tick.
pub struct LruReplacer {
    /// Last access tick per frame.
    last_access: Vec<u64>,
    evictable: Vec<bool>,
    tick: u64,
    count: usize,
}

impl LruReplacer {
    pub fn new(pool_size: usize) -> Self {
        Self {
            last_access: vec![0; pool_size],
            evictable: vec![false; pool_size],
            tick: 0,
            count: 0,
        }
    }
}

impl Replacer for LruReplacer {
    fn record_access(&mut self, frame_id: FrameId) {
        self.tick += 1;
        self.last_access[frame_id.index()] = self.tick;
    }

    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        let slot = &mut self.evictable[frame_id.index()];
        if *slot != evictable {
            *slot = evictable;
            if evictable {
                self.count += 1;
            } else {
                self.count -= 1;
            }
        }
    }

    fn evict(&mut self) -> Option<FrameId> {
        let index = (0..self.evictable.len())
            .filter(|&i| self.evictable[i])
            .min_by_key(|&i| self.last_access[i])?;
        self.evictable[index] = false;
        self.count -= 1;
        Some(FrameId::new(index))
    }

    fn remove(&mut self, frame_id: FrameId) {
        self.set_evictable(frame_id, false);
        self.last_access[frame_id.index()] = 0;
    }

    fn size(&self) -> usize {
        self.count
    }

    fn name(&self) -> &'static str {
        "lru"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_least_recent() {
        let mut replacer = LruReplacer::new(3);
        for i in 0..3 {
            replacer.record_access(FrameId::new(i));
            replacer.set_evictable(FrameId::new(i), true);
        }
        // touch frame 0 again
        replacer.record_access(FrameId::new(0));

        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_pinned_frames_skipped() {
        let mut replacer = LruReplacer::new(2);
        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));
        replacer.set_evictable(FrameId::new(1), true);

        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    }
}
