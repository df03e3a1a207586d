//! Scan replacement policy.
//!
//! The victim is the last evictable frame met while walking the frame
//! array from the front. Hits do not reorder anything, so this is not a
//! recency policy: under a steady workload it keeps recycling the
//! highest-numbered unpinned frame.

use crate::common::FrameId;

use super::Replacer;

pub struct ScanReplacer {
    /// Indexed by frame; true if occupied and unpinned.
    evictable: Vec<bool>,
    count: usize,
}

impl ScanReplacer {
    pub fn new(pool_size: usize) -> Self {
        Self {
            evictable: vec![false; pool_size],
            count: 0,
        }
    }
}

impl Replacer for ScanReplacer {
    fn record_access(&mut self, _frame_id: FrameId) {}

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
        let index = self.evictable.iter().rposition(|&e| e)?;
        self.evictable[index] = false;
        self.count -= 1;
        Some(FrameId::new(index))
    }

    fn remove(&mut self, frame_id: FrameId) {
        self.set_evictable(frame_id, false);
    }

    fn size(&self) -> usize {
        self.count
    }

    fn name(&self) -> &'static str {
        "scan"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_picks_last_evictable_frame() {
        let mut replacer = ScanReplacer::new(4);
        for i in 0..4 {
            replacer.set_evictable(FrameId::new(i), true);
        }
        replacer.set_evictable(FrameId::new(3), false);

        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.size(), 1);
    }

    #[test]
    fn test_access_does_not_reorder() {
        let mut replacer = ScanReplacer::new(3);
        replacer.set_evictable(FrameId::new(0), true);
        replacer.set_evictable(FrameId::new(2), true);
        replacer.record_access(FrameId::new(2));

        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
    }

    #[test]
    fn test_nothing_evictable() {
        let mut replacer = ScanReplacer::new(2);
        assert_eq!(replacer.evict(), None);

        replacer.set_evictable(FrameId::new(1), true);
        replacer.remove(FrameId::new(1));
        assert_eq!(replacer.evict(), None);
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_set_evictable_is_idempotent() {
        let mut replacer = ScanReplacer::new(2);
        replacer.set_evictable(FrameId::new(0), true);
        replacer.set_evictable(FrameId::new(0), true);
        assert_eq!(replacer.size(), 1);
    }
}
