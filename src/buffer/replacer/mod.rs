//! Eviction policies (replacers).
//!
//! A replacer only tracks which frames are evictable and picks a victim
//! among them. Empty frames are handed out by the pool before the
//! replacer is consulted.
//!
//! - [`ScanReplacer`] - last evictable frame in frame-array order
//! - [`LruReplacer`] - least recently accessed evictable frame

mod lru;
mod scan;

pub use lru::LruReplacer;
pub use scan::ScanReplacer;

use crate::common::config::EvictionPolicy;
use crate::common::FrameId;

/// Victim selection for the buffer pool.
pub trait Replacer: Send {
    /// A frame was pinned (cache hit or fresh load).
    fn record_access(&mut self, frame_id: FrameId);

    /// Mark a frame as evictable (pin count reached 0) or not.
    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool);

    /// Pick a victim and stop tracking it. `None` if nothing is evictable.
    fn evict(&mut self) -> Option<FrameId>;

    /// Forget a frame whose page was dropped from the pool.
    fn remove(&mut self, frame_id: FrameId);

    /// Number of evictable frames.
    fn size(&self) -> usize;

    fn name(&self) -> &'static str;
}

/// Build the replacer for `policy` over `pool_size` frames.
pub fn new_replacer(policy: EvictionPolicy, pool_size: usize) -> Box<dyn Replacer> {
    match policy {
        EvictionPolicy::Scan => Box::new(ScanReplacer::new(pool_size)),
        EvictionPolicy::Lru => Box::new(LruReplacer::new(pool_size)),
    }
}
