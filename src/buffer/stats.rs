//! Buffer pool counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the buffer pool.
///
/// Every counter is an independent `AtomicU64` updated with
/// `Ordering::Relaxed`; a snapshot taken while other threads are running
/// is not a consistent cut across counters.
///
/// # Example
/// ```
/// use pagekv::BufferPoolStats;
/// use std::sync::atomic::Ordering;
///
/// let stats = BufferPoolStats::new();
/// stats.cache_hits.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(stats.snapshot().cache_hits, 1);
/// ```
#[derive(Debug, Default)]
pub struct BufferPoolStats {
    /// Fetches served from a frame.
    pub cache_hits: AtomicU64,
    /// Fetches that had to go to disk.
    pub cache_misses: AtomicU64,
    /// Occupied frames reclaimed for another page.
    pub evictions: AtomicU64,
    pub pages_read: AtomicU64,
    pub pages_written: AtomicU64,
    /// Pages handed out by a table's allocator.
    pub allocations: AtomicU64,
    /// Pages returned to a table's free list.
    pub frees: AtomicU64,
}

impl BufferPoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of fetches that were hits, 0.0 when nothing was fetched.
    pub fn hit_rate(&self) -> f64 {
        self.snapshot().hit_rate()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            pages_read: self.pages_read.load(Ordering::Relaxed),
            pages_written: self.pages_written.load(Ordering::Relaxed),
            allocations: self.allocations.load(Ordering::Relaxed),
            frees: self.frees.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.cache_hits,
            &self.cache_misses,
            &self.evictions,
            &self.pages_read,
            &self.pages_written,
            &self.allocations,
            &self.frees,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Plain copy of [`BufferPoolStats`] for printing and comparing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    pub pages_read: u64,
    pub pages_written: u64,
    pub allocations: u64,
    pub frees: u64,
}

impl StatsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits: {}, misses: {}, evictions: {}, reads: {}, writes: {}, \
             allocs: {}, frees: {}, hit_rate: {:.2}%",
            self.cache_hits,
            self.cache_misses,
            self.evictions,
            self.pages_read,
            self.pages_written,
            self.allocations,
            self.frees,
            self.hit_rate() * 100.0
        )
    }
}
