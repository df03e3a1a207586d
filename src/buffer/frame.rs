//! Buffer frames and the key that names a cached page.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::{FrameId, PageNum, TableId};
use crate::storage::page::{Page, PageBuf};

/// Identity of a cached page across all open tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageKey {
    pub table: TableId,
    pub page: PageNum,
}

impl PageKey {
    pub fn new(table: TableId, page: PageNum) -> Self {
        Self { table, page }
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}:p{}", self.table, self.page)
    }
}

/// One slot of the pool.
///
/// The decoded page sits behind an `RwLock` that page guards hold for
/// their whole lifetime. Residency is a separate `Mutex` so the pool can
/// ask what a frame holds without touching the page lock. Pins and the
/// dirty bit are atomics because guards release them on drop without
/// taking any pool lock.
pub struct Frame {
    page: RwLock<Page>,
    resident: Mutex<Option<PageKey>>,
    pins: AtomicU32,
    dirty: AtomicBool,
}

impl Frame {
    pub fn new() -> Self {
        Self {
            page: RwLock::new(Page::default()),
            resident: Mutex::new(None),
            pins: AtomicU32::new(0),
            dirty: AtomicBool::new(false),
        }
    }

    /// Load `page` as `key` and pin it once for the caller.
    ///
    /// The frame must be empty.
    pub fn install(&self, key: PageKey, page: Page) {
        *self.page.write() = page;
        self.dirty.store(false, Ordering::Release);
        self.pins.store(1, Ordering::Release);
        *self.resident.lock() = Some(key);
    }

    /// Drop whatever the frame holds without writing it anywhere.
    pub fn clear(&self) {
        *self.page.write() = Page::default();
        *self.resident.lock() = None;
        self.pins.store(0, Ordering::Release);
        self.dirty.store(false, Ordering::Release);
    }

    #[inline]
    pub fn resident(&self) -> Option<PageKey> {
        *self.resident.lock()
    }

    #[inline]
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    #[inline]
    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    /// Encode the page for write-back. Blocks while a writer holds it.
    pub fn encode(&self) -> PageBuf {
        self.page.read().to_buf()
    }

    /// Content kind, or "locked" if a writer holds the page.
    pub fn kind_name(&self) -> &'static str {
        self.page.try_read().map_or("locked", |p| p.kind_name())
    }

    // ------------------------------------------------------------------
    // Pins
    // ------------------------------------------------------------------

    /// Add a pin; returns the new count.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.pins.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Drop a pin; returns the new count.
    ///
    /// # Panics
    /// On a frame with no pins, which means a guard was released twice.
    #[inline]
    pub fn unpin(&self) -> u32 {
        let before = self.pins.fetch_sub(1, Ordering::AcqRel);
        assert!(before > 0, "unpin of unpinned frame");
        before - 1
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pins.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    // ------------------------------------------------------------------
    // Dirty bit
    // ------------------------------------------------------------------

    #[inline]
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Clear the dirty bit, returning whether it was set.
    ///
    /// A writer that marks the frame after this call keeps it dirty, so
    /// take the bit before encoding the page.
    #[inline]
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    /// `frame_id` line for buffer dumps.
    pub fn describe(&self, frame_id: FrameId) -> String {
        match self.resident() {
            Some(key) => format!(
                "{frame_id} {key} pin={} dirty={} {}",
                self.pin_count(),
                self.is_dirty(),
                self.kind_name()
            ),
            None => format!("{frame_id} empty"),
        }
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}
