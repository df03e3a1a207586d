//! RAII pins on buffered pages.
//!
//! A guard is a page lock plus a [`Pin`]. Fields drop in declaration
//! order, so the lock is released before the pin and a frame never
//! becomes evictable while a guard still holds its lock.

use std::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{FrameId, PageNum, TableId};
use crate::storage::page::Page;

use super::buffer_pool_manager::BufferPoolManager;
use super::frame::PageKey;

/// One pin on a frame, given back to the pool on drop.
pub(crate) struct Pin<'a> {
    bpm: &'a BufferPoolManager,
    frame_id: FrameId,
    key: PageKey,
    dirty: bool,
}

impl<'a> Pin<'a> {
    pub(crate) fn new(bpm: &'a BufferPoolManager, frame_id: FrameId, key: PageKey) -> Self {
        Self {
            bpm,
            frame_id,
            key,
            dirty: false,
        }
    }

    pub(crate) fn key(&self) -> PageKey {
        self.key
    }

    pub(crate) fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Consume the pin without unpinning. The pool is about to clear the
    /// frame itself.
    pub(crate) fn forget(self) {
        std::mem::forget(self);
    }
}

impl Drop for Pin<'_> {
    fn drop(&mut self) {
        self.bpm.unpin_page_internal(self.frame_id, self.dirty);
    }
}

/// Shared access to a cached page.
///
/// ```ignore
/// let guard = bpm.fetch_page_read(table, PageNum::HEADER)?;
/// let root = guard.as_header(PageNum::HEADER)?.root;
/// ```
pub struct PageReadGuard<'a> {
    lock: RwLockReadGuard<'a, Page>,
    pin: Pin<'a>,
}

impl<'a> PageReadGuard<'a> {
    pub(crate) fn new(pin: Pin<'a>, lock: RwLockReadGuard<'a, Page>) -> Self {
        Self { lock, pin }
    }

    pub fn table(&self) -> TableId {
        self.pin.key.table
    }

    pub fn page_num(&self) -> PageNum {
        self.pin.key.page
    }

    pub fn frame_id(&self) -> FrameId {
        self.pin.frame_id
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = Page;

    fn deref(&self) -> &Page {
        &self.lock
    }
}

/// Exclusive access to a cached page. The frame is marked dirty when the
/// guard drops.
pub struct PageWriteGuard<'a> {
    lock: RwLockWriteGuard<'a, Page>,
    pin: Pin<'a>,
}

impl<'a> PageWriteGuard<'a> {
    pub(crate) fn new(mut pin: Pin<'a>, lock: RwLockWriteGuard<'a, Page>) -> Self {
        pin.dirty = true;
        Self { lock, pin }
    }

    pub fn table(&self) -> TableId {
        self.pin.key.table
    }

    pub fn page_num(&self) -> PageNum {
        self.pin.key.page
    }

    pub fn frame_id(&self) -> FrameId {
        self.pin.frame_id
    }

    /// Release the page lock but keep the pin.
    pub(crate) fn into_pin(self) -> Pin<'a> {
        let Self { lock, pin } = self;
        drop(lock);
        pin
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = Page;

    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl DerefMut for PageWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut Page {
        &mut self.lock
    }
}
