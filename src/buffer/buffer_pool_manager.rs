//! Buffer Pool Manager - the page cache shared by every open table.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching keyed by `(table, page)`
//! - Pin-based reference counting through RAII guards
//! - Deferred write-back of dirty pages
//! - Page allocation and freeing on top of each table's free list

use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::atomic::Ordering;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::buffer::frame::PageKey;
use crate::buffer::page_guard::Pin;
use crate::buffer::replacer::{new_replacer, Replacer};
use crate::buffer::{BufferPoolStats, Frame, PageReadGuard, PageWriteGuard};
use crate::common::config::EvictionPolicy;
use crate::common::{Error, FrameId, PageNum, Result, TableId};
use crate::storage::page::{NodePage, Page};
use crate::storage::{TableInfo, TableRegistry};

/// Manages a fixed pool of frames caching pages of all open tables.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌──────────────┐  ┌───────────────────────────────────┐   │
/// │  │ page_table   │  │        frames: Vec<Frame>         │   │
/// │  │PageKey → Fid │─▶│  [Frame0] [Frame1] [Frame2] ...   │   │
/// │  └──────────────┘  └───────────────────────────────────┘   │
/// │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
/// │  │  free_list   │  │   replacer   │  │   tables     │      │
/// │  │lowest first  │  │dyn Replacer  │  │TableRegistry │      │
/// │  └──────────────┘  └──────────────┘  └──────────────┘      │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Locking
/// Lock order is `page_table`, then a frame's page lock, then `tables`.
/// A page fault holds the `page_table` write lock from lookup to insert,
/// so a page is never loaded into two frames.
///
/// A thread must not fetch a page it already holds a write guard on; the
/// frame lock is not reentrant.
pub struct BufferPoolManager {
    frames: Vec<Frame>,

    page_table: RwLock<HashMap<PageKey, FrameId>>,

    /// Empty frames; the lowest index is handed out first.
    free_list: Mutex<BTreeSet<FrameId>>,

    replacer: Mutex<Box<dyn Replacer>>,

    /// Open table files. All disk I/O goes through here.
    tables: Mutex<TableRegistry>,

    stats: BufferPoolStats,

    pool_size: usize,

    verify_checksums: bool,
}

impl BufferPoolManager {
    /// Create a pool of `pool_size` empty frames.
    ///
    /// # Errors
    /// Returns `Error::Config` if `pool_size` is 0.
    pub fn new(pool_size: usize, policy: EvictionPolicy, verify_checksums: bool) -> Result<Self> {
        if pool_size == 0 {
            return Err(Error::Config("pool_size must be greater than 0".to_string()));
        }

        Ok(Self {
            frames: (0..pool_size).map(|_| Frame::new()).collect(),
            page_table: RwLock::new(HashMap::new()),
            free_list: Mutex::new((0..pool_size).map(FrameId::new).collect()),
            replacer: Mutex::new(new_replacer(policy, pool_size)),
            tables: Mutex::new(TableRegistry::new(verify_checksums)),
            stats: BufferPoolStats::new(),
            pool_size,
            verify_checksums,
        })
    }

    // ========================================================================
    // Public API: Tables
    // ========================================================================

    /// Open or create the table file at `path`.
    pub fn open_table(&self, path: &Path) -> Result<TableId> {
        let (id, _existed) = self.tables.lock().open(path)?;
        Ok(id)
    }

    /// Flush and drop every cached page of `table`, then close its file.
    ///
    /// # Errors
    /// - `Error::TableNotOpen` if the table is not open
    /// - `Error::PagePinned` if one of its pages is still pinned
    pub fn close_table(&self, table: TableId) -> Result<()> {
        if !self.tables.lock().is_open(table) {
            return Err(Error::TableNotOpen(table));
        }

        let mut pt = self.page_table.write();
        let mut cached: Vec<(PageKey, FrameId)> = pt
            .iter()
            .filter(|(key, _)| key.table == table)
            .map(|(&key, &fid)| (key, fid))
            .collect();
        cached.sort();

        if let Some((key, _)) = cached.iter().find(|(_, fid)| self.frames[fid.0].is_pinned()) {
            return Err(Error::PagePinned {
                table,
                page: key.page,
            });
        }

        for (key, frame_id) in cached {
            self.flush_frame(frame_id, key)?;
            pt.remove(&key);
            self.release_frame(frame_id);
        }
        drop(pt);

        self.tables.lock().close(table)
    }

    pub fn is_table_open(&self, table: TableId) -> bool {
        self.tables.lock().is_open(table)
    }

    pub fn open_tables(&self) -> Vec<TableId> {
        self.tables.lock().open_ids()
    }

    pub fn describe_tables(&self) -> Vec<TableInfo> {
        self.tables.lock().describe()
    }

    // ========================================================================
    // Public API: Fetch pages
    // ========================================================================

    /// Fetch a page for reading (shared access).
    ///
    /// # Errors
    /// - `Error::TableNotOpen` if the table is not open
    /// - `Error::PageNotFound` if the page is past the end of the file
    /// - `Error::NoFreeFrames` if every frame is pinned
    /// - `Error::ChecksumMismatch` if the stored checksum is wrong
    pub fn fetch_page_read(&self, table: TableId, page: PageNum) -> Result<PageReadGuard<'_>> {
        let key = PageKey::new(table, page);
        let frame_id = self.fetch_page_internal(key)?;
        let pin = Pin::new(self, frame_id, key);

        Ok(PageReadGuard::new(pin, self.frames[frame_id.0].read()))
    }

    /// Fetch a page for writing (exclusive access).
    ///
    /// Same as `fetch_page_read`, but the frame is marked dirty when the
    /// guard drops.
    pub fn fetch_page_write(&self, table: TableId, page: PageNum) -> Result<PageWriteGuard<'_>> {
        let key = PageKey::new(table, page);
        let frame_id = self.fetch_page_internal(key)?;
        let pin = Pin::new(self, frame_id, key);

        Ok(PageWriteGuard::new(pin, self.frames[frame_id.0].write()))
    }

    // ========================================================================
    // Public API: Allocate and free pages
    // ========================================================================

    /// Allocate a page in `table` and return it pinned, holding a blank node.
    ///
    /// The header page is pinned only for the duration of the disk
    /// allocation and comes back dirty.
    pub fn allocate_page(&self, table: TableId) -> Result<PageWriteGuard<'_>> {
        let mut header_guard = self.fetch_page_write(table, PageNum::HEADER)?;
        let header = header_guard.as_header_mut(PageNum::HEADER)?;
        let page = self.tables.lock().disk_mut(table)?.alloc_page(header)?;
        drop(header_guard);
        self.stats.allocations.fetch_add(1, Ordering::Relaxed);

        let mut guard = self.fetch_page_write(table, page)?;
        *guard = Page::Node(NodePage::blank());
        Ok(guard)
    }

    /// Return the guarded page to its table's free list.
    ///
    /// The guard is consumed. The page is pushed onto the free list through
    /// the header first; only then is its frame emptied without write-back.
    /// If the push fails the page stays cached and untouched.
    ///
    /// # Errors
    /// - `Error::InvalidPageNum` for the header page
    /// - `Error::PagePinned` if another guard still holds the page
    pub fn free_page(&self, guard: PageWriteGuard<'_>) -> Result<()> {
        // Keep the pin so the frame cannot be evicted while the header is
        // fetched.
        let pin = guard.into_pin();
        let key = pin.key();
        let frame_id = pin.frame_id();

        if key.page.is_header() {
            return Err(Error::InvalidPageNum(key.page));
        }
        if self.frames[frame_id.0].pin_count() > 1 {
            return Err(Error::PagePinned {
                table: key.table,
                page: key.page,
            });
        }

        {
            let mut header_guard = self.fetch_page_write(key.table, PageNum::HEADER)?;
            let header = header_guard.as_header_mut(PageNum::HEADER)?;
            self.tables
                .lock()
                .disk_mut(key.table)?
                .free_page(header, key.page)?;
        }

        {
            let mut pt = self.page_table.write();
            pt.remove(&key);
            pin.forget();
            self.release_frame(frame_id);
        }
        self.stats.frees.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    // ========================================================================
    // Public API: Flush pages
    // ========================================================================

    /// Write a cached page to disk if it is dirty, pinned or not.
    pub fn flush_page(&self, table: TableId, page: PageNum) -> Result<()> {
        let key = PageKey::new(table, page);
        let frame_id = {
            let pt = self.page_table.read();
            match pt.get(&key) {
                Some(&fid) => fid,
                None => return Ok(()),
            }
        };

        self.flush_frame(frame_id, key)
    }

    /// Flush every dirty page of every open table.
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut pages: Vec<(PageKey, FrameId)> = {
            let pt = self.page_table.read();
            pt.iter().map(|(&key, &fid)| (key, fid)).collect()
        };
        pages.sort();

        for (key, frame_id) in pages {
            self.flush_frame(frame_id, key)?;
        }

        Ok(())
    }

    // ========================================================================
    // Public API: Stats and diagnostics
    // ========================================================================

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Number of pages currently cached.
    pub fn page_count(&self) -> usize {
        self.page_table.read().len()
    }

    /// Frame holding `(table, page)`, if cached.
    pub fn frame_of(&self, table: TableId, page: PageNum) -> Option<FrameId> {
        self.page_table
            .read()
            .get(&PageKey::new(table, page))
            .copied()
    }

    /// Pin count of `(table, page)`, if cached.
    pub fn pin_count(&self, table: TableId, page: PageNum) -> Option<u32> {
        self.frame_of(table, page)
            .map(|fid| self.frames[fid.0].pin_count())
    }

    pub fn policy_name(&self) -> &'static str {
        self.replacer.lock().name()
    }

    /// One line per frame: identity, pin count, dirty flag and content kind.
    pub fn describe_frames(&self) -> String {
        let mut out = String::new();
        for (i, frame) in self.frames.iter().enumerate() {
            let _ = writeln!(out, "{}", frame.describe(FrameId::new(i)));
        }
        out
    }

    // ========================================================================
    // Internal: Called by guards on drop
    // ========================================================================

    pub(crate) fn unpin_page_internal(&self, frame_id: FrameId, is_dirty: bool) {
        let frame = &self.frames[frame_id.0];

        if is_dirty {
            frame.mark_dirty();
        }

        if frame.unpin() == 0 {
            self.replacer.lock().set_evictable(frame_id, true);
        }
    }

    // ========================================================================
    // Internal: Core fetch logic
    // ========================================================================

    fn fetch_page_internal(&self, key: PageKey) -> Result<FrameId> {
        {
            let pt = self.page_table.read();
            if let Some(&frame_id) = pt.get(&key) {
                self.handle_cache_hit(frame_id);
                return Ok(frame_id);
            }
        }

        self.handle_cache_miss(key)
    }

    fn handle_cache_hit(&self, frame_id: FrameId) {
        self.frames[frame_id.0].pin();

        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    fn handle_cache_miss(&self, key: PageKey) -> Result<FrameId> {
        let mut pt = self.page_table.write();

        // Someone else may have loaded it while we waited for the lock.
        if let Some(&frame_id) = pt.get(&key) {
            self.handle_cache_hit(frame_id);
            return Ok(frame_id);
        }

        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);

        let frame_id = self.get_free_frame(&mut pt)?;
        let page = match self.load_page(key) {
            Ok(page) => page,
            Err(e) => {
                self.release_frame(frame_id);
                return Err(e);
            }
        };

        self.frames[frame_id.0].install(key, page);
        pt.insert(key, frame_id);

        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        Ok(frame_id)
    }

    fn load_page(&self, key: PageKey) -> Result<Page> {
        let buf = self.tables.lock().disk_mut(key.table)?.read_page(key.page)?;
        self.stats.pages_read.fetch_add(1, Ordering::Relaxed);

        if self.verify_checksums {
            if let Err(e) = buf.verify_checksum(key.page) {
                warn!(page = %key, error = %e, "rejecting page with bad checksum");
                return Err(e);
            }
        }
        Page::decode(key.page, &buf)
    }

    // ========================================================================
    // Internal: Frame allocation and eviction
    // ========================================================================

    /// Take the first empty frame, or evict a victim.
    fn get_free_frame(&self, pt: &mut HashMap<PageKey, FrameId>) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.lock().pop_first() {
            return Ok(frame_id);
        }

        self.evict_page(pt)
    }

    fn evict_page(&self, pt: &mut HashMap<PageKey, FrameId>) -> Result<FrameId> {
        let (frame_id, frame, remaining) = loop {
            let (frame_id, remaining) = {
                let mut replacer = self.replacer.lock();
                let frame_id = replacer.evict().ok_or(Error::NoFreeFrames)?;
                (frame_id, replacer.size())
            };
            let frame = &self.frames[frame_id.0];
            // An unpin racing with a hit can leave a pinned frame marked
            // evictable. Skip it; its next unpin re-registers it.
            if !frame.is_pinned() {
                break (frame_id, frame, remaining);
            }
        };

        if let Some(key) = frame.resident() {
            if let Err(e) = self.flush_frame(frame_id, key) {
                self.replacer.lock().set_evictable(frame_id, true);
                return Err(e);
            }
            pt.remove(&key);
            debug!(victim = %key, frame = %frame_id, remaining, "evicted page");
        }

        self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        frame.clear();
        Ok(frame_id)
    }

    /// Empty a frame that is no longer in the page table and make it
    /// available again.
    fn release_frame(&self, frame_id: FrameId) {
        self.frames[frame_id.0].clear();
        self.replacer.lock().remove(frame_id);
        self.free_list.lock().insert(frame_id);
    }

    fn flush_frame(&self, frame_id: FrameId, key: PageKey) -> Result<()> {
        let frame = &self.frames[frame_id.0];

        if frame.take_dirty() {
            let buf = frame.encode();
            let written = self
                .tables
                .lock()
                .disk_mut(key.table)
                .and_then(|disk| disk.write_page(key.page, &buf));
            if let Err(e) = written {
                frame.mark_dirty();
                return Err(e);
            }
            self.stats.pages_written.fetch_add(1, Ordering::Relaxed);
        }

        Ok(())
    }
}
