//! Disk-resident B+ tree.
//!
//! Every node lives in its own page of the table file and is reached
//! through the buffer pool. [`BPlusTree`] is only a view of
//! `(pool, table, order)`: all state, including the root page number in
//! the header, stays on disk.
//!
//! # Structure
//! - Leaves hold up to `order.leaf - 1` records and are chained left to
//!   right through their `right` link.
//! - Internal nodes hold up to `order.internal - 1` separator keys. The
//!   child left of separator `k` holds keys `< k`, the child right of it
//!   keys `>= k`.
//! - Every non-root node keeps at least [`MIN_KEYS`] keys. A node that
//!   drops below merges with or borrows from a sibling.
//!
//! # Page access
//! Nodes are copied out of short-lived guards and written back through a
//! fresh write guard. No guard is held across a call that may fetch
//! another page, so a tree operation pins at most two frames at once.

mod cursor;
mod delete;
mod diagnostics;
mod insert;

pub use cursor::LeafCursor;
pub use diagnostics::TreeSummary;

use crate::buffer::BufferPoolManager;
use crate::common::config::TreeOrder;
use crate::common::{Error, PageNum, Result, TableId};
use crate::storage::page::{Key, NodePage, Page, Value};

/// Fewest keys a non-root node may hold before it is rebalanced.
pub const MIN_KEYS: usize = 1;

/// Split point for a full node: the larger half of `n` goes left.
pub(crate) fn cut(n: usize) -> usize {
    if n % 2 == 0 {
        n / 2
    } else {
        n / 2 + 1
    }
}

/// A B+ tree stored in one table.
pub struct BPlusTree<'a> {
    bpm: &'a BufferPoolManager,
    table: TableId,
    order: TreeOrder,
}

impl<'a> BPlusTree<'a> {
    pub fn new(bpm: &'a BufferPoolManager, table: TableId, order: TreeOrder) -> Self {
        Self { bpm, table, order }
    }

    pub fn table(&self) -> TableId {
        self.table
    }

    pub fn order(&self) -> TreeOrder {
        self.order
    }

    /// Most records a leaf may hold.
    #[inline]
    fn leaf_capacity(&self) -> usize {
        self.order.leaf - 1
    }

    /// Most keys an internal node may hold.
    #[inline]
    fn internal_capacity(&self) -> usize {
        self.order.internal - 1
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Whether the tree holds no records.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.root()?.is_none())
    }

    /// Leaf that holds `key` if it is present anywhere in the tree.
    ///
    /// Returns `None` for an empty tree without touching any node page.
    pub fn find_leaf(&self, key: Key) -> Result<Option<PageNum>> {
        let Some(mut page) = self.root()? else {
            return Ok(None);
        };
        loop {
            let guard = self.bpm.fetch_page_read(self.table, page)?;
            let node = guard.as_node(page)?;
            match node.as_internal() {
                Some(internal) => page = internal.route(key),
                None => return Ok(Some(page)),
            }
        }
    }

    pub fn find(&self, key: Key) -> Result<Option<Value>> {
        let Some(page) = self.find_leaf(key)? else {
            return Ok(None);
        };
        let guard = self.bpm.fetch_page_read(self.table, page)?;
        let leaf = guard.as_node(page)?.leaf(page)?;
        Ok(leaf.get(key).copied())
    }

    /// Records with `start <= key <= end`, ascending.
    pub fn find_range(&self, start: Key, end: Key) -> Result<Vec<(Key, Value)>> {
        if start > end {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for item in self.cursor_from(start)? {
            let (key, value) = item?;
            if key > end {
                break;
            }
            out.push((key, value));
        }
        Ok(out)
    }

    /// Cursor over every record with key `>= start`.
    pub fn cursor_from(&self, start: Key) -> Result<LeafCursor<'a>> {
        let leaf = self.find_leaf(start)?;
        LeafCursor::seek(self.bpm, self.table, leaf, start)
    }

    /// Cursor over every record in the tree.
    pub fn cursor(&self) -> Result<LeafCursor<'a>> {
        let leaf = self.leftmost_leaf()?;
        LeafCursor::seek(self.bpm, self.table, leaf, Key::MIN)
    }

    /// Overwrite the value stored under an existing key.
    ///
    /// # Errors
    /// `Error::KeyNotFound` if the key is absent.
    pub fn update(&self, key: Key, value: Value) -> Result<()> {
        let page = self.find_leaf(key)?.ok_or(Error::KeyNotFound(key))?;
        let mut guard = self.bpm.fetch_page_write(self.table, page)?;
        let leaf = guard.as_node_mut(page)?.leaf_mut(page)?;
        let index = leaf.search(key).map_err(|_| Error::KeyNotFound(key))?;
        leaf.records[index].value = value;
        Ok(())
    }

    // ========================================================================
    // Page helpers
    // ========================================================================

    pub(crate) fn root(&self) -> Result<Option<PageNum>> {
        let guard = self.bpm.fetch_page_read(self.table, PageNum::HEADER)?;
        Ok(guard.as_header(PageNum::HEADER)?.root)
    }

    fn set_root(&self, root: Option<PageNum>) -> Result<()> {
        let mut guard = self.bpm.fetch_page_write(self.table, PageNum::HEADER)?;
        guard.as_header_mut(PageNum::HEADER)?.root = root;
        Ok(())
    }

    fn leftmost_leaf(&self) -> Result<Option<PageNum>> {
        let Some(mut page) = self.root()? else {
            return Ok(None);
        };
        loop {
            let node = self.read_node(page)?;
            match node.as_internal() {
                Some(internal) => page = internal.first_child,
                None => return Ok(Some(page)),
            }
        }
    }

    /// Copy of the node stored at `page`.
    fn read_node(&self, page: PageNum) -> Result<NodePage> {
        let guard = self.bpm.fetch_page_read(self.table, page)?;
        Ok(guard.as_node(page)?.clone())
    }

    fn write_node(&self, page: PageNum, node: NodePage) -> Result<()> {
        let mut guard = self.bpm.fetch_page_write(self.table, page)?;
        *guard = Page::Node(node);
        Ok(())
    }

    /// Store `node` in a freshly allocated page.
    fn alloc_node(&self, node: NodePage) -> Result<PageNum> {
        let mut guard = self.bpm.allocate_page(self.table)?;
        *guard = Page::Node(node);
        Ok(guard.page_num())
    }

    fn free_node(&self, page: PageNum) -> Result<()> {
        let guard = self.bpm.fetch_page_write(self.table, page)?;
        self.bpm.free_page(guard)
    }

    fn set_parent(&self, page: PageNum, parent: Option<PageNum>) -> Result<()> {
        let mut guard = self.bpm.fetch_page_write(self.table, page)?;
        guard.as_node_mut(page)?.parent = parent;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use crate::common::config::EvictionPolicy;

    /// Pool with one open table, plus the tempdir keeping it alive.
    pub(crate) fn setup(pool_size: usize) -> (BufferPoolManager, TableId, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let bpm = BufferPoolManager::new(pool_size, EvictionPolicy::Scan, true).unwrap();
        let table = bpm.open_table(&dir.path().join("tree.db")).unwrap();
        (bpm, table, dir)
    }

    pub(crate) fn value(key: Key) -> Value {
        Value::new(format!("v{key}").as_bytes()).unwrap()
    }
}
