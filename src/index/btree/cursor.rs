//! Forward iteration over the leaf chain.

use crate::buffer::BufferPoolManager;
use crate::common::{PageNum, Result, TableId};
use crate::storage::page::{Key, LeafRecord, Value};

/// Iterator over leaf records in ascending key order.
///
/// The cursor copies one leaf at a time and follows `right` links. It
/// holds no pin between calls to `next`, so the tree must not be modified
/// while a cursor is in use.
pub struct LeafCursor<'a> {
    bpm: &'a BufferPoolManager,
    table: TableId,
    /// Records of the current leaf.
    records: Vec<LeafRecord>,
    index: usize,
    /// Leaf to load once `records` is exhausted.
    next_leaf: Option<PageNum>,
}

impl<'a> LeafCursor<'a> {
    /// Position at the first record `>= start`, beginning at `leaf`.
    ///
    /// If no record of `leaf` qualifies, the cursor starts at its right
    /// sibling.
    pub(crate) fn seek(
        bpm: &'a BufferPoolManager,
        table: TableId,
        leaf: Option<PageNum>,
        start: Key,
    ) -> Result<Self> {
        let mut cursor = Self {
            bpm,
            table,
            records: Vec::new(),
            index: 0,
            next_leaf: leaf,
        };
        if cursor.load_next()? {
            cursor.index = cursor.records.partition_point(|r| r.key < start);
        }
        Ok(cursor)
    }

    /// Load the leaf at `next_leaf`. Returns false at the end of the chain.
    fn load_next(&mut self) -> Result<bool> {
        let Some(page) = self.next_leaf else {
            return Ok(false);
        };
        let guard = self.bpm.fetch_page_read(self.table, page)?;
        let leaf = guard.as_node(page)?.leaf(page)?;
        self.records.clone_from(&leaf.records);
        self.next_leaf = leaf.right;
        self.index = 0;
        Ok(true)
    }
}

impl Iterator for LeafCursor<'_> {
    type Item = Result<(Key, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index >= self.records.len() {
            match self.load_next() {
                Ok(true) => {}
                Ok(false) => return None,
                Err(e) => {
                    self.next_leaf = None;
                    self.records.clear();
                    return Some(Err(e));
                }
            }
        }
        let record = self.records[self.index];
        self.index += 1;
        Some(Ok((record.key, record.value)))
    }
}
