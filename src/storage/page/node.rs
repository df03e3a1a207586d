//! B+ tree node pages.
//!
//! # Layout
//! ```text
//! 0        8         12        16                 120       128
//! ┌────────┬─────────┬─────────┬──────────────────┬─────────┬────────────────┐
//! │parent  │is_leaf  │num_key  │ reserved         │extra /  │ records        │
//! │        │         │         │ (checksum @116)  │right    │                │
//! └────────┴─────────┴─────────┴──────────────────┴─────────┴────────────────┘
//! ```
//! Leaf records are `key (8) + value (120)`, 31 per page. Internal records
//! are `key (8) + child (8)`, 248 per page. Both arrays end exactly at the
//! end of the page.

use std::borrow::Cow;
use std::fmt;

use crate::common::config::{INTERNAL_ORDER, LEAF_ORDER, NODE_HEADER_SIZE, VALUE_SIZE};
use crate::common::{Error, PageNum, Result};

use super::page_buf::PageBuf;

/// Record key.
pub type Key = i64;

/// Most records a leaf page can physically hold.
pub const LEAF_CAPACITY: usize = LEAF_ORDER - 1;

/// Most keys an internal page can physically hold.
pub const INTERNAL_CAPACITY: usize = INTERNAL_ORDER - 1;

const OFFSET_PARENT: usize = 0;
const OFFSET_IS_LEAF: usize = 8;
const OFFSET_NUM_KEY: usize = 12;
const OFFSET_LINK: usize = 120;
const LEAF_RECORD_SIZE: usize = 8 + VALUE_SIZE;
const INTERNAL_RECORD_SIZE: usize = 16;

// ============================================================================
// Value
// ============================================================================

/// Fixed 120-byte record payload, NUL-padded on disk.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Value([u8; VALUE_SIZE]);

impl Value {
    /// Build a value from at most [`VALUE_SIZE`] bytes.
    pub fn new(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > VALUE_SIZE {
            return Err(Error::ValueTooLong {
                len: bytes.len(),
                max: VALUE_SIZE,
            });
        }
        let mut data = [0u8; VALUE_SIZE];
        data[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(data))
    }

    fn from_raw(raw: &[u8]) -> Self {
        let mut data = [0u8; VALUE_SIZE];
        data.copy_from_slice(raw);
        Self(data)
    }

    /// Payload up to the first NUL byte.
    pub fn as_bytes(&self) -> &[u8] {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(VALUE_SIZE);
        &self.0[..end]
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }

    /// All 120 bytes, padding included.
    pub fn raw(&self) -> &[u8; VALUE_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({:?})", self.to_string_lossy())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafRecord {
    pub key: Key,
    pub value: Value,
}

/// Separator key plus the child holding keys `>= key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternalRecord {
    pub key: Key,
    pub child: PageNum,
}

// ============================================================================
// Node variants
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LeafNode {
    /// Sorted ascending, unique keys.
    pub records: Vec<LeafRecord>,
    /// Right sibling; `None` on the rightmost leaf.
    pub right: Option<PageNum>,
}

impl LeafNode {
    /// Index of `key`, or where it would be inserted.
    pub fn search(&self, key: Key) -> std::result::Result<usize, usize> {
        self.records.binary_search_by_key(&key, |r| r.key)
    }

    pub fn get(&self, key: Key) -> Option<&Value> {
        self.search(key).ok().map(|i| &self.records[i].value)
    }

    pub fn first_key(&self) -> Option<Key> {
        self.records.first().map(|r| r.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalNode {
    /// Child for keys below `records[0].key`.
    pub first_child: PageNum,
    pub records: Vec<InternalRecord>,
}

impl InternalNode {
    /// Child at pointer position `index`, where 0 is `first_child`.
    pub fn child_at(&self, index: usize) -> Option<PageNum> {
        if index == 0 {
            Some(self.first_child)
        } else {
            self.records.get(index - 1).map(|r| r.child)
        }
    }

    /// All `num_keys + 1` children, left to right.
    pub fn children(&self) -> impl Iterator<Item = PageNum> + '_ {
        std::iter::once(self.first_child).chain(self.records.iter().map(|r| r.child))
    }

    /// Pointer position of `child`, where 0 is `first_child`.
    pub fn child_index(&self, child: PageNum) -> Option<usize> {
        self.children().position(|c| c == child)
    }

    /// Child to descend into for `key`: the one left of the first key
    /// greater than `key`.
    pub fn route(&self, key: Key) -> PageNum {
        let index = self.records.partition_point(|r| r.key <= key);
        match index {
            0 => self.first_child,
            i => self.records[i - 1].child,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Leaf(LeafNode),
    Internal(InternalNode),
}

/// A decoded B+ tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePage {
    /// Parent node; `None` for the root.
    pub parent: Option<PageNum>,
    pub kind: NodeKind,
}

impl NodePage {
    /// What a freshly allocated page holds: no parent, no keys, no links.
    pub fn blank() -> Self {
        Self {
            parent: None,
            kind: NodeKind::Internal(InternalNode {
                first_child: PageNum::HEADER,
                records: Vec::new(),
            }),
        }
    }

    pub fn new_leaf(parent: Option<PageNum>, records: Vec<LeafRecord>, right: Option<PageNum>) -> Self {
        Self {
            parent,
            kind: NodeKind::Leaf(LeafNode { records, right }),
        }
    }

    pub fn new_internal(
        parent: Option<PageNum>,
        first_child: PageNum,
        records: Vec<InternalRecord>,
    ) -> Self {
        Self {
            parent,
            kind: NodeKind::Internal(InternalNode {
                first_child,
                records,
            }),
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    pub fn num_keys(&self) -> usize {
        match &self.kind {
            NodeKind::Leaf(leaf) => leaf.records.len(),
            NodeKind::Internal(internal) => internal.records.len(),
        }
    }

    pub fn keys(&self) -> Vec<Key> {
        match &self.kind {
            NodeKind::Leaf(leaf) => leaf.records.iter().map(|r| r.key).collect(),
            NodeKind::Internal(internal) => internal.records.iter().map(|r| r.key).collect(),
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match &self.kind {
            NodeKind::Leaf(leaf) => Some(leaf),
            NodeKind::Internal(_) => None,
        }
    }

    pub fn as_leaf_mut(&mut self) -> Option<&mut LeafNode> {
        match &mut self.kind {
            NodeKind::Leaf(leaf) => Some(leaf),
            NodeKind::Internal(_) => None,
        }
    }

    pub fn as_internal(&self) -> Option<&InternalNode> {
        match &self.kind {
            NodeKind::Internal(internal) => Some(internal),
            NodeKind::Leaf(_) => None,
        }
    }

    pub fn as_internal_mut(&mut self) -> Option<&mut InternalNode> {
        match &mut self.kind {
            NodeKind::Internal(internal) => Some(internal),
            NodeKind::Leaf(_) => None,
        }
    }

    /// Leaf view, or `PageTypeMismatch` naming `page`.
    pub fn leaf(&self, page: PageNum) -> Result<&LeafNode> {
        self.as_leaf().ok_or(Error::PageTypeMismatch {
            page,
            expected: "leaf",
        })
    }

    pub fn leaf_mut(&mut self, page: PageNum) -> Result<&mut LeafNode> {
        self.as_leaf_mut().ok_or(Error::PageTypeMismatch {
            page,
            expected: "leaf",
        })
    }

    /// Internal view, or `PageTypeMismatch` naming `page`.
    pub fn internal(&self, page: PageNum) -> Result<&InternalNode> {
        self.as_internal().ok_or(Error::PageTypeMismatch {
            page,
            expected: "internal",
        })
    }

    pub fn internal_mut(&mut self, page: PageNum) -> Result<&mut InternalNode> {
        self.as_internal_mut().ok_or(Error::PageTypeMismatch {
            page,
            expected: "internal",
        })
    }

    // ========================================================================
    // Wire format
    // ========================================================================

    pub fn decode(page: PageNum, buf: &PageBuf) -> Result<Self> {
        let parent = PageNum::from_link(buf.read_u64(OFFSET_PARENT));
        let is_leaf = buf.read_u32(OFFSET_IS_LEAF);
        let num_key = buf.read_u32(OFFSET_NUM_KEY) as usize;
        let link = buf.read_u64(OFFSET_LINK);

        let kind = match is_leaf {
            1 => {
                if num_key > LEAF_CAPACITY {
                    return Err(Error::Corrupted {
                        page,
                        reason: format!("leaf holds {num_key} keys, capacity {LEAF_CAPACITY}"),
                    });
                }
                let records = (0..num_key)
                    .map(|i| {
                        let at = NODE_HEADER_SIZE + i * LEAF_RECORD_SIZE;
                        LeafRecord {
                            key: buf.read_i64(at),
                            value: Value::from_raw(&buf.as_slice()[at + 8..at + LEAF_RECORD_SIZE]),
                        }
                    })
                    .collect();
                NodeKind::Leaf(LeafNode {
                    records,
                    right: PageNum::from_link(link),
                })
            }
            0 => {
                if num_key > INTERNAL_CAPACITY {
                    return Err(Error::Corrupted {
                        page,
                        reason: format!(
                            "internal node holds {num_key} keys, capacity {INTERNAL_CAPACITY}"
                        ),
                    });
                }
                let records = (0..num_key)
                    .map(|i| {
                        let at = NODE_HEADER_SIZE + i * INTERNAL_RECORD_SIZE;
                        InternalRecord {
                            key: buf.read_i64(at),
                            child: PageNum(buf.read_u64(at + 8)),
                        }
                    })
                    .collect();
                NodeKind::Internal(InternalNode {
                    first_child: PageNum(link),
                    records,
                })
            }
            other => {
                return Err(Error::Corrupted {
                    page,
                    reason: format!("is_leaf flag is {other}"),
                })
            }
        };

        Ok(Self { parent, kind })
    }

    /// Write this node into `buf`. The buffer is assumed zeroed.
    pub fn encode(&self, buf: &mut PageBuf) {
        buf.write_u64(OFFSET_PARENT, PageNum::to_link(self.parent));
        buf.write_u32(OFFSET_NUM_KEY, self.num_keys() as u32);

        match &self.kind {
            NodeKind::Leaf(leaf) => {
                buf.write_u32(OFFSET_IS_LEAF, 1);
                buf.write_u64(OFFSET_LINK, PageNum::to_link(leaf.right));
                for (i, record) in leaf.records.iter().enumerate() {
                    let at = NODE_HEADER_SIZE + i * LEAF_RECORD_SIZE;
                    buf.write_i64(at, record.key);
                    buf.as_mut_slice()[at + 8..at + LEAF_RECORD_SIZE]
                        .copy_from_slice(record.value.raw());
                }
            }
            NodeKind::Internal(internal) => {
                buf.write_u32(OFFSET_IS_LEAF, 0);
                buf.write_u64(OFFSET_LINK, internal.first_child.0);
                for (i, record) in internal.records.iter().enumerate() {
                    let at = NODE_HEADER_SIZE + i * INTERNAL_RECORD_SIZE;
                    buf.write_i64(at, record.key);
                    buf.write_u64(at + 8, record.child.0);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(s: &str) -> Value {
        Value::new(s.as_bytes()).unwrap()
    }

    fn full_leaf() -> NodePage {
        let records = (0..LEAF_CAPACITY as i64)
            .map(|k| LeafRecord {
                key: k * 10,
                value: value(&format!("v{k}")),
            })
            .collect();
        NodePage::new_leaf(Some(PageNum(9)), records, Some(PageNum(4)))
    }

    #[test]
    fn test_value_padding() {
        let v = value("hello");
        assert_eq!(v.as_bytes(), b"hello");
        assert_eq!(v.raw()[5], 0);
        assert_eq!(v.to_string(), "hello");
    }

    #[test]
    fn test_value_too_long() {
        let long = vec![b'x'; VALUE_SIZE + 1];
        assert!(matches!(
            Value::new(&long),
            Err(Error::ValueTooLong { len: 121, max: 120 })
        ));
        assert_eq!(Value::new(&long[..VALUE_SIZE]).unwrap().as_bytes().len(), VALUE_SIZE);
    }

    #[test]
    fn test_full_leaf_layout() {
        let node = full_leaf();
        let mut buf = PageBuf::new();
        node.encode(&mut buf);

        assert_eq!(buf.read_u64(0), 9);
        assert_eq!(buf.read_u32(8), 1);
        assert_eq!(buf.read_u32(12), LEAF_CAPACITY as u32);
        assert_eq!(buf.read_u64(120), 4);
        // last record ends at the last byte of the page
        assert_eq!(buf.read_i64(128 + 30 * 128), 300);
        assert_eq!(&buf.as_slice()[128 + 30 * 128 + 8..128 + 30 * 128 + 11], b"v30");

        assert_eq!(NodePage::decode(PageNum(2), &buf).unwrap(), node);
    }

    #[test]
    fn test_internal_layout() {
        let node = NodePage::new_internal(
            None,
            PageNum(1),
            vec![
                InternalRecord { key: 17, child: PageNum(2) },
                InternalRecord { key: 40, child: PageNum(5) },
            ],
        );
        let mut buf = PageBuf::new();
        node.encode(&mut buf);

        assert_eq!(buf.read_u64(0), 0);
        assert_eq!(buf.read_u32(8), 0);
        assert_eq!(buf.read_u32(12), 2);
        assert_eq!(buf.read_u64(120), 1);
        assert_eq!(buf.read_i64(128), 17);
        assert_eq!(buf.read_u64(136), 2);
        assert_eq!(NodePage::decode(PageNum(3), &buf).unwrap(), node);
    }

    #[test]
    fn test_blank_node_is_all_zero() {
        let mut buf = PageBuf::new();
        NodePage::blank().encode(&mut buf);
        assert!(buf.as_slice().iter().all(|&b| b == 0));
        assert_eq!(NodePage::decode(PageNum(1), &buf).unwrap(), NodePage::blank());
    }

    #[test]
    fn test_decode_rejects_bad_counts() {
        let mut buf = PageBuf::new();
        buf.write_u32(8, 1);
        buf.write_u32(12, 32);
        assert!(matches!(
            NodePage::decode(PageNum(1), &buf),
            Err(Error::Corrupted { .. })
        ));

        buf.write_u32(8, 7);
        buf.write_u32(12, 0);
        assert!(matches!(
            NodePage::decode(PageNum(1), &buf),
            Err(Error::Corrupted { .. })
        ));
    }

    #[test]
    fn test_internal_routing() {
        let node = InternalNode {
            first_child: PageNum(1),
            records: vec![
                InternalRecord { key: 10, child: PageNum(2) },
                InternalRecord { key: 20, child: PageNum(3) },
            ],
        };
        assert_eq!(node.route(-5), PageNum(1));
        assert_eq!(node.route(9), PageNum(1));
        assert_eq!(node.route(10), PageNum(2));
        assert_eq!(node.route(19), PageNum(2));
        assert_eq!(node.route(20), PageNum(3));
        assert_eq!(node.route(i64::MAX), PageNum(3));

        assert_eq!(node.child_index(PageNum(1)), Some(0));
        assert_eq!(node.child_index(PageNum(3)), Some(2));
        assert_eq!(node.child_index(PageNum(8)), None);
        assert_eq!(node.child_at(2), Some(PageNum(3)));
        assert_eq!(node.child_at(3), None);
    }

    #[test]
    fn test_leaf_search() {
        let node = full_leaf();
        let leaf = node.as_leaf().unwrap();
        assert_eq!(leaf.get(20).map(|v| v.to_string()), Some("v2".to_string()));
        assert!(leaf.get(21).is_none());
        assert_eq!(leaf.search(21), Err(3));
        assert_eq!(leaf.first_key(), Some(0));
    }
}
