//! Index structures built on top of the buffer pool.

pub mod btree;

pub use btree::{BPlusTree, LeafCursor, TreeSummary, MIN_KEYS};
