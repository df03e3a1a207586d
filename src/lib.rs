//! pagekv - a disk-resident B+ tree key/value store.
//!
//! Each table is one file of 4KB pages holding a B+ tree from `i64` keys to
//! fixed 120-byte values. All tables share one fixed-size buffer pool.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           Database                              │
//! │        open/close tables, insert/find/update/delete, join       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Index Layer (index/)                        │   │
//! │  │   BPlusTree: search, split, merge, redistribute          │   │
//! │  │   LeafCursor: ordered scans over the leaf chain          │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Buffer Pool (buffer/)                       │   │
//! │  │   BufferPoolManager + Frame + page guards + Statistics   │   │
//! │  │   Eviction: Scan (default) | LRU                         │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Storage Layer (storage/)                    │   │
//! │  │   TableRegistry → DiskManager per file, free list        │   │
//! │  │   Page formats: header, free, leaf, internal             │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageNum, TableId, FrameId, Error, config)
//! - [`buffer`] - Buffer pool management and eviction policies
//! - [`storage`] - Table files, page allocation and page formats
//! - [`index`] - The B+ tree
//!
//! # Quick Start
//! ```no_run
//! use pagekv::{Config, Database};
//!
//! let mut db = Database::init(Config::builder().pool_size(128).build())?;
//! let table = db.open_table("users.db")?;
//!
//! db.insert(table, 7, b"alice")?;
//! db.insert(table, 9, b"bob")?;
//! for (key, value) in db.find_range(table, 0, 10)? {
//!     println!("{key}: {value}");
//! }
//! db.shutdown()?;
//! # Ok::<(), pagekv::Error>(())
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

mod db;

pub use db::Database;

pub use common::config::{Config, ConfigBuilder, EvictionPolicy, TreeOrder, PAGE_SIZE, VALUE_SIZE};
pub use common::{Error, FrameId, PageNum, Result, TableId};

pub use buffer::{BufferPoolManager, BufferPoolStats, StatsSnapshot};
pub use index::{BPlusTree, LeafCursor, TreeSummary};
pub use storage::page::{Key, Value};
pub use storage::{DiskManager, TableInfo};
