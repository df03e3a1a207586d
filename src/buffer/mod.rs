//! Buffer pool management.
//!
//! The buffer pool sits between the B+ tree and the table files. It owns a
//! fixed set of frames shared by every open table; all page access goes
//! through it.
//!
//! # Components
//! - [`BufferPoolManager`] - The page cache
//! - [`Frame`] - A slot holding one decoded page + metadata
//! - [`PageReadGuard`] / [`PageWriteGuard`] - RAII pins
//! - [`BufferPoolStats`] - Counters
//! - [`replacer`] - Eviction policies

mod buffer_pool_manager;
mod frame;
mod page_guard;
pub mod replacer;
mod stats;

pub use buffer_pool_manager::BufferPoolManager;
pub use frame::{Frame, PageKey};
pub use page_guard::{PageReadGuard, PageWriteGuard};
pub use stats::{BufferPoolStats, StatsSnapshot};
