//! Error types for pagekv.

use thiserror::Error;

use crate::common::{PageNum, TableId};

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for storage, buffer pool and index operations.
#[derive(Debug, Error)]
pub enum Error {
    // -------------------------------------------------------------------------
    // I/O
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Join output error: {0}")]
    Csv(#[from] csv::Error),

    // -------------------------------------------------------------------------
    // Table registry
    // -------------------------------------------------------------------------
    #[error("Invalid table id: {0}")]
    InvalidTableId(u32),

    #[error("Table {0} is not open")]
    TableNotOpen(TableId),

    #[error("Table file {0} is already open")]
    TableAlreadyOpen(String),

    #[error("Too many open tables")]
    TooManyTables,

    #[error("Invalid path: {0:?}")]
    InvalidPath(String),

    // -------------------------------------------------------------------------
    // Records
    // -------------------------------------------------------------------------
    #[error("Key not found: {0}")]
    KeyNotFound(i64),

    #[error("Duplicate key: {0}")]
    DuplicateKey(i64),

    #[error("Value is {len} bytes, limit is {max}")]
    ValueTooLong { len: usize, max: usize },

    // -------------------------------------------------------------------------
    // Buffer pool
    // -------------------------------------------------------------------------
    #[error("No free frames available in buffer pool")]
    NoFreeFrames,

    #[error("Page {page} of table {table} is still pinned")]
    PagePinned { table: TableId, page: PageNum },

    // -------------------------------------------------------------------------
    // Storage
    // -------------------------------------------------------------------------
    #[error("Page {0} not found")]
    PageNotFound(PageNum),

    #[error("Page {0} cannot be allocated or freed")]
    InvalidPageNum(PageNum),

    #[error("Checksum mismatch on page {page}: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        page: PageNum,
        stored: u32,
        computed: u32,
    },

    #[error("Corrupted page {page}: {reason}")]
    Corrupted { page: PageNum, reason: String },

    #[error("Page {page} is not a {expected} page")]
    PageTypeMismatch {
        page: PageNum,
        expected: &'static str,
    },

    // -------------------------------------------------------------------------
    // Consistency
    // -------------------------------------------------------------------------
    #[error("Tree invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
