//! Table identifier.

use std::fmt;

use crate::common::config::MAX_TABLES;
use crate::common::{Error, Result};

/// Handle for an open table, in `1..=MAX_TABLES`.
///
/// Ids are handed out by [`Database::open_table`](crate::Database::open_table).
/// Reopening a path that was closed earlier gives back the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(u32);

impl TableId {
    /// Validate a raw id coming from outside the engine (for example the shell).
    pub fn new(id: u32) -> Result<Self> {
        if id == 0 || id as usize > MAX_TABLES {
            return Err(Error::InvalidTableId(id));
        }
        Ok(TableId(id))
    }

    /// Id for registry slot `index` (0-based).
    pub(crate) fn from_slot(index: usize) -> Self {
        TableId(index as u32 + 1)
    }

    /// 0-based registry slot.
    #[inline]
    pub(crate) fn slot(self) -> usize {
        self.0 as usize - 1
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
