//! The database context: one buffer pool and up to ten open tables.

use std::cmp::Ordering as KeyOrdering;
use std::path::Path;

use tracing::{info, warn};

use crate::buffer::{BufferPoolManager, StatsSnapshot};
use crate::common::config::Config;
use crate::common::{Error, PageNum, Result, TableId};
use crate::index::{BPlusTree, TreeSummary};
use crate::storage::page::{Key, Value};
use crate::storage::TableInfo;

/// Entry point of the engine.
///
/// Owns the buffer pool, which in turn owns every open table file. Reads
/// take `&self`; anything that may restructure a tree takes `&mut self`.
///
/// # Example
/// ```no_run
/// use pagekv::{Config, Database};
///
/// let mut db = Database::init(Config::default())?;
/// let table = db.open_table("accounts.db")?;
/// db.insert(table, 42, b"forty-two")?;
/// assert_eq!(db.find(table, 42)?.unwrap().as_bytes(), b"forty-two");
/// db.shutdown()?;
/// # Ok::<(), pagekv::Error>(())
/// ```
pub struct Database {
    bpm: BufferPoolManager,
    config: Config,
    shut_down: bool,
}

impl Database {
    /// Build the buffer pool described by `config`.
    ///
    /// # Errors
    /// `Error::Config` if the configuration is invalid.
    pub fn init(config: Config) -> Result<Self> {
        config.validate()?;
        let bpm = BufferPoolManager::new(
            config.pool_size,
            config.eviction_policy,
            config.verify_checksums,
        )?;
        info!(
            pool_size = config.pool_size,
            policy = bpm.policy_name(),
            "database initialized"
        );
        Ok(Self {
            bpm,
            config,
            shut_down: false,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Underlying buffer pool, for diagnostics and tests.
    pub fn buffer_pool(&self) -> &BufferPoolManager {
        &self.bpm
    }

    // ========================================================================
    // Tables
    // ========================================================================

    /// Open the table file at `path`, creating it if missing.
    ///
    /// # Errors
    /// - `Error::InvalidPath` for an empty path
    /// - `Error::TableAlreadyOpen` if the path is open already
    /// - `Error::TooManyTables` if every table id is in use
    pub fn open_table(&mut self, path: impl AsRef<Path>) -> Result<TableId> {
        self.bpm.open_table(path.as_ref())
    }

    /// Flush and close a table. Its id stays reserved for the same path.
    pub fn close_table(&mut self, table: TableId) -> Result<()> {
        self.bpm.close_table(table)
    }

    pub fn describe_tables(&self) -> Vec<TableInfo> {
        self.bpm.describe_tables()
    }

    /// Close every open table and release the pool.
    pub fn shutdown(mut self) -> Result<()> {
        self.close_all()?;
        self.shut_down = true;
        info!("database shut down");
        Ok(())
    }

    fn close_all(&mut self) -> Result<()> {
        for table in self.bpm.open_tables() {
            self.bpm.close_table(table)?;
        }
        Ok(())
    }

    // ========================================================================
    // Records
    // ========================================================================

    /// Insert a record. Values longer than 120 bytes are rejected.
    pub fn insert(&mut self, table: TableId, key: Key, value: &[u8]) -> Result<()> {
        let value = Value::new(value)?;
        self.tree(table)?.insert(key, value)
    }

    pub fn find(&self, table: TableId, key: Key) -> Result<Option<Value>> {
        self.tree(table)?.find(key)
    }

    pub fn update(&mut self, table: TableId, key: Key, value: &[u8]) -> Result<()> {
        let value = Value::new(value)?;
        self.tree(table)?.update(key, value)
    }

    pub fn delete(&mut self, table: TableId, key: Key) -> Result<()> {
        self.tree(table)?.delete(key)
    }

    /// Records with `start <= key <= end` in ascending key order.
    pub fn find_range(&self, table: TableId, start: Key, end: Key) -> Result<Vec<(Key, Value)>> {
        self.tree(table)?.find_range(start, end)
    }

    /// Natural join of two tables on key, written to `out_path` as CSV
    /// rows of `key,left_value,key,right_value`.
    ///
    /// Both leaf chains are walked once, in step. Returns the number of
    /// rows written.
    pub fn join_tables(
        &self,
        left: TableId,
        right: TableId,
        out_path: impl AsRef<Path>,
    ) -> Result<usize> {
        let mut left_rows = self.tree(left)?.cursor()?;
        let mut right_rows = self.tree(right)?.cursor()?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(out_path.as_ref())?;

        let mut rows = 0;
        let mut l = left_rows.next().transpose()?;
        let mut r = right_rows.next().transpose()?;
        while let (Some((lkey, lval)), Some((rkey, rval))) = (l, r) {
            match lkey.cmp(&rkey) {
                KeyOrdering::Less => l = left_rows.next().transpose()?,
                KeyOrdering::Greater => r = right_rows.next().transpose()?,
                KeyOrdering::Equal => {
                    let key = lkey.to_string();
                    writer.write_record([
                        key.as_bytes(),
                        lval.as_bytes(),
                        key.as_bytes(),
                        rval.as_bytes(),
                    ])?;
                    rows += 1;
                    l = left_rows.next().transpose()?;
                    r = right_rows.next().transpose()?;
                }
            }
        }
        writer.flush()?;

        info!(left = %left, right = %right, rows, "joined tables");
        Ok(rows)
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Level-order dump of a table's tree.
    pub fn print_tree(&self, table: TableId) -> Result<String> {
        self.tree(table)?.render_tree()
    }

    /// Keys of every leaf of a table, left to right.
    pub fn print_leaves(&self, table: TableId) -> Result<String> {
        self.tree(table)?.render_leaves()
    }

    pub fn describe_page(&self, table: TableId, page: PageNum) -> Result<String> {
        self.tree(table)?.describe_page(page)
    }

    /// One line per buffer frame.
    pub fn describe_buffer(&self) -> String {
        self.bpm.describe_frames()
    }

    /// Check a table's tree for structural damage.
    pub fn verify(&self, table: TableId) -> Result<TreeSummary> {
        self.tree(table)?.verify()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.bpm.stats().snapshot()
    }

    fn tree(&self, table: TableId) -> Result<BPlusTree<'_>> {
        if !self.bpm.is_table_open(table) {
            return Err(Error::TableNotOpen(table));
        }
        Ok(BPlusTree::new(&self.bpm, table, self.config.order))
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if self.shut_down {
            return;
        }
        if let Err(e) = self.close_all() {
            warn!(error = %e, "failed to close tables on drop");
        }
    }
}
