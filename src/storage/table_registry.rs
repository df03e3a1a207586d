//! Table registry - maps table ids to open table files.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::common::config::MAX_TABLES;
use crate::common::{Error, Result, TableId};
use crate::storage::DiskManager;

/// One registry slot. The path is remembered after close so that
/// reopening the same file hands back the same id.
struct TableEntry {
    path: PathBuf,
    disk: Option<DiskManager>,
}

/// Summary of a registry slot, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub id: TableId,
    pub path: PathBuf,
    pub open: bool,
    pub pages: u64,
}

/// Fixed set of [`MAX_TABLES`] slots.
pub struct TableRegistry {
    entries: Vec<Option<TableEntry>>,
    /// Handed to every [`DiskManager`] opened through the registry.
    verify_checksums: bool,
}

impl TableRegistry {
    pub fn new(verify_checksums: bool) -> Self {
        Self {
            entries: (0..MAX_TABLES).map(|_| None).collect(),
            verify_checksums,
        }
    }

    /// Open (or create) the file at `path` and return its id.
    ///
    /// A path seen before reuses its old slot; otherwise the lowest slot
    /// not currently open is taken, forgetting whatever path it held.
    ///
    /// # Errors
    /// - `Error::InvalidPath` for an empty path
    /// - `Error::TableAlreadyOpen` if the path is open under some id
    /// - `Error::TooManyTables` if every slot is taken
    pub fn open(&mut self, path: &Path) -> Result<(TableId, bool)> {
        if path.as_os_str().is_empty() {
            return Err(Error::InvalidPath(String::new()));
        }

        let slot = match self.slot_for_path(path) {
            Some(slot) => {
                if self.entries[slot].as_ref().is_some_and(|e| e.disk.is_some()) {
                    return Err(Error::TableAlreadyOpen(path.display().to_string()));
                }
                slot
            }
            None => self
                .entries
                .iter()
                .position(|e| e.as_ref().map_or(true, |e| e.disk.is_none()))
                .ok_or(Error::TooManyTables)?,
        };

        let (disk, existed) = DiskManager::open_or_create(path, self.verify_checksums)?;
        let id = TableId::from_slot(slot);
        info!(table = %id, path = %path.display(), existed, "opened table");

        self.entries[slot] = Some(TableEntry {
            path: path.to_path_buf(),
            disk: Some(disk),
        });
        Ok((id, existed))
    }

    /// Drop the file handle for `id`. The slot keeps its path.
    pub fn close(&mut self, id: TableId) -> Result<()> {
        let entry = self.entries[id.slot()]
            .as_mut()
            .filter(|e| e.disk.is_some())
            .ok_or(Error::TableNotOpen(id))?;
        entry.disk = None;
        info!(table = %id, path = %entry.path.display(), "closed table");
        Ok(())
    }

    pub fn is_open(&self, id: TableId) -> bool {
        self.entries[id.slot()]
            .as_ref()
            .is_some_and(|e| e.disk.is_some())
    }

    /// Disk manager of an open table.
    pub fn disk_mut(&mut self, id: TableId) -> Result<&mut DiskManager> {
        self.entries[id.slot()]
            .as_mut()
            .and_then(|e| e.disk.as_mut())
            .ok_or(Error::TableNotOpen(id))
    }

    /// Ids of all currently open tables.
    pub fn open_ids(&self) -> Vec<TableId> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.as_ref().is_some_and(|e| e.disk.is_some()))
            .map(|(slot, _)| TableId::from_slot(slot))
            .collect()
    }

    pub fn describe(&self) -> Vec<TableInfo> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(slot, e)| {
                e.as_ref().map(|e| TableInfo {
                    id: TableId::from_slot(slot),
                    path: e.path.clone(),
                    open: e.disk.is_some(),
                    pages: e.disk.as_ref().map_or(0, DiskManager::page_count),
                })
            })
            .collect()
    }

    fn slot_for_path(&self, path: &Path) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.as_ref().is_some_and(|e| e.path == path))
    }
}

impl Default for TableRegistry {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ids_start_at_one() {
        let dir = tempdir().unwrap();
        let mut registry = TableRegistry::new(true);

        let (a, existed) = registry.open(&dir.path().join("a.db")).unwrap();
        let (b, _) = registry.open(&dir.path().join("b.db")).unwrap();
        assert!(!existed);
        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 2);
        assert!(registry.is_open(a));
    }

    #[test]
    fn test_reopen_reuses_id() {
        let dir = tempdir().unwrap();
        let mut registry = TableRegistry::new(true);
        let path = dir.path().join("a.db");

        let (a, _) = registry.open(&path).unwrap();
        registry.open(&dir.path().join("b.db")).unwrap();
        registry.close(a).unwrap();
        assert!(!registry.is_open(a));

        let (again, existed) = registry.open(&path).unwrap();
        assert_eq!(again, a);
        assert!(existed);
    }

    #[test]
    fn test_open_twice_fails() {
        let dir = tempdir().unwrap();
        let mut registry = TableRegistry::new(true);
        let path = dir.path().join("a.db");

        registry.open(&path).unwrap();
        assert!(matches!(registry.open(&path), Err(Error::TableAlreadyOpen(_))));
    }

    #[test]
    fn test_too_many_tables() {
        let dir = tempdir().unwrap();
        let mut registry = TableRegistry::new(true);
        for i in 0..MAX_TABLES {
            registry.open(&dir.path().join(format!("{i}.db"))).unwrap();
        }
        assert!(matches!(
            registry.open(&dir.path().join("extra.db")),
            Err(Error::TooManyTables)
        ));
    }

    #[test]
    fn test_empty_path_rejected() {
        let mut registry = TableRegistry::new(true);
        assert!(matches!(registry.open(Path::new("")), Err(Error::InvalidPath(_))));
    }

    #[test]
    fn test_closed_table_has_no_disk() {
        let dir = tempdir().unwrap();
        let mut registry = TableRegistry::new(true);
        let (a, _) = registry.open(&dir.path().join("a.db")).unwrap();
        registry.close(a).unwrap();

        assert!(matches!(registry.disk_mut(a), Err(Error::TableNotOpen(_))));
        assert!(matches!(registry.close(a), Err(Error::TableNotOpen(_))));
        assert!(registry.open_ids().is_empty());
        assert_eq!(registry.describe().len(), 1);
    }

    #[test]
    fn test_closed_slot_is_recycled_for_new_path() {
        let dir = tempdir().unwrap();
        let mut registry = TableRegistry::new(true);
        let ids: Vec<TableId> = (0..MAX_TABLES)
            .map(|i| registry.open(&dir.path().join(format!("{i}.db"))).unwrap().0)
            .collect();

        registry.close(ids[3]).unwrap();
        let (id, _) = registry.open(&dir.path().join("new.db")).unwrap();
        assert_eq!(id, ids[3]);
    }
}
