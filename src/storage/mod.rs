//! Storage layer - table files, page I/O and page formats.
//!
//! - [`DiskManager`] - page I/O and free-list allocation for one file
//! - [`TableRegistry`] - table id to open file mapping
//! - [`page`] - page formats

mod disk_manager;
pub mod page;
mod table_registry;

pub use disk_manager::DiskManager;
pub use table_registry::{TableInfo, TableRegistry};
