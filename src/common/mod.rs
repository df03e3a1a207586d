//! Shared primitives used across the engine.
//!
//! - Format constants and the runtime [`Config`](config::Config)
//! - Error types
//! - Identifiers (PageNum, TableId, FrameId)

pub mod config;
pub mod error;
mod frame_id;
mod page_num;
mod table_id;

pub use error::{Error, Result};
pub use frame_id::FrameId;
pub use page_num::PageNum;
pub use table_id::TableId;
