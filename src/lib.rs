//! A single-threaded buffer pool manager for a disk-backed key/value store.
//!
//! [`storage::buffer::BufferManager`] is the library's core type: an
//! instantiable, pin-counted cache of fixed-size page frames over a
//! [`storage::file::FileManager`]. [`global`] layers a process-wide
//! convenience API on top of one shared instance for callers (a future
//! B+Tree layer, a CLI) that just want a single pool for the life of the
//! process.

pub mod common;
pub mod config;
pub mod global;
pub mod storage;

pub use common::{Error, Result};
pub use storage::buffer::{BufferManager, Handle};
pub use storage::file::{FileManager, PageNum, TableId};
pub use storage::page::{PageField, PageType, RawPage};
