//! Process-wide convenience API.
//!
//! `BufferManager` is a perfectly ordinary, independently constructible
//! type; tests build their own instances to stay isolated under parallel
//! `cargo test`. This module layers a single shared instance per thread on
//! top of it, for callers who just want one pool for the life of the
//! process (a thin B+Tree or DB layer, a CLI, `main`).
//!
//! The pool lives in a `thread_local!`, not a process-wide `static`,
//! because this crate's concurrency model is single-threaded cooperative
//! use (see the buffer module docs) — there is no intent to share one pool
//! across OS threads, so a `Mutex`/`RwLock`-guarded global would buy
//! nothing but contention-free locking overhead.

use std::cell::RefCell;

use log::debug;

use crate::common::{Error, Result};
use crate::config::Settings;
use crate::storage::buffer::{BufferManager, Handle};
use crate::storage::file::{FileManager, PageNum, TableId};
use crate::storage::page::{PageField, PageType, RawPage};

thread_local! {
    static MANAGER: RefCell<Option<BufferManager>> = RefCell::new(None);
}

fn with_manager<R>(f: impl FnOnce(&BufferManager) -> Result<R>) -> Result<R> {
    MANAGER.with(|cell| match &*cell.borrow() {
        Some(manager) => f(manager),
        None => Err(Error::NotInitialized),
    })
}

/// Initializes the process-wide pool with room for `capacity` frames.
/// Calling this again replaces the previous pool without closing it first;
/// call [`shutdown`] beforehand if that matters.
pub fn init(capacity: usize) -> Result<()> {
    debug!("initializing process-wide buffer pool with capacity {}", capacity);
    MANAGER.with(|cell| {
        *cell.borrow_mut() = Some(BufferManager::new(capacity, FileManager::new()));
    });
    Ok(())
}

/// Initializes the process-wide pool using [`Settings::load`] for its
/// capacity.
pub fn init_from_settings() -> Result<()> {
    let settings = Settings::load()?;
    init(settings.buffer_pool_size)
}

/// Flushes and closes the process-wide pool, then drops it.
pub fn shutdown() -> Result<()> {
    debug!("shutting down process-wide buffer pool");
    let result = with_manager(|manager| manager.close_tables());
    MANAGER.with(|cell| *cell.borrow_mut() = None);
    result
}

pub fn open_table(path: &str) -> Result<TableId> {
    with_manager(|manager| manager.open_table(path))
}

pub fn get_block(table_id: TableId, page_num: PageNum) -> Result<Handle> {
    with_manager(|manager| manager.get_block(table_id, page_num))
}

pub fn get_new_block(table_id: TableId, page_type: PageType) -> Result<Handle> {
    with_manager(|manager| manager.get_new_block(table_id, page_type))
}

pub fn get_page(handle: &Handle) -> Result<RawPage> {
    with_manager(|manager| manager.get_page(handle))
}

pub fn write_page(handle: &Handle, image: &RawPage) -> Result<()> {
    with_manager(|manager| manager.write_page(handle, image))
}

pub fn read_field<T: PageField>(handle: &Handle, offset: usize) -> Result<T> {
    with_manager(|manager| manager.read_field(handle, offset))
}

pub fn write_field<T: PageField>(handle: &Handle, value: T, offset: usize) -> Result<()> {
    with_manager(|manager| manager.write_field(handle, value, offset))
}

pub fn set_delete_waited(handle: &Handle) -> Result<()> {
    with_manager(|manager| manager.set_delete_waited(handle))
}

pub fn free_page(table_id: TableId, page_num: PageNum) -> Result<()> {
    with_manager(|manager| manager.free_page(table_id, page_num))
}
