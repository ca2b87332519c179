//! The buffer pool manager: the cache of fixed-size page frames sitting in
//! front of the file layer, with pin-counted frames and approximate-LRU
//! eviction.
//!
//! `BufferManager` is a thin `Rc<RefCell<Inner>>` handle so it can be
//! cloned freely within a single thread; `Inner` holds the actual frame
//! table and does the bookkeeping. There is no internal locking because
//! this pool is used cooperatively by one thread at a time.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, error, trace, warn};

use crate::common::{Error, Result};
use crate::storage::buffer::handle::Handle;
use crate::storage::buffer::replacer::{FrameId, LruReplacer};
use crate::storage::file::{FileManager, PageNum, TableId};
use crate::storage::page::{self, PageField, PageType, RawPage};

struct Frame {
    table_id: TableId,
    page_num: PageNum,
    image: RawPage,
    pin_count: u32,
    dirty: bool,
    delete_waiting: bool,
}

pub(crate) struct Inner {
    capacity: usize,
    frames: Vec<Option<Frame>>,
    page_table: HashMap<(TableId, PageNum), FrameId>,
    replacer: LruReplacer,
    file_manager: FileManager,
}

impl Inner {
    fn frame(&self, frame_id: FrameId) -> &Frame {
        self.frames[frame_id].as_ref().expect("frame slot must be occupied")
    }

    fn frame_mut(&mut self, frame_id: FrameId) -> &mut Frame {
        self.frames[frame_id].as_mut().expect("frame slot must be occupied")
    }

    fn lookup(&self, table_id: TableId, page_num: PageNum) -> Result<FrameId> {
        self.page_table
            .get(&(table_id, page_num))
            .copied()
            .ok_or(Error::PageNotFound(table_id, page_num))
    }

    /// Finds a frame slot for a new resident page: reuse an empty slot,
    /// grow the frame table while under capacity, or evict the current
    /// LRU victim. Returns `Error::NoSpace` if every frame is pinned.
    fn allocate_frame(&mut self) -> Result<FrameId> {
        if let Some(frame_id) = self.frames.iter().position(|slot| slot.is_none()) {
            return Ok(frame_id);
        }
        if self.frames.len() < self.capacity {
            self.frames.push(None);
            return Ok(self.frames.len() - 1);
        }
        let victim = self.replacer.victim().ok_or_else(|| {
            warn!("buffer pool exhausted: all {} frames are pinned", self.capacity);
            Error::NoSpace
        })?;
        self.evict(victim)?;
        Ok(victim)
    }

    fn evict(&mut self, frame_id: FrameId) -> Result<()> {
        let frame = self.frames[frame_id].take().expect("victim frame must be resident");
        self.page_table.remove(&(frame.table_id, frame.page_num));
        self.replacer.remove(frame_id);
        if frame.dirty {
            trace!(
                "writing back dirty page table={} page={} on eviction",
                frame.table_id, frame.page_num
            );
            self.file_manager.write_page(frame.table_id, frame.page_num, &frame.image).map_err(|err| {
                error!("writeback failed for table={} page={}: {}", frame.table_id, frame.page_num, err);
                err
            })?;
        }
        Ok(())
    }

    fn pin_block(&mut self, table_id: TableId, page_num: PageNum) -> Result<()> {
        if let Some(&frame_id) = self.page_table.get(&(table_id, page_num)) {
            self.frame_mut(frame_id).pin_count += 1;
            self.replacer.set_evictable(frame_id, false);
            return Ok(());
        }

        let frame_id = self.allocate_frame()?;
        let mut image = page::zeroed();
        self.file_manager.read_page(table_id, page_num, &mut image).map_err(|err| {
            error!("read failed for table={} page={}: {}", table_id, page_num, err);
            err
        })?;
        self.frames[frame_id] = Some(Frame {
            table_id,
            page_num,
            image,
            pin_count: 1,
            dirty: false,
            delete_waiting: false,
        });
        self.page_table.insert((table_id, page_num), frame_id);
        self.replacer.track(frame_id);
        self.replacer.set_evictable(frame_id, false);
        debug!("fetched table={} page={} into frame={}", table_id, page_num, frame_id);
        Ok(())
    }

    fn pin_new_block(&mut self, table_id: TableId, page_type: PageType) -> Result<PageNum> {
        // Confirm a frame slot is available before touching the file layer:
        // if `alloc_page` ran first and `allocate_frame` then failed with
        // `NoSpace`, the already-allocated disk page would never be stored
        // or freed, permanently inflating the table's page count.
        let frame_id = self.allocate_frame()?;
        let page_num = self.file_manager.alloc_page(table_id)?;
        self.frames[frame_id] = Some(Frame {
            table_id,
            page_num,
            image: page_type.init_image(),
            pin_count: 1,
            dirty: true,
            delete_waiting: false,
        });
        self.page_table.insert((table_id, page_num), frame_id);
        self.replacer.track(frame_id);
        self.replacer.set_evictable(frame_id, false);
        debug!("allocated table={} page={} into frame={}", table_id, page_num, frame_id);
        Ok(page_num)
    }

    fn pin(&mut self, table_id: TableId, page_num: PageNum) -> Result<()> {
        let frame_id = self.lookup(table_id, page_num)?;
        self.frame_mut(frame_id).pin_count += 1;
        self.replacer.set_evictable(frame_id, false);
        Ok(())
    }

    fn unpin(&mut self, table_id: TableId, page_num: PageNum) {
        let frame_id = match self.page_table.get(&(table_id, page_num)) {
            Some(&frame_id) => frame_id,
            None => {
                warn!("unpin of non-resident table={} page={} ignored", table_id, page_num);
                return;
            }
        };

        let frame = self.frame_mut(frame_id);
        frame.pin_count = frame.pin_count.saturating_sub(1);
        // The tick advances on every release, not just the one that drops
        // the pin count to zero; a still-pinned frame is never evictable
        // regardless, so this only affects the tick it carries once it is.
        self.replacer.record_release(frame_id);
        if frame.pin_count != 0 {
            return;
        }

        self.replacer.set_evictable(frame_id, true);
        if self.frame(frame_id).delete_waiting {
            // Drop the write-back: a frame marked for deletion must not
            // resurrect its page on disk.
            let frame = self.frames[frame_id].take().expect("frame must be resident");
            self.page_table.remove(&(frame.table_id, frame.page_num));
            self.replacer.remove(frame_id);
            if let Err(err) = self.file_manager.free_page(frame.table_id, frame.page_num) {
                warn!(
                    "failed to free table={} page={} after last unpin: {}",
                    frame.table_id, frame.page_num, err
                );
            }
        }
    }

    fn mark_delete_waiting(&mut self, table_id: TableId, page_num: PageNum) -> Result<()> {
        let frame_id = self.lookup(table_id, page_num)?;
        self.frame_mut(frame_id).delete_waiting = true;
        Ok(())
    }

    /// Frees `(table_id, page_num)` unconditionally, pin-oblivious: a
    /// caller invoking this directly (rather than through
    /// `set_delete_waited`) is trusted to know the page has no live
    /// readers. If a frame happens to be resident, its identity is
    /// invalidated immediately regardless of its pin count.
    fn free_page(&mut self, table_id: TableId, page_num: PageNum) -> Result<()> {
        if let Some(&frame_id) = self.page_table.get(&(table_id, page_num)) {
            let frame = self.frames[frame_id].take().expect("frame must be resident");
            self.page_table.remove(&(frame.table_id, frame.page_num));
            self.replacer.remove(frame_id);
            return self.file_manager.free_page(table_id, page_num);
        }
        self.file_manager.free_page(table_id, page_num)
    }

    fn read_image(&self, table_id: TableId, page_num: PageNum) -> Result<RawPage> {
        let frame_id = self.lookup(table_id, page_num)?;
        Ok(self.frame(frame_id).image)
    }

    fn write_image(&mut self, table_id: TableId, page_num: PageNum, image: &RawPage) -> Result<()> {
        let frame_id = self.lookup(table_id, page_num)?;
        let frame = self.frame_mut(frame_id);
        frame.image = *image;
        frame.dirty = true;
        Ok(())
    }

    fn read_field<T: PageField>(&self, table_id: TableId, page_num: PageNum, offset: usize) -> Result<T> {
        let frame_id = self.lookup(table_id, page_num)?;
        Ok(T::read_at(&self.frame(frame_id).image, offset))
    }

    fn write_field<T: PageField>(
        &mut self,
        table_id: TableId,
        page_num: PageNum,
        value: T,
        offset: usize,
    ) -> Result<()> {
        let frame_id = self.lookup(table_id, page_num)?;
        let frame = self.frame_mut(frame_id);
        value.write_at(&mut frame.image, offset);
        frame.dirty = true;
        Ok(())
    }

    fn clear_pages(&mut self) -> Result<()> {
        for slot in self.frames.iter_mut() {
            if let Some(frame) = slot {
                if frame.dirty {
                    self.file_manager.write_page(frame.table_id, frame.page_num, &frame.image).map_err(|err| {
                        error!("flush failed for table={} page={}: {}", frame.table_id, frame.page_num, err);
                        err
                    })?;
                    frame.dirty = false;
                }
            }
        }
        Ok(())
    }

    fn close_tables(&mut self) -> Result<()> {
        self.clear_pages()?;
        self.frames.clear();
        self.page_table.clear();
        self.replacer = LruReplacer::new();
        self.file_manager.close_table_files()
    }
}

impl Drop for Inner {
    /// Flushes every dirty resident frame as a last-resort safety net for
    /// callers that let the pool go out of scope without calling
    /// `close_tables`/`global::shutdown` first. Errors can't propagate out
    /// of `Drop`, so a failed writeback is only logged, not surfaced.
    fn drop(&mut self) {
        if let Err(err) = self.clear_pages() {
            error!("flush on buffer pool teardown failed: {}", err);
        }
    }
}

/// A single-threaded, pin-counted cache of fixed-size page frames backed by
/// a `FileManager`. Cloning a `BufferManager` shares the same underlying
/// pool (it is a handle, like `Rc`), which is how the process-wide
/// convenience API in [`crate::global`] is built on top of an ordinary
/// instance.
#[derive(Clone)]
pub struct BufferManager {
    inner: Rc<RefCell<Inner>>,
}

impl BufferManager {
    /// Creates a pool that caches at most `capacity` pages at a time.
    pub fn new(capacity: usize, file_manager: FileManager) -> Self {
        BufferManager {
            inner: Rc::new(RefCell::new(Inner {
                capacity,
                frames: Vec::with_capacity(capacity),
                page_table: HashMap::new(),
                replacer: LruReplacer::new(),
                file_manager,
            })),
        }
    }

    pub fn open_table(&self, path: &str) -> Result<TableId> {
        self.inner.borrow_mut().file_manager.open_table_file(path)
    }

    /// Pins the given page, fetching it from disk if it is not already
    /// resident. Returns `Error::NoSpace` if every frame is pinned.
    pub fn get_block(&self, table_id: TableId, page_num: PageNum) -> Result<Handle> {
        self.inner.borrow_mut().pin_block(table_id, page_num)?;
        Ok(Handle::new(&self.inner, table_id, page_num))
    }

    /// Allocates a new page on disk and pins it as a dirty frame, its image
    /// initialized per `page_type`.
    pub fn get_new_block(&self, table_id: TableId, page_type: PageType) -> Result<Handle> {
        let page_num = self.inner.borrow_mut().pin_new_block(table_id, page_type)?;
        Ok(Handle::new(&self.inner, table_id, page_num))
    }

    /// Returns a copy of the page image currently cached for `handle`.
    pub fn get_page(&self, handle: &Handle) -> Result<RawPage> {
        self.inner.borrow().read_image(handle.table_id(), handle.page_num())
    }

    /// Overwrites the cached image for `handle` and marks it dirty.
    pub fn write_page(&self, handle: &Handle, image: &RawPage) -> Result<()> {
        self.inner
            .borrow_mut()
            .write_image(handle.table_id(), handle.page_num(), image)
    }

    pub fn read_field<T: PageField>(&self, handle: &Handle, offset: usize) -> Result<T> {
        self.inner.borrow().read_field(handle.table_id(), handle.page_num(), offset)
    }

    pub fn write_field<T: PageField>(&self, handle: &Handle, value: T, offset: usize) -> Result<()> {
        self.inner
            .borrow_mut()
            .write_field(handle.table_id(), handle.page_num(), value, offset)
    }

    /// Marks `handle`'s page to be freed once its pin count reaches zero.
    /// If it is already unpinned, frees it immediately.
    pub fn set_delete_waited(&self, handle: &Handle) -> Result<()> {
        self.inner
            .borrow_mut()
            .mark_delete_waiting(handle.table_id(), handle.page_num())
    }

    /// Frees `(table_id, page_num)` directly and unconditionally —
    /// pin-oblivious, like the file layer's own `free_page`. Callers are
    /// responsible for only invoking this on a page with no live readers;
    /// to free a page while still holding a handle to it, use
    /// [`BufferManager::set_delete_waited`] instead.
    pub fn free_page(&self, table_id: TableId, page_num: PageNum) -> Result<()> {
        self.inner.borrow_mut().free_page(table_id, page_num)
    }

    /// Flushes every dirty resident frame to disk without evicting any of
    /// them.
    pub fn clear_pages(&self) -> Result<()> {
        self.inner.borrow_mut().clear_pages()
    }

    /// Flushes all dirty frames and closes every open table file. The pool
    /// is empty and its tables are closed afterward.
    pub fn close_tables(&self) -> Result<()> {
        self.inner.borrow_mut().close_tables()
    }

    pub(crate) fn pin_raw(inner: &Rc<RefCell<Inner>>, table_id: TableId, page_num: PageNum) -> Result<()> {
        inner.borrow_mut().pin(table_id, page_num)
    }

    pub(crate) fn unpin_raw(inner: &Rc<RefCell<Inner>>, table_id: TableId, page_num: PageNum) {
        inner.borrow_mut().unpin(table_id, page_num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn manager(capacity: usize) -> (BufferManager, TableId, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let bm = BufferManager::new(capacity, FileManager::new());
        let table_id = bm.open_table(dir.path().join("t.db").to_str().unwrap()).unwrap();
        (bm, table_id, dir)
    }

    #[test]
    fn get_block_is_a_cache_hit_on_second_fetch() {
        let (bm, table_id, _dir) = manager(4);
        let h1 = bm.get_new_block(table_id, PageType::Leaf).unwrap();
        let page_num = h1.page_num();
        drop(h1);

        let h2 = bm.get_block(table_id, page_num).unwrap();
        bm.write_field(&h2, 99u64, 100).unwrap();
        drop(h2);

        let h3 = bm.get_block(table_id, page_num).unwrap();
        let value: u64 = bm.read_field(&h3, 100).unwrap();
        assert_eq!(value, 99);
    }

    #[test]
    fn eviction_picks_the_frame_with_the_largest_last_used_tick() {
        let (bm, table_id, _dir) = manager(2);
        let h0 = bm.get_new_block(table_id, PageType::Leaf).unwrap();
        let p0 = h0.page_num();
        drop(h0);
        let h1 = bm.get_new_block(table_id, PageType::Leaf).unwrap();
        let p1 = h1.page_num();
        drop(h1);

        // p1 was released after p0, so it carries the larger `last_used`
        // tick and is the one the replacer evicts. Checking `get_block`'s
        // success alone can't distinguish a hit from a miss (both return
        // `Ok`), so inspect the resident page-table directly instead.
        let h2 = bm.get_new_block(table_id, PageType::Leaf).unwrap();
        let p2 = h2.page_num();

        let inner = bm.inner.borrow();
        assert!(inner.page_table.contains_key(&(table_id, p0)), "p0 should remain resident");
        assert!(!inner.page_table.contains_key(&(table_id, p1)), "p1 should have been evicted");
        assert!(inner.page_table.contains_key(&(table_id, p2)), "p2 should be resident after allocation");
        drop(inner);

        drop(h2);
    }

    #[test]
    fn pinned_frames_are_never_evicted() {
        let (bm, table_id, _dir) = manager(1);
        let _held = bm.get_new_block(table_id, PageType::Leaf).unwrap();
        let err = bm.get_new_block(table_id, PageType::Leaf).unwrap_err();
        assert!(matches!(err, Error::NoSpace));
    }

    #[test]
    fn delete_waiting_page_is_freed_on_last_unpin() {
        let (bm, table_id, _dir) = manager(4);
        let handle = bm.get_new_block(table_id, PageType::Leaf).unwrap();
        let page_num = handle.page_num();
        bm.set_delete_waited(&handle).unwrap();
        drop(handle);

        // The frame is gone; fetching it again would re-read stale disk
        // bytes rather than hit the old cached identity.
        let reopened = bm.get_block(table_id, page_num);
        assert!(reopened.is_ok());
    }

    #[test]
    fn dirty_frame_is_written_back_on_eviction() {
        let (bm, table_id, _dir) = manager(1);
        let h0 = bm.get_new_block(table_id, PageType::Leaf).unwrap();
        let p0 = h0.page_num();
        bm.write_field(&h0, 7u64, 50).unwrap();
        drop(h0);

        // Force eviction of p0's frame by pulling in a second page.
        let h1 = bm.get_new_block(table_id, PageType::Leaf).unwrap();
        drop(h1);

        let reopened = bm.get_block(table_id, p0).unwrap();
        let value: u64 = bm.read_field(&reopened, 50).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn close_tables_flushes_dirty_frames() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db").to_str().unwrap().to_string();
        let bm = BufferManager::new(4, FileManager::new());
        let table_id = bm.open_table(&path).unwrap();
        let handle = bm.get_new_block(table_id, PageType::Leaf).unwrap();
        let page_num = handle.page_num();
        bm.write_field(&handle, 123u64, 10).unwrap();
        drop(handle);
        bm.close_tables().unwrap();

        let bm2 = BufferManager::new(4, FileManager::new());
        let table_id2 = bm2.open_table(&path).unwrap();
        let reopened = bm2.get_block(table_id2, page_num).unwrap();
        let value: u64 = bm2.read_field(&reopened, 10).unwrap();
        assert_eq!(value, 123);
    }

    #[test]
    fn dropping_the_pool_without_closing_still_flushes_dirty_frames() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db").to_str().unwrap().to_string();
        let bm = BufferManager::new(4, FileManager::new());
        let table_id = bm.open_table(&path).unwrap();
        let handle = bm.get_new_block(table_id, PageType::Leaf).unwrap();
        let page_num = handle.page_num();
        bm.write_field(&handle, 77u64, 30).unwrap();
        drop(handle);
        drop(bm); // no explicit close_tables call

        let bm2 = BufferManager::new(4, FileManager::new());
        let table_id2 = bm2.open_table(&path).unwrap();
        let reopened = bm2.get_block(table_id2, page_num).unwrap();
        let value: u64 = bm2.read_field(&reopened, 30).unwrap();
        assert_eq!(value, 77);
    }

    #[test]
    fn random_page_image_survives_an_eviction_round_trip() {
        use rand::Rng;

        let (bm, table_id, _dir) = manager(1);
        let mut rng = rand::thread_rng();
        let mut image = page::zeroed();
        rng.fill(&mut image[..]);

        let h0 = bm.get_new_block(table_id, PageType::Leaf).unwrap();
        let p0 = h0.page_num();
        bm.write_page(&h0, &image).unwrap();
        drop(h0);

        // Force eviction of p0's frame.
        let h1 = bm.get_new_block(table_id, PageType::Leaf).unwrap();
        drop(h1);

        let reopened = bm.get_block(table_id, p0).unwrap();
        let read_back = bm.get_page(&reopened).unwrap();
        assert_eq!(read_back, image);
    }
}
