//! RAII pin handles.
//!
//! A `Handle` owns one pin on a resident page. Cloning it re-pins; dropping
//! it unpins. Rust's ownership rules already forbid using a handle after it
//! has been moved out of, so unlike the pointer this mirrors, there is no
//! separate "moved-from" flag to maintain by hand.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::storage::buffer::manager::{BufferManager, Inner};
use crate::storage::file::{PageNum, TableId};

pub struct Handle {
    inner: Weak<RefCell<Inner>>,
    table_id: TableId,
    page_num: PageNum,
}

impl Handle {
    pub(crate) fn new(inner: &Rc<RefCell<Inner>>, table_id: TableId, page_num: PageNum) -> Self {
        Handle {
            inner: Rc::downgrade(inner),
            table_id,
            page_num,
        }
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn page_num(&self) -> PageNum {
        self.page_num
    }
}

impl Clone for Handle {
    fn clone(&self) -> Self {
        if let Some(inner) = self.inner.upgrade() {
            // Best-effort: if the page was already evicted out from under a
            // live handle (shouldn't happen while any handle holds a pin),
            // there is nothing sensible to re-pin.
            let _ = BufferManager::pin_raw(&inner, self.table_id, self.page_num);
        }
        Handle {
            inner: self.inner.clone(),
            table_id: self.table_id,
            page_num: self.page_num,
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            BufferManager::unpin_raw(&inner, self.table_id, self.page_num);
        }
    }
}
