//! Shared constants and panic messages, in the spirit of the lab's
//! `NO_CORRESPONDING_FRAME_ID_MSG`-style constants.

/// Size in bytes of a single page image. Fixed by the file layer's on-disk
/// format; every table file is a flat sequence of pages of this size.
pub const PAGE_SIZE: usize = 4096;

/// Page number of the header page present in every table.
pub const HEADER_PAGE_NUM: u64 = 0;

/// Byte offset within the header page of the free-page-list head, consumed
/// only by the file layer.
pub const FREE_LIST_HEAD_OFFSET: usize = 0;

/// Byte offset within the header page of the table's current page count,
/// consumed only by the file layer.
pub const NUM_PAGES_OFFSET: usize = 8;

/// Byte offset within the header page of the B+Tree root page number (array
/// index 3 of 8-byte unsigned integers), per the page layout convention the
/// buffer manager exposes but does not interpret.
pub const ROOT_PAGE_OFFSET: usize = 24;

pub(crate) const NO_CORRESPONDING_FRAME_MSG: &str =
    "no frame is resident for the given (table_id, page_num)";
