use std::fmt;

use crate::storage::file::{PageNum, TableId};

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the buffer pool and its file-layer adapter.
///
/// This crate does not pull in `thiserror`/`anyhow`; errors are hand-rolled
/// the way the rest of this codebase already does it.
#[derive(Debug)]
pub enum Error {
    /// No unpinned frame was available to satisfy `get_block`/`get_new_block`.
    NoSpace,
    /// A table was referenced that was never opened.
    TableNotFound(TableId),
    /// A page was referenced that has no corresponding resident frame.
    PageNotFound(TableId, PageNum),
    /// A process-wide convenience call was made before `global::init`.
    NotInitialized,
    /// A settings value failed to load or deserialize.
    Config(config::ConfigError),
    /// Propagated failure from the underlying file system.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NoSpace => write!(f, "buffer pool has no unpinned frame to evict"),
            Error::TableNotFound(table_id) => write!(f, "table {table_id} is not open"),
            Error::PageNotFound(table_id, page_num) => {
                write!(f, "{}: table {table_id} page {page_num}", crate::common::constants::NO_CORRESPONDING_FRAME_MSG)
            }
            Error::NotInitialized => write!(f, "buffer pool was not initialized"),
            Error::Config(e) => write!(f, "configuration error: {e}"),
            Error::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e)
    }
}
