//! Process configuration, loaded through the `config` crate.
//!
//! Values can be overridden by an optional `config/settings.toml` file and
//! by `BUFPOOLDB_*` environment variables (e.g. `BUFPOOLDB_BUFFER_POOL_SIZE=256`).

use serde::Deserialize;

use crate::common::Result;

/// Default number of frames in the buffer pool when no override is given.
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 64;

/// Default directory table files are created/opened under when a caller
/// passes a bare file name instead of a full path.
pub const DEFAULT_DATA_DIR: &str = "./data";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub buffer_pool_size: usize,
    pub data_dir: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            buffer_pool_size: DEFAULT_BUFFER_POOL_SIZE,
            data_dir: DEFAULT_DATA_DIR.to_string(),
        }
    }
}

impl Settings {
    /// Load settings from (in increasing priority order) built-in defaults,
    /// `config/settings.toml` if present, then `BUFPOOLDB_*` environment
    /// variables.
    pub fn load() -> Result<Self> {
        let builder = config::Config::builder()
            .set_default("buffer_pool_size", DEFAULT_BUFFER_POOL_SIZE as i64)?
            .set_default("data_dir", DEFAULT_DATA_DIR)?
            .add_source(config::File::with_name("config/settings").required(false))
            .add_source(config::Environment::with_prefix("BUFPOOLDB"));

        let cfg = builder.build()?;
        Ok(cfg.try_deserialize()?)
    }
}
