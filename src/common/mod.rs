pub mod constants;
mod error;

pub use error::{Error, Result};
