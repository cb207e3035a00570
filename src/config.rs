//! Configuration loader and schema types.
//!
//! This module exposes the configuration schema used to drive the library
//! scanner, the import coordinator and the playback worker, plus helpers to
//! load it from disk and the environment.

mod load;
mod schema;

pub use load::{default_config_path, default_library_path, resolve_config_path};
pub use schema::*;
