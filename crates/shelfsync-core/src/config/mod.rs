//! Configuration loading for shelfsync.
//!
//! Settings live in `conf/config.toml`, grouped into `[policy]`, `[logging]`
//! and `[remote]` tables. Missing or invalid entries fall back to defaults so
//! the tool can always start.

mod defaults;
mod io;
mod models;
mod tables;

pub use io::{load_config, parse_config, serialize_config};
pub use models::{AppConfig, LogLevel, MAX_RECENT_LIMIT};
