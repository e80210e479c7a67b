mod repository;
mod settlement;

pub use repository::*;
pub use settlement::*;

use std::path::PathBuf;
use std::time::Duration;

/// SQL migration for initial schema
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// Connection settings for the SQLite store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database file, created on first use
    pub path: PathBuf,
    pub max_connections: u32,
    /// How long a writer waits for the write lock before giving up
    pub busy_timeout: Duration,
}

impl StoreConfig {
    pub fn in_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("venmo.db"),
            max_connections: 4,
            busy_timeout: Duration::from_secs(5),
        }
    }
}
