//! Checkpoint of processed conversation IDs.
//!
//! The checkpoint is the only state that survives between runs. Once an ID
//! is recorded the pipeline never touches that conversation again.
//!
//! Backends:
//! - [`FileCheckpointStore`]: one ID per line, append-only (default)
//! - [`SqliteCheckpointStore`]: single-table SQLite database
//! - [`MemoryCheckpointStore`]: in-process only (tests, and read-only
//!   snapshots from [`snapshot`] for dry runs and `status`)

pub mod file;
pub mod memory;
pub mod sqlite;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use file::FileCheckpointStore;
pub use memory::MemoryCheckpointStore;
pub use sqlite::SqliteCheckpointStore;

/// Errors from checkpoint backends
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid conversation ID: {0:?}")]
    InvalidId(String),
}

/// Set of conversation IDs that have already been handled
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Backend name for logs and `status`
    fn name(&self) -> &str;

    /// True iff `id` was recorded before
    fn contains(&self, id: &str) -> bool;

    /// Durably add `id`. Recording an ID twice is harmless.
    async fn record(&mut self, id: &str) -> Result<(), CheckpointError>;

    /// Number of distinct recorded IDs
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Checkpoint backend selection (config file `checkpoint.backend`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointBackend {
    #[default]
    File,
    Sqlite,
}

impl std::fmt::Display for CheckpointBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Open the configured backend at `path`
pub async fn open(
    backend: CheckpointBackend,
    path: &Path,
) -> Result<Box<dyn CheckpointStore>, CheckpointError> {
    match backend {
        CheckpointBackend::File => Ok(Box::new(FileCheckpointStore::open(path).await?)),
        CheckpointBackend::Sqlite => Ok(Box::new(SqliteCheckpointStore::open(path)?)),
    }
}

/// Load the processed IDs at `path` into memory without creating or
/// changing anything on disk. A missing checkpoint is empty.
pub async fn snapshot(
    backend: CheckpointBackend,
    path: &Path,
) -> Result<MemoryCheckpointStore, CheckpointError> {
    if !path.exists() {
        return Ok(MemoryCheckpointStore::new());
    }

    let ids = match backend {
        CheckpointBackend::File => FileCheckpointStore::open(path).await?.into_ids(),
        CheckpointBackend::Sqlite => SqliteCheckpointStore::read_ids(path)?,
    };
    Ok(MemoryCheckpointStore::with_ids(ids))
}

/// IDs end up as single lines in the file backend, so reject anything that
/// would break that format.
pub(crate) fn validate_id(id: &str) -> Result<(), CheckpointError> {
    if id.trim().is_empty() || id.contains(['\n', '\r']) {
        return Err(CheckpointError::InvalidId(id.to_string()));
    }
    Ok(())
}
