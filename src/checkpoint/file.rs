//! Line-delimited checkpoint file.
//!
//! Same append-only discipline as a JSONL log, minus the JSON: each
//! recorded ID is one line. The whole file is read into memory on open.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

use super::{validate_id, CheckpointError, CheckpointStore};

/// Processed IDs stored one per line
pub struct FileCheckpointStore {
    path: PathBuf,
    ids: HashSet<String>,
}

impl FileCheckpointStore {
    /// Open (or lazily create) the checkpoint at `path`.
    ///
    /// A missing file is an empty checkpoint; it is created on the first
    /// `record`.
    pub async fn open(path: &Path) -> Result<Self, CheckpointError> {
        let ids = Self::load(path).await?;
        debug!(path = %path.display(), count = ids.len(), "Loaded checkpoint file");

        Ok(Self {
            path: path.to_path_buf(),
            ids,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_ids(self) -> HashSet<String> {
        self.ids
    }

    async fn load(path: &Path) -> Result<HashSet<String>, CheckpointError> {
        let mut ids = HashSet::new();

        if !path.exists() {
            return Ok(ids);
        }

        let file = File::open(path).await?;
        let mut lines = BufReader::new(file).lines();

        while let Some(line) = lines.next_line().await? {
            let id = line.trim();
            if !id.is_empty() {
                ids.insert(id.to_string());
            }
        }

        Ok(ids)
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    fn name(&self) -> &str {
        "file"
    }

    fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    async fn record(&mut self, id: &str) -> Result<(), CheckpointError> {
        validate_id(id)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(format!("{}\n", id).as_bytes()).await?;
        file.flush().await?;
        file.sync_data().await?;

        self.ids.insert(id.to_string());
        Ok(())
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = FileCheckpointStore::open(&temp.path().join("processed.txt"))
            .await
            .unwrap();

        assert!(store.is_empty());
        assert!(!store.contains("conv_1"));
    }

    #[tokio::test]
    async fn test_record_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state").join("processed.txt");

        let mut store = FileCheckpointStore::open(&path).await.unwrap();
        store.record("conv_1").await.unwrap();
        store.record("conv_2").await.unwrap();
        assert!(store.contains("conv_1"));

        let reopened = FileCheckpointStore::open(&path).await.unwrap();
        assert!(reopened.contains("conv_1"));
        assert!(reopened.contains("conv_2"));
        assert_eq!(reopened.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicates_and_blank_lines_are_harmless() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("processed.txt");
        tokio::fs::write(&path, "conv_1\n\n  \nconv_2\nconv_1\n").await.unwrap();

        let mut store = FileCheckpointStore::open(&path).await.unwrap();
        assert_eq!(store.len(), 2);

        store.record("conv_2").await.unwrap();
        assert_eq!(store.len(), 2);

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(content.ends_with("conv_2\n"));
    }

    #[tokio::test]
    async fn test_rejects_multiline_id() {
        let temp = TempDir::new().unwrap();
        let mut store = FileCheckpointStore::open(&temp.path().join("p.txt")).await.unwrap();

        let err = store.record("a\nb").await.unwrap_err();
        assert!(matches!(err, CheckpointError::InvalidId(_)));
        assert!(store.is_empty());
    }
}
