//! Exclusive run lock.
//!
//! The checkpoint is append-only and unsynchronised, so two runs at once
//! could both process the same conversation. A run holds an advisory lock
//! on a file in the state directory for its whole duration.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use tracing::debug;

/// Held for the lifetime of a run; released on drop
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Take the lock without waiting. Fails if another run holds it.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create state directory: {}", parent.display())
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open lock file: {}", path.display()))?;

        file.try_lock_exclusive().with_context(|| {
            format!(
                "Another callarchive run is in progress (lock held on {})",
                path.display()
            )
        })?;

        debug!(path = %path.display(), "Acquired run lock");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
