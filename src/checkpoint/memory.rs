//! In-memory checkpoint. Nothing is persisted.

use std::collections::HashSet;

use async_trait::async_trait;

use super::{validate_id, CheckpointError, CheckpointStore};

#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    ids: HashSet<String>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a known set of processed IDs
    pub fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Snapshot of recorded IDs
    pub fn ids(&self) -> &HashSet<String> {
        &self.ids
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    async fn record(&mut self, id: &str) -> Result<(), CheckpointError> {
        validate_id(id)?;
        self.ids.insert(id.to_string());
        Ok(())
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}
