//! Per-conversation outcomes and the report for a whole run.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

/// Step at which a conversation was given up on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipStage {
    Details,
    Audio,
}

impl fmt::Display for SkipStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Details => write!(f, "details"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// Terminal state of one attempted conversation.
///
/// Both variants mean the ID is now in the checkpoint; only `Processed`
/// got as far as writing a document record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    Skipped { stage: SkipStage, reason: String },
    Processed { uploaded: bool, record_written: bool },
}

impl ItemOutcome {
    pub fn is_processed(&self) -> bool {
        matches!(self, Self::Processed { .. })
    }
}

/// What a single pipeline pass did
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,

    /// Conversations for the agent returned by the listing
    pub discovered: usize,

    /// Already in the checkpoint before this run
    pub already_processed: usize,

    /// Not yet in the checkpoint
    pub pending: usize,

    /// Pending IDs in processing order (after any limit)
    pub pending_ids: Vec<String>,

    /// True when nothing was attempted because of `--dry-run`
    pub dry_run: bool,

    /// (conversation_id, outcome) in processing order
    pub items: Vec<(String, ItemOutcome)>,
}

impl RunReport {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            discovered: 0,
            already_processed: 0,
            pending: 0,
            pending_ids: Vec::new(),
            dry_run: false,
            items: Vec::new(),
        }
    }

    pub fn processed(&self) -> usize {
        self.items.iter().filter(|(_, o)| o.is_processed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.items.len() - self.processed()
    }

    pub fn upload_failures(&self) -> usize {
        self.items
            .iter()
            .filter(|(_, o)| matches!(o, ItemOutcome::Processed { uploaded: false, .. }))
            .count()
    }

    pub fn outcome_for(&self, conversation_id: &str) -> Option<&ItemOutcome> {
        self.items
            .iter()
            .find(|(id, _)| id == conversation_id)
            .map(|(_, o)| o)
    }
}
