//! Main orchestrator for the archive pipeline.
//!
//! One pass: list the agent's conversations, drop those already in the
//! checkpoint, then for each remaining conversation (oldest first) fetch
//! details, download audio, upload it, prepend a record to the document,
//! record the ID and delete the local audio.
//!
//! Per-conversation states:
//!
//! ```text
//! discovered ─┬─ details failed ──────────────────────────────→ skipped
//!             └─ detail-fetched ─┬─ audio failed ─────────────→ skipped
//!                                └─ audio-fetched → uploaded | upload-failed
//!                                                 → recorded → processed
//! ```
//!
//! Both terminal states put the ID in the checkpoint. Only `processed`
//! writes a document record.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{ArtifactStore, AudioFetcher, ConversationSource, RecordSink};
use crate::checkpoint::CheckpointStore;
use crate::domain::{
    format_transcript, sort_by_start_time, ArtifactLine, ConversationSummary, DocumentRecord,
    ItemOutcome, RunReport, SkipStage,
};

/// External services the pipeline talks to
#[derive(Clone)]
pub struct Services {
    pub source: Arc<dyn ConversationSource>,
    pub audio: Arc<dyn AudioFetcher>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub sink: Arc<dyn RecordSink>,
}

/// Knobs for a single pass
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// List and filter only; no fetches, uploads, appends or checkpoint writes
    pub dry_run: bool,

    /// Process at most this many pending conversations
    pub limit: Option<usize>,
}

/// Main pipeline orchestrator
pub struct Orchestrator {
    services: Services,
    checkpoint: Box<dyn CheckpointStore>,
    agent_id: String,
    drive_folder_id: String,
}

impl Orchestrator {
    /// Create an orchestrator. The checkpoint must already be open: its
    /// contents are the processed set for this run.
    pub fn new(
        services: Services,
        checkpoint: Box<dyn CheckpointStore>,
        agent_id: impl Into<String>,
        drive_folder_id: impl Into<String>,
    ) -> Self {
        Self {
            services,
            checkpoint,
            agent_id: agent_id.into(),
            drive_folder_id: drive_folder_id.into(),
        }
    }

    pub fn checkpoint(&self) -> &dyn CheckpointStore {
        self.checkpoint.as_ref()
    }

    /// Run one pass of the pipeline.
    ///
    /// Only a checkpoint write failure aborts the pass; every other failure
    /// is confined to the conversation it happened on.
    pub async fn run(&mut self, options: RunOptions) -> Result<RunReport> {
        self.run_with_id(Uuid::new_v4(), options).await
    }

    #[instrument(skip(self, options), fields(agent_id = %self.agent_id, dry_run = options.dry_run))]
    async fn run_with_id(&mut self, run_id: Uuid, options: RunOptions) -> Result<RunReport> {
        let mut report = RunReport::new(run_id);
        report.dry_run = options.dry_run;

        let mut conversations = self.services.source.list_conversations(&self.agent_id).await;
        sort_by_start_time(&mut conversations);

        // Overlapping pages can list a conversation twice; keep the first.
        let mut seen = HashSet::new();
        conversations.retain(|c| seen.insert(c.conversation_id.clone()));
        report.discovered = conversations.len();

        let pending: Vec<ConversationSummary> = conversations
            .into_iter()
            .filter(|c| !self.checkpoint.contains(&c.conversation_id))
            .collect();
        report.already_processed = report.discovered - pending.len();
        report.pending = pending.len();

        if pending.is_empty() {
            info!(discovered = report.discovered, "No new conversations");
            return Ok(report);
        }

        let batch: Vec<ConversationSummary> = match options.limit {
            Some(limit) => pending.into_iter().take(limit).collect(),
            None => pending,
        };
        report.pending_ids = batch.iter().map(|c| c.conversation_id.clone()).collect();

        info!(
            discovered = report.discovered,
            pending = report.pending,
            batch = batch.len(),
            "Found new conversations"
        );

        if options.dry_run {
            return Ok(report);
        }

        for summary in &batch {
            let outcome = self.process_one(summary).await?;
            report.items.push((summary.conversation_id.clone(), outcome));
        }

        info!(
            processed = report.processed(),
            skipped = report.skipped(),
            upload_failures = report.upload_failures(),
            "Run complete"
        );

        Ok(report)
    }

    #[instrument(skip(self, summary), fields(conversation_id = %summary.conversation_id))]
    async fn process_one(&mut self, summary: &ConversationSummary) -> Result<ItemOutcome> {
        let id = summary.conversation_id.as_str();
        info!(start_time = summary.start_time, "Processing conversation");

        let detail = match self.services.source.get_details(id).await {
            Ok(detail) => detail,
            Err(e) => {
                warn!(error = %e, "Skipping conversation: details unavailable");
                self.mark_processed(id).await?;
                return Ok(ItemOutcome::Skipped {
                    stage: SkipStage::Details,
                    reason: e.to_string(),
                });
            }
        };

        let audio_path = match self.services.audio.download(id).await {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Skipping conversation: audio unavailable");
                self.mark_processed(id).await?;
                return Ok(ItemOutcome::Skipped {
                    stage: SkipStage::Audio,
                    reason: e.to_string(),
                });
            }
        };

        let artifact = match self
            .services
            .artifacts
            .upload(&audio_path, &self.drive_folder_id)
            .await
        {
            Ok(link) => ArtifactLine::Uploaded(link),
            Err(e) => {
                error!(error = %e, "Audio upload failed; recording placeholder");
                ArtifactLine::UploadFailed
            }
        };
        let uploaded = matches!(artifact, ArtifactLine::Uploaded(_));

        let start_time = if detail.start_time != 0 {
            detail.start_time
        } else {
            summary.start_time
        };
        let record = DocumentRecord::compose(
            id,
            start_time,
            detail.summary.as_deref(),
            &format_transcript(&detail.transcript),
            artifact,
        );

        let record_written = match self.services.sink.append(&record).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to add record to document");
                false
            }
        };

        let recorded = self.mark_processed(id).await;
        remove_audio(&audio_path).await;
        recorded?;

        Ok(ItemOutcome::Processed {
            uploaded,
            record_written,
        })
    }

    async fn mark_processed(&mut self, id: &str) -> Result<()> {
        self.checkpoint
            .record(id)
            .await
            .with_context(|| format!("Failed to record conversation {} in checkpoint", id))
    }
}

async fn remove_audio(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Failed to delete local audio");
    }
}
