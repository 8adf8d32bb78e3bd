//! callarchive - archive voice-agent conversations to Google Workspace
//!
//! Polls the conversation provider for one agent, downloads each new
//! conversation's audio, uploads it to a Drive folder and prepends a
//! transcript record to a shared Google Doc.
//!
//! # Architecture
//!
//! Each pass is idempotent:
//! - Processed conversation IDs are kept in an append-only checkpoint
//! - A conversation is recorded once it reaches a terminal state
//! - Failures are confined to the conversation they happen on
//!
//! # Modules
//!
//! - `adapters`: External services (ElevenLabs, Drive, Docs)
//! - `checkpoint`: Processed-ID stores (file, SQLite, memory)
//! - `core`: Orchestration logic (Orchestrator, RunLock)
//! - `domain`: Data structures (ConversationSummary, DocumentRecord, RunReport)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Archive new conversations
//! callarchive run
//!
//! # Preview what would be archived
//! callarchive run --dry-run
//!
//! # Inspect the checkpoint
//! callarchive status
//! ```

pub mod adapters;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use checkpoint::{CheckpointBackend, CheckpointStore};
pub use core::{Orchestrator, RunOptions, Services};
pub use domain::{ConversationDetail, ConversationSummary, DocumentRecord, ItemOutcome, RunReport};
