//! Domain types for callarchive.
//!
//! - Conversation: listing entries and full conversation details
//! - Record: the text block written to the shared document
//! - Outcome: per-conversation results and the run report

pub mod conversation;
pub mod outcome;
pub mod record;

pub use conversation::{sort_by_start_time, ConversationDetail, ConversationSummary, TranscriptTurn};
pub use outcome::{ItemOutcome, RunReport, SkipStage};
pub use record::{
    format_timestamp, format_transcript, ArtifactLine, DocumentRecord, EMPTY_TRANSCRIPT_PLACEHOLDER,
    RECORD_SEPARATOR,
};
