//! Adapter interfaces for external systems.
//!
//! The orchestrator only sees these traits. Concrete clients:
//! - [`elevenlabs::ConversationClient`]: conversation listing, details, audio
//! - [`google::DriveClient`]: audio upload
//! - [`google::DocsClient`]: record append

pub mod elevenlabs;
pub mod google;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ConversationDetail, ConversationSummary, DocumentRecord};

pub use elevenlabs::ConversationClient;
pub use google::{DocsClient, DriveClient, GoogleAuth};

/// Failure fetching details or audio for one conversation
#[derive(Debug, Error)]
pub enum FetchError {
    /// The provider answered with a non-success status
    #[error("Not found (HTTP {status}): {body}")]
    NotFound { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Conversation ID not usable as a file name: {0:?}")]
    InvalidId(String),

    #[error("Invalid provider URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Failure uploading an artifact
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Upload rejected (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to read local file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected upload response: {0}")]
    Protocol(String),

    #[error("Authentication failed: {0}")]
    Auth(#[from] google::AuthError),
}

/// Failure writing a record to the document
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Document update rejected (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Auth(#[from] google::AuthError),
}

/// Lists and describes conversations
#[async_trait]
pub trait ConversationSource: Send + Sync {
    /// All conversations belonging to `agent_id`.
    ///
    /// Never fails: a transport error mid-pagination ends the listing and
    /// whatever was collected so far is returned.
    async fn list_conversations(&self, agent_id: &str) -> Vec<ConversationSummary>;

    /// Full record for one conversation
    async fn get_details(&self, conversation_id: &str) -> Result<ConversationDetail, FetchError>;
}

/// Downloads call audio to local storage
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    /// Write the audio to `{conversation_id}.mp3` in the work directory.
    ///
    /// The returned path always refers to a completely written file.
    async fn download(&self, conversation_id: &str) -> Result<PathBuf, FetchError>;
}

/// Stores artifacts and hands back shareable links
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn upload(&self, local_path: &Path, target_folder: &str) -> Result<String, UploadError>;
}

/// Persistent document that records are prepended to
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn append(&self, record: &DocumentRecord) -> Result<(), SinkError>;
}

/// Cut a response body down to something reasonable for a log line
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 500;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
