//! Google Docs record sink.
//!
//! Records go in at index 1, the start of the document body, so the
//! newest call always ends up on top.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::auth::GoogleAuth;
use crate::adapters::{truncate_body, RecordSink, SinkError};
use crate::domain::DocumentRecord;

/// Document position of the first character of the body
const DOCUMENT_START: u32 = 1;

pub struct DocsClient {
    base_url: String,
    document_id: String,
    auth: Arc<GoogleAuth>,
    client: reqwest::Client,
}

impl DocsClient {
    /// `base_url` is the Docs API root, e.g. `https://docs.googleapis.com/v1`
    pub fn new(
        base_url: impl Into<String>,
        document_id: impl Into<String>,
        auth: Arc<GoogleAuth>,
        client: reqwest::Client,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            document_id: document_id.into(),
            auth,
            client,
        }
    }

    fn batch_update_url(&self) -> String {
        format!("{}/documents/{}:batchUpdate", self.base_url, self.document_id)
    }
}

/// `batchUpdate` body inserting `text` (plus a blank line) at the top
fn insert_at_start(text: &str) -> Value {
    json!({
        "requests": [{
            "insertText": {
                "location": { "index": DOCUMENT_START },
                "text": format!("{}\n\n", text),
            }
        }]
    })
}

#[async_trait]
impl RecordSink for DocsClient {
    #[instrument(skip(self, record), fields(conversation_id = %record.conversation_id))]
    async fn append(&self, record: &DocumentRecord) -> Result<(), SinkError> {
        let token = self.auth.access_token().await?;

        let response = self
            .client
            .post(self.batch_update_url())
            .bearer_auth(token)
            .json(&insert_at_start(&record.render()))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        info!("Record added to document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_request_shape() {
        let body = insert_at_start("hello");
        let insert = &body["requests"][0]["insertText"];

        assert_eq!(insert["location"]["index"], 1);
        assert_eq!(insert["text"], "hello\n\n");
    }
}
