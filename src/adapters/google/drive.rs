//! Google Drive uploads.
//!
//! Uses the resumable upload protocol: a metadata request opens an upload
//! session, then the file bytes are sent to the session URI in one PUT.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::auth::GoogleAuth;
use crate::adapters::{truncate_body, ArtifactStore, UploadError};

const AUDIO_MIME: &str = "audio/mpeg";

/// Drive file as returned with `fields=id,webViewLink`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    web_view_link: Option<String>,
}

pub struct DriveClient {
    upload_url: String,
    auth: Arc<GoogleAuth>,
    client: reqwest::Client,
}

impl DriveClient {
    /// `upload_url` is the files upload endpoint, e.g.
    /// `https://www.googleapis.com/upload/drive/v3/files`
    pub fn new(upload_url: impl Into<String>, auth: Arc<GoogleAuth>, client: reqwest::Client) -> Self {
        Self {
            upload_url: upload_url.into(),
            auth,
            client,
        }
    }

    async fn open_session(
        &self,
        token: &str,
        file_name: &str,
        target_folder: &str,
        size: usize,
    ) -> Result<String, UploadError> {
        let response = self
            .client
            .post(&self.upload_url)
            .bearer_auth(token)
            .query(&[
                ("uploadType", "resumable"),
                ("supportsAllDrives", "true"),
                ("fields", "id,webViewLink"),
            ])
            .header("X-Upload-Content-Type", AUDIO_MIME)
            .header("X-Upload-Content-Length", size.to_string())
            .json(&serde_json::json!({
                "name": file_name,
                "parents": [target_folder],
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| UploadError::Protocol("upload session has no Location header".to_string()))
    }
}

#[async_trait]
impl ArtifactStore for DriveClient {
    #[instrument(skip(self, local_path), fields(file = %local_path.display()))]
    async fn upload(&self, local_path: &Path, target_folder: &str) -> Result<String, UploadError> {
        let file_name = local_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let bytes = tokio::fs::read(local_path).await?;
        let token = self.auth.access_token().await?;

        let session = self
            .open_session(&token, &file_name, target_folder, bytes.len())
            .await?;

        let response = self
            .client
            .put(&session)
            .bearer_auth(&token)
            .header(CONTENT_TYPE, AUDIO_MIME)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = truncate_body(&response.text().await.unwrap_or_default());
            warn!(status = status.as_u16(), %body, "Drive rejected upload");
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let file: DriveFile = response.json().await?;
        let link = file
            .web_view_link
            .unwrap_or_else(|| format!("https://drive.google.com/file/d/{}/view", file.id));

        info!(file_id = %file.id, "Uploaded to Drive");
        Ok(link)
    }
}
