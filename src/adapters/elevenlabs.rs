//! ElevenLabs Conversational AI client.
//!
//! Endpoints (relative to the configured base URL):
//! - `GET /conversations?agent_id=&page_size=&cursor=`
//! - `GET /conversations/{id}`
//! - `GET /conversations/{id}/audio`
//!
//! Auth: static `xi-api-key` header.

use std::future::Future;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use super::{truncate_body, AudioFetcher, ConversationSource, FetchError};
use crate::config::ProviderSettings;
use crate::domain::{ConversationDetail, ConversationSummary, TranscriptTurn};

const API_KEY_HEADER: &str = "xi-api-key";

/// Client for listing conversations, fetching details and downloading audio
pub struct ConversationClient {
    base_url: String,
    api_key: String,
    page_size: u32,
    work_dir: PathBuf,
    client: reqwest::Client,
}

/// One page of `GET /conversations`
#[derive(Debug, Deserialize)]
struct ListPage {
    #[serde(default)]
    conversations: Vec<WireSummary>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireSummary {
    conversation_id: String,
    #[serde(default)]
    agent_id: String,
    #[serde(default)]
    start_time_unix_secs: i64,
}

/// Body of `GET /conversations/{id}`
#[derive(Debug, Deserialize)]
struct WireDetail {
    conversation_id: String,
    #[serde(default)]
    metadata: WireMetadata,
    #[serde(default)]
    analysis: Option<WireAnalysis>,
    #[serde(default)]
    transcript: Vec<TranscriptTurn>,
}

#[derive(Debug, Default, Deserialize)]
struct WireMetadata {
    #[serde(default)]
    start_time_unix_secs: i64,
}

#[derive(Debug, Deserialize)]
struct WireAnalysis {
    #[serde(default)]
    transcript_summary: Option<String>,
}

impl From<WireDetail> for ConversationDetail {
    fn from(wire: WireDetail) -> Self {
        Self {
            conversation_id: wire.conversation_id,
            start_time: wire.metadata.start_time_unix_secs,
            summary: wire.analysis.and_then(|a| a.transcript_summary),
            transcript: wire.transcript,
        }
    }
}

impl ConversationClient {
    pub fn new(settings: &ProviderSettings, work_dir: &Path, client: reqwest::Client) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            page_size: settings.page_size,
            work_dir: work_dir.to_path_buf(),
            client,
        }
    }

    /// Base URL plus `segments`, each percent-encoded as one path segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Local destination for a conversation's audio
    pub fn audio_path(&self, conversation_id: &str) -> Result<PathBuf, FetchError> {
        check_file_id(conversation_id)?;
        Ok(self.work_dir.join(format!("{}.mp3", conversation_id)))
    }

    async fn fetch_page(&self, agent_id: &str, cursor: Option<&str>) -> Result<ListPage, FetchError> {
        let mut query: Vec<(&str, String)> = vec![
            ("agent_id", agent_id.to_string()),
            ("page_size", self.page_size.to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }

        let response = self
            .client
            .get(self.endpoint(&["conversations"])?)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(FetchError::NotFound {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// Fold one listing page into `acc`, keeping only the agent's
/// conversations. Returns the cursor for the next page, if any.
fn absorb_page(
    page: ListPage,
    agent_id: &str,
    current_cursor: Option<&str>,
    acc: &mut Vec<ConversationSummary>,
) -> Option<String> {
    acc.extend(
        page.conversations
            .into_iter()
            .filter(|c| c.agent_id == agent_id)
            .map(|c| ConversationSummary::new(c.conversation_id, c.agent_id, c.start_time_unix_secs)),
    );

    if !page.has_more {
        return None;
    }

    match page.next_cursor {
        Some(next) if !next.is_empty() && Some(next.as_str()) != current_cursor => Some(next),
        _ => None,
    }
}

/// Page through a listing with `fetch` until it ends. A failed page ends
/// the listing and keeps what was collected. Returns the conversations and
/// the number of pages read.
async fn collect_pages<F, Fut>(agent_id: &str, mut fetch: F) -> (Vec<ConversationSummary>, usize)
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<ListPage, FetchError>>,
{
    let mut conversations = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = match fetch(cursor.clone()).await {
            Ok(page) => page,
            Err(e) => {
                warn!(
                    error = %e,
                    collected = conversations.len(),
                    "Conversation listing interrupted; continuing with partial results"
                );
                break;
            }
        };
        pages += 1;

        match absorb_page(page, agent_id, cursor.as_deref(), &mut conversations) {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    (conversations, pages)
}

/// IDs become file names in the work directory; anything that could
/// resolve outside it is refused.
fn check_file_id(id: &str) -> Result<(), FetchError> {
    let unsafe_name = id.is_empty()
        || id == "."
        || id == ".."
        || id.contains(['/', '\\', ':'])
        || id.chars().any(char::is_control);

    if unsafe_name {
        return Err(FetchError::InvalidId(id.to_string()));
    }
    Ok(())
}

#[async_trait]
impl ConversationSource for ConversationClient {
    #[instrument(skip(self))]
    async fn list_conversations(&self, agent_id: &str) -> Vec<ConversationSummary> {
        let (conversations, pages) = collect_pages(agent_id, move |cursor| async move {
            self.fetch_page(agent_id, cursor.as_deref()).await
        })
        .await;

        info!(pages, count = conversations.len(), "Listed conversations");
        conversations
    }

    #[instrument(skip(self))]
    async fn get_details(&self, conversation_id: &str) -> Result<ConversationDetail, FetchError> {
        let response = self
            .client
            .get(self.endpoint(&["conversations", conversation_id])?)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let body = truncate_body(&body);
            warn!(status = status.as_u16(), %body, "Conversation details not available");
            return Err(FetchError::NotFound {
                status: status.as_u16(),
                body,
            });
        }

        let wire: WireDetail =
            serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))?;
        debug!(turns = wire.transcript.len(), "Fetched conversation details");

        Ok(wire.into())
    }
}

#[async_trait]
impl AudioFetcher for ConversationClient {
    #[instrument(skip(self))]
    async fn download(&self, conversation_id: &str) -> Result<PathBuf, FetchError> {
        let final_path = self.audio_path(conversation_id)?;

        let mut response = self
            .client
            .get(self.endpoint(&["conversations", conversation_id, "audio"])?)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = truncate_body(&response.text().await.unwrap_or_default());
            warn!(status = status.as_u16(), %body, "Audio not available");
            return Err(FetchError::NotFound {
                status: status.as_u16(),
                body,
            });
        }

        fs::create_dir_all(&self.work_dir).await?;

        let part_path = final_path.with_extension("mp3.part");

        let written = async {
            let mut file = File::create(&part_path).await?;
            let mut bytes = 0u64;
            while let Some(chunk) = response.chunk().await? {
                file.write_all(&chunk).await?;
                bytes += chunk.len() as u64;
            }
            file.flush().await?;
            file.sync_all().await?;
            Ok::<u64, FetchError>(bytes)
        }
        .await;

        let bytes = match written {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = fs::remove_file(&part_path).await;
                return Err(e);
            }
        };

        fs::rename(&part_path, &final_path).await?;
        info!(bytes, path = %final_path.display(), "Downloaded audio");

        Ok(final_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> ConversationClient {
        let settings = ProviderSettings {
            base_url: base_url.to_string(),
            api_key: "key".to_string(),
            page_size: 50,
        };
        ConversationClient::new(&settings, Path::new("/tmp/calls"), reqwest::Client::new())
    }

    fn page(ids: &[&str], next_cursor: Option<&str>) -> ListPage {
        ListPage {
            conversations: ids
                .iter()
                .map(|id| WireSummary {
                    conversation_id: id.to_string(),
                    agent_id: "agent_a".to_string(),
                    start_time_unix_secs: 0,
                })
                .collect(),
            has_more: next_cursor.is_some(),
            next_cursor: next_cursor.map(str::to_string),
        }
    }

    #[test]
    fn test_url_building() {
        let c = client("https://api.elevenlabs.io/v1/convai/");
        assert_eq!(
            c.endpoint(&["conversations", "abc", "audio"]).unwrap().as_str(),
            "https://api.elevenlabs.io/v1/convai/conversations/abc/audio"
        );
        assert_eq!(c.audio_path("abc").unwrap(), PathBuf::from("/tmp/calls/abc.mp3"));
    }

    #[test]
    fn test_ids_are_encoded_as_single_segments() {
        let c = client("https://api.elevenlabs.io/v1/convai");
        let url = c.endpoint(&["conversations", "a/b"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.elevenlabs.io/v1/convai/conversations/a%2Fb"
        );
    }

    #[test]
    fn test_audio_path_rejects_escaping_ids() {
        let c = client("https://api.elevenlabs.io/v1/convai");
        for id in ["", ".", "..", "../etc/passwd", "/etc/passwd", "a/b", "a\\b", "C:x", "a\nb"] {
            assert!(
                matches!(c.audio_path(id), Err(FetchError::InvalidId(_))),
                "accepted {:?}",
                id
            );
        }
        assert!(c.audio_path("conv_01hx..9z").is_ok());
    }

    #[tokio::test]
    async fn test_download_refuses_escaping_id_before_any_request() {
        let temp = tempfile::TempDir::new().unwrap();
        let settings = ProviderSettings {
            // Nothing listens here; an attempted request would be a transport error
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: "key".to_string(),
            page_size: 50,
        };
        let c = ConversationClient::new(&settings, temp.path(), reqwest::Client::new());

        let err = c.download("../outside").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidId(_)));
    }

    #[tokio::test]
    async fn test_listing_follows_cursor_across_pages() {
        let mut cursors = Vec::new();
        let (conversations, pages) = collect_pages("agent_a", |cursor| {
            cursors.push(cursor.clone());
            let result = match cursor.as_deref() {
                None => Ok(page(&["c1", "c2"], Some("p2"))),
                Some("p2") => Ok(page(&["c3"], None)),
                Some(other) => panic!("unexpected cursor {}", other),
            };
            std::future::ready(result)
        })
        .await;

        assert_eq!(pages, 2);
        assert_eq!(cursors, vec![None, Some("p2".to_string())]);
        let ids: Vec<&str> = conversations.iter().map(|c| c.conversation_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
    }

    #[tokio::test]
    async fn test_listing_keeps_partial_results_on_failure() {
        let (conversations, pages) = collect_pages("agent_a", |cursor| {
            let result = match cursor.as_deref() {
                None => Ok(page(&["c1", "c2"], Some("p2"))),
                Some(_) => Err(FetchError::NotFound {
                    status: 503,
                    body: "upstream unavailable".to_string(),
                }),
            };
            std::future::ready(result)
        })
        .await;

        assert_eq!(pages, 1);
        let ids: Vec<&str> = conversations.iter().map(|c| c.conversation_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
    }

    #[tokio::test]
    async fn test_listing_failing_first_page_is_empty() {
        let (conversations, pages) = collect_pages("agent_a", |_| {
            std::future::ready(Err(FetchError::Decode("bad json".to_string())))
        })
        .await;

        assert_eq!(pages, 0);
        assert!(conversations.is_empty());
    }

    #[test]
    fn test_absorb_page_filters_agent_and_follows_cursor() {
        let page: ListPage = serde_json::from_str(
            r#"{
                "conversations": [
                    {"conversation_id": "c1", "agent_id": "agent_a", "start_time_unix_secs": 20},
                    {"conversation_id": "c2", "agent_id": "agent_b", "start_time_unix_secs": 10},
                    {"conversation_id": "c3", "agent_id": "agent_a", "start_time_unix_secs": 5}
                ],
                "has_more": true,
                "next_cursor": "page2"
            }"#,
        )
        .unwrap();

        let mut acc = Vec::new();
        let next = absorb_page(page, "agent_a", None, &mut acc);

        assert_eq!(next.as_deref(), Some("page2"));
        let ids: Vec<&str> = acc.iter().map(|c| c.conversation_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c3"]);
    }

    #[test]
    fn test_absorb_page_stops_without_more() {
        let page: ListPage =
            serde_json::from_str(r#"{"conversations": [], "has_more": false, "next_cursor": "x"}"#)
                .unwrap();
        let mut acc = Vec::new();
        assert!(absorb_page(page, "agent_a", None, &mut acc).is_none());
    }

    #[test]
    fn test_absorb_page_stops_on_repeated_or_missing_cursor() {
        let repeated: ListPage =
            serde_json::from_str(r#"{"has_more": true, "next_cursor": "same"}"#).unwrap();
        let mut acc = Vec::new();
        assert!(absorb_page(repeated, "a", Some("same"), &mut acc).is_none());

        let missing: ListPage = serde_json::from_str(r#"{"has_more": true}"#).unwrap();
        assert!(absorb_page(missing, "a", None, &mut acc).is_none());
    }

    #[test]
    fn test_detail_conversion() {
        let wire: WireDetail = serde_json::from_str(
            r#"{
                "conversation_id": "c1",
                "status": "done",
                "metadata": {"start_time_unix_secs": 1700000000, "call_duration_secs": 42},
                "analysis": {"transcript_summary": "Caller booked a visit."},
                "transcript": [
                    {"role": "agent", "message": "Hello", "time_in_call_secs": 0},
                    {"role": "user", "message": null, "tool_calls": []}
                ]
            }"#,
        )
        .unwrap();

        let detail: ConversationDetail = wire.into();
        assert_eq!(detail.start_time, 1_700_000_000);
        assert_eq!(detail.summary.as_deref(), Some("Caller booked a visit."));
        assert_eq!(detail.transcript.len(), 2);
        assert!(detail.transcript[1].message.is_none());
    }

    #[test]
    fn test_detail_without_analysis() {
        let wire: WireDetail =
            serde_json::from_str(r#"{"conversation_id": "c1", "transcript": []}"#).unwrap();
        let detail: ConversationDetail = wire.into();
        assert!(detail.summary.is_none());
        assert_eq!(detail.start_time, 0);
    }
}
