//! Conversations as the pipeline sees them.
//!
//! These are provider-neutral: adapters translate their wire formats into
//! these types before handing them to the orchestrator.

use serde::{Deserialize, Serialize};

/// One entry from a conversation listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Provider-assigned conversation ID
    pub conversation_id: String,

    /// Agent that handled the call
    pub agent_id: String,

    /// Call start (unix seconds)
    pub start_time: i64,
}

impl ConversationSummary {
    pub fn new(conversation_id: impl Into<String>, agent_id: impl Into<String>, start_time: i64) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            agent_id: agent_id.into(),
            start_time,
        }
    }
}

/// A single speaker turn in a transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptTurn {
    /// Speaker role as reported by the provider ("agent", "user", ...)
    pub role: String,

    /// What was said; the provider leaves this out for tool calls and silence
    #[serde(default)]
    pub message: Option<String>,
}

impl TranscriptTurn {
    pub fn new(role: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            message: Some(message.into()),
        }
    }
}

/// Full record of one conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationDetail {
    pub conversation_id: String,

    /// Call start (unix seconds)
    pub start_time: i64,

    /// Provider-generated summary, if analysis has run
    pub summary: Option<String>,

    /// Ordered speaker turns
    pub transcript: Vec<TranscriptTurn>,
}

/// Sort summaries oldest first. The sort is stable so equal start times
/// keep their listing order.
pub fn sort_by_start_time(conversations: &mut [ConversationSummary]) {
    conversations.sort_by_key(|c| c.start_time);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_is_ascending_and_stable() {
        let mut items = vec![
            ConversationSummary::new("c", "agent", 300),
            ConversationSummary::new("a", "agent", 100),
            ConversationSummary::new("b1", "agent", 200),
            ConversationSummary::new("b2", "agent", 200),
        ];

        sort_by_start_time(&mut items);

        let ids: Vec<&str> = items.iter().map(|c| c.conversation_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b1", "b2", "c"]);
    }

    #[test]
    fn test_turn_without_message_deserializes() {
        let turn: TranscriptTurn = serde_json::from_str(r#"{"role":"agent"}"#).unwrap();
        assert_eq!(turn.role, "agent");
        assert!(turn.message.is_none());
    }
}
