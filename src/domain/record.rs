//! Document records: the text block written for each archived call.

use chrono::{TimeZone, Utc};

/// Written in place of the transcript when nothing was said
pub const EMPTY_TRANSCRIPT_PLACEHOLDER: &str = "(transcript is empty)";

/// Closes every record in the document
pub const RECORD_SEPARATOR: &str = "----------------------------------------";

/// Where the call audio ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLine {
    /// Uploaded; holds the shareable link
    Uploaded(String),

    /// Upload failed; the record carries a note instead of a link
    UploadFailed,
}

/// One record, ready to be prepended to the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub conversation_id: String,

    /// Human-readable call start
    pub timestamp: String,

    pub summary: Option<String>,

    /// Formatted transcript (placeholder already substituted)
    pub transcript: String,

    pub artifact: ArtifactLine,
}

impl DocumentRecord {
    /// Compose a record from raw parts.
    ///
    /// Blank summaries are dropped and an empty formatted transcript is
    /// replaced by [`EMPTY_TRANSCRIPT_PLACEHOLDER`].
    pub fn compose(
        conversation_id: &str,
        start_time: i64,
        summary: Option<&str>,
        transcript: &str,
        artifact: ArtifactLine,
    ) -> Self {
        let summary = summary
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let transcript = if transcript.trim().is_empty() {
            EMPTY_TRANSCRIPT_PLACEHOLDER.to_string()
        } else {
            transcript.to_string()
        };

        Self {
            conversation_id: conversation_id.to_string(),
            timestamp: format_timestamp(start_time),
            summary,
            transcript,
            artifact,
        }
    }

    /// The line pointing at the audio (or explaining why there is none)
    pub fn artifact_line(&self) -> String {
        match &self.artifact {
            ArtifactLine::Uploaded(link) => format!("Audio: {}", link),
            ArtifactLine::UploadFailed => {
                format!("Audio upload failed for conversation {}", self.conversation_id)
            }
        }
    }

    /// Render the block: header, optional summary, transcript, audio line,
    /// separator.
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str(&format!("Call {} ({})\n\n", self.timestamp, self.conversation_id));

        if let Some(summary) = &self.summary {
            out.push_str("Summary:\n");
            out.push_str(summary);
            out.push_str("\n\n");
        }

        out.push_str("Transcript:\n");
        out.push_str(&self.transcript);
        out.push_str("\n\n");

        out.push_str(&self.artifact_line());
        out.push('\n');
        out.push_str(RECORD_SEPARATOR);

        out
    }
}

/// Format transcript turns as `Role: message` lines.
///
/// Turns with no text are skipped. A blank line separates consecutive
/// emitted turns whose speakers differ.
pub fn format_transcript<'a, I>(turns: I) -> String
where
    I: IntoIterator<Item = &'a crate::domain::TranscriptTurn>,
{
    let mut lines: Vec<String> = Vec::new();
    let mut last_role: Option<&str> = None;

    for turn in turns {
        let message = match turn.message.as_deref().map(str::trim) {
            Some(m) if !m.is_empty() => m,
            _ => continue,
        };

        if let Some(prev) = last_role {
            if prev != turn.role {
                lines.push(String::new());
            }
        }

        lines.push(format!("{}: {}", capitalize(&turn.role), message));
        last_role = Some(turn.role.as_str());
    }

    lines.join("\n")
}

/// Upper-case the first character, lower-case the rest
fn capitalize(role: &str) -> String {
    let mut chars = role.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Unix seconds to `YYYY-MM-DD HH:MM:SS UTC`
pub fn format_timestamp(unix_secs: i64) -> String {
    match Utc.timestamp_opt(unix_secs, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => format!("{} (unix)", unix_secs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TranscriptTurn;

    #[test]
    fn test_blank_line_on_role_change_and_empty_suppressed() {
        let turns = vec![
            TranscriptTurn::new("agent", "Hi"),
            TranscriptTurn::new("user", "Hello"),
            TranscriptTurn::new("user", ""),
        ];
        assert_eq!(format_transcript(&turns), "Agent: Hi\n\nUser: Hello");
    }

    #[test]
    fn test_same_speaker_lines_stay_together() {
        let turns = vec![
            TranscriptTurn::new("agent", "Hi"),
            TranscriptTurn::new("agent", "How can I help?"),
            TranscriptTurn::new("user", "  Billing  "),
        ];
        assert_eq!(
            format_transcript(&turns),
            "Agent: Hi\nAgent: How can I help?\n\nUser: Billing"
        );
    }

    #[test]
    fn test_skipped_turn_does_not_count_as_role_change() {
        let turns = vec![
            TranscriptTurn::new("agent", "One"),
            TranscriptTurn {
                role: "user".to_string(),
                message: None,
            },
            TranscriptTurn::new("agent", "Two"),
        ];
        assert_eq!(format_transcript(&turns), "Agent: One\nAgent: Two");
    }

    #[test]
    fn test_empty_transcript() {
        let turns: Vec<TranscriptTurn> = Vec::new();
        assert_eq!(format_transcript(&turns), "");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("agent"), "Agent");
        assert_eq!(capitalize("USER"), "User");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_compose_substitutes_placeholder() {
        let record = DocumentRecord::compose("conv_1", 0, Some("   "), "", ArtifactLine::UploadFailed);
        assert_eq!(record.transcript, EMPTY_TRANSCRIPT_PLACEHOLDER);
        assert!(record.summary.is_none());
        assert_eq!(record.timestamp, "1970-01-01 00:00:00 UTC");
    }

    #[test]
    fn test_render_layout() {
        let record = DocumentRecord::compose(
            "conv_1",
            1_700_000_000,
            Some("Customer asked about billing."),
            "Agent: Hi\n\nUser: Hello",
            ArtifactLine::Uploaded("https://drive.example/file".to_string()),
        );

        let text = record.render();
        let header = text.find("Call 2023-11-14 22:13:20 UTC (conv_1)").unwrap();
        let summary = text.find("Summary:\nCustomer asked about billing.").unwrap();
        let transcript = text.find("Transcript:\nAgent: Hi").unwrap();
        let audio = text.find("Audio: https://drive.example/file").unwrap();

        assert!(header < summary && summary < transcript && transcript < audio);
        assert!(text.ends_with(RECORD_SEPARATOR));
    }

    #[test]
    fn test_render_without_summary_and_failed_upload() {
        let record = DocumentRecord::compose("conv_2", 0, None, "Agent: Hi", ArtifactLine::UploadFailed);
        let text = record.render();

        assert!(!text.contains("Summary:"));
        assert!(text.contains("Audio upload failed for conversation conv_2"));
    }
}
