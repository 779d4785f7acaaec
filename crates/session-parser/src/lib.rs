//! Pure JSONL-line parsing for session-log files (§4.2, §3).
//!
//! No I/O, no database: every function here takes already-read bytes/lines
//! and returns plain values. The session-log watcher (in `ses-ingest`) owns
//! the file reading, offset tracking, and database calls; this crate owns
//! only "what does this one line mean".

mod classify;
mod extract;
mod metadata;

pub use classify::{classify_tool_result, classify_tool_use, extract_file_path};
pub use metadata::{derive_session_metadata, SessionMetadata};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use ses_types::{ConversationMessage, ConversationObservation};

/// One line of a session-log JSONL file, parsed just enough to dispatch on.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEntry {
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(default)]
    pub message: Option<serde_json::Value>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
}

/// Parse one raw JSONL line into a [`RawEntry`]. Returns `None` on malformed
/// JSON or a missing/non-string `type` field — the caller logs this at debug
/// and skips the line, per §4.2 step 3.
pub fn parse_line(line: &str) -> Option<RawEntry> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

fn entry_timestamp(entry: &RawEntry) -> DateTime<Utc> {
    entry
        .timestamp
        .as_deref()
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

/// Output of extracting one `user`/`assistant` line: the legacy concatenated
/// message (always produced) and zero or more structured observations (only
/// for array-shaped content, per §4.2 step 3).
#[derive(Debug, Default)]
pub struct LineExtraction {
    pub message: Option<ConversationMessage>,
    pub observations: Vec<ConversationObservation>,
    /// Block id -> index into `observations`, for tool_use blocks. Consumed
    /// by the caller to resolve `deferred_parent_refs` within the same batch.
    pub tool_use_block_ids: Vec<(String, usize)>,
    /// index into `observations` -> the `tool_use_id` it references. Left
    /// unresolved (`parent_observation_id` stays `None`) if the referenced
    /// block id never appears in `tool_use_block_ids` within this batch
    /// (§9: parent linking does not cross batches).
    pub deferred_parent_refs: Vec<(usize, String)>,
}

/// Extract the legacy message plus structured observations from one
/// `user`/`assistant` [`RawEntry`], per §4.2 step 3 and §3's classification
/// rules.
///
/// `next_sequence` is the next `sequence_number` to assign within the
/// session being processed; it is advanced by the number of observations
/// produced.
pub fn extract_line(entry: &RawEntry, next_sequence: &mut i64) -> LineExtraction {
    match entry.entry_type.as_str() {
        "user" => extract::extract_user(entry, next_sequence),
        "assistant" => extract::extract_assistant(entry, next_sequence),
        _ => LineExtraction::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_line_skips_malformed_json() {
        assert!(parse_line("not json").is_none());
    }

    #[test]
    fn parse_line_skips_blank_lines() {
        assert!(parse_line("   ").is_none());
    }

    #[test]
    fn parse_line_skips_missing_type_field() {
        assert!(parse_line(r#"{"message":"hi"}"#).is_none());
    }

    #[test]
    fn parse_line_accepts_well_formed_entry() {
        let entry = parse_line(r#"{"type":"user","timestamp":"2026-01-01T00:00:00Z"}"#).unwrap();
        assert_eq!(entry.entry_type, "user");
    }

    #[test]
    fn extract_line_on_unknown_type_is_a_no_op() {
        let entry = RawEntry {
            entry_type: "system".to_string(),
            message: None,
            timestamp: None,
            cwd: None,
        };
        let mut seq = 0;
        let extraction = extract_line(&entry, &mut seq);
        assert!(extraction.message.is_none());
        assert!(extraction.observations.is_empty());
        assert_eq!(seq, 0);
    }
}
