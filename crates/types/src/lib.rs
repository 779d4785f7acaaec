//! Shared data model for ses-local: the `ConversationSession` /
//! `ConversationMessage` / `ConversationObservation` hierarchy and the sync
//! ledger, plus the small enums that classify them.
//!
//! This crate is intentionally inert: no I/O, no database driver, no HTTP
//! client. Every other crate in the workspace depends on it; it depends on
//! nothing but `serde`/`chrono`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which assistant surface produced a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    ClaudeChat,
    ClaudeCode,
    Cowork,
    ChatGpt,
}

impl Source {
    /// The string stored in the `sessions.source` column.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Source::ClaudeChat => "claude_chat",
            Source::ClaudeCode => "claude_code",
            Source::Cowork => "cowork",
            Source::ChatGpt => "chat_gpt",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "claude_chat" => Some(Source::ClaudeChat),
            "claude_code" => Some(Source::ClaudeCode),
            "cowork" => Some(Source::Cowork),
            "chat_gpt" => Some(Source::ChatGpt),
            _ => None,
        }
    }
}

/// A single user/assistant turn's role. Stored verbatim as `"user"` /
/// `"assistant"` per the data model (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// Classification of one structured content block (§3 classification rules).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationType {
    ToolUse,
    ToolResult,
    Text,
    Thinking,
    GitCommit,
    TestResult,
    Error,
}

impl ObservationType {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ObservationType::ToolUse => "tool_use",
            ObservationType::ToolResult => "tool_result",
            ObservationType::Text => "text",
            ObservationType::Thinking => "thinking",
            ObservationType::GitCommit => "git_commit",
            ObservationType::TestResult => "test_result",
            ObservationType::Error => "error",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "tool_use" => Some(ObservationType::ToolUse),
            "tool_result" => Some(ObservationType::ToolResult),
            "text" => Some(ObservationType::Text),
            "thinking" => Some(ObservationType::Thinking),
            "git_commit" => Some(ObservationType::GitCommit),
            "test_result" => Some(ObservationType::TestResult),
            "error" => Some(ObservationType::Error),
            _ => None,
        }
    }
}

/// One conversation from any source. `id` is populated by the store on
/// upsert; `(source, external_id)` is the natural key (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub id: Option<i64>,
    pub source: Source,
    pub external_id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub synced_at: Option<DateTime<Utc>>,
    pub content_hash: String,
}

impl ConversationSession {
    /// A session qualifies as pending sync when `synced_at` is absent or the
    /// session has been touched since the last sync (§3 SyncLedger invariant).
    pub fn is_pending_sync(&self) -> bool {
        match self.synced_at {
            None => true,
            Some(synced_at) => self.updated_at > synced_at,
        }
    }
}

/// One user/assistant turn, exclusively owned by its session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: Option<i64>,
    pub session_id: i64,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub token_count: Option<i64>,
}

/// One structured content block extracted from a session (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationObservation {
    pub id: Option<i64>,
    pub session_id: i64,
    pub observation_type: ObservationType,
    pub tool_name: Option<String>,
    pub file_path: Option<String>,
    pub content: String,
    pub token_count: Option<i64>,
    pub sequence_number: i64,
    pub parent_observation_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// One row of cloud delivery state, keyed by `(source, external_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLedgerRow {
    pub source: Source,
    pub external_id: String,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub doc_service_id: Option<String>,
    pub memory_synced: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_round_trips_through_db_str() {
        for s in [Source::ClaudeChat, Source::ClaudeCode, Source::Cowork, Source::ChatGpt] {
            assert_eq!(Source::from_db_str(s.as_db_str()), Some(s));
        }
    }

    #[test]
    fn observation_type_round_trips_through_db_str() {
        let all = [
            ObservationType::ToolUse,
            ObservationType::ToolResult,
            ObservationType::Text,
            ObservationType::Thinking,
            ObservationType::GitCommit,
            ObservationType::TestResult,
            ObservationType::Error,
        ];
        for t in all {
            assert_eq!(ObservationType::from_db_str(t.as_db_str()), Some(t));
        }
    }

    #[test]
    fn pending_sync_when_never_synced() {
        let s = ConversationSession {
            id: Some(1),
            source: Source::ClaudeCode,
            external_id: "x".into(),
            title: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            synced_at: None,
            content_hash: "0".repeat(16),
        };
        assert!(s.is_pending_sync());
    }

    #[test]
    fn not_pending_when_synced_after_update() {
        let now = Utc::now();
        let s = ConversationSession {
            id: Some(1),
            source: Source::ClaudeCode,
            external_id: "x".into(),
            title: None,
            created_at: now,
            updated_at: now,
            synced_at: Some(now + chrono::Duration::seconds(1)),
            content_hash: "0".repeat(16),
        };
        assert!(!s.is_pending_sync());
    }

    #[test]
    fn pending_when_updated_after_sync() {
        let now = Utc::now();
        let s = ConversationSession {
            id: Some(1),
            source: Source::ClaudeCode,
            external_id: "x".into(),
            title: None,
            created_at: now,
            updated_at: now + chrono::Duration::seconds(5),
            synced_at: Some(now),
            content_hash: "0".repeat(16),
        };
        assert!(s.is_pending_sync());
    }
}
