//! Legacy-message and structured-observation extraction from `user`/
//! `assistant` lines (§4.2 step 3).

use chrono::{DateTime, Utc};
use ses_types::{ConversationMessage, ConversationObservation, ObservationType, Role};

use crate::classify::{classify_tool_result, classify_tool_use, extract_file_path};
use crate::{entry_timestamp, LineExtraction, RawEntry};

/// `session_id` is unknown at parse time (the database assigns it on
/// upsert); callers fill it in afterwards. We use `0` as a placeholder the
/// caller is expected to overwrite before persisting.
const PLACEHOLDER_SESSION_ID: i64 = 0;

pub fn extract_user(entry: &RawEntry, next_sequence: &mut i64) -> LineExtraction {
    extract_common(entry, Role::User, next_sequence)
}

pub fn extract_assistant(entry: &RawEntry, next_sequence: &mut i64) -> LineExtraction {
    extract_common(entry, Role::Assistant, next_sequence)
}

fn extract_common(entry: &RawEntry, role: Role, next_sequence: &mut i64) -> LineExtraction {
    let mut result = LineExtraction::default();

    let Some(message) = entry.message.as_ref() else {
        return result;
    };

    let created_at = entry_timestamp(entry);
    let usage_tokens = message.get("usage").and_then(token_count_from_usage);

    match message.get("content") {
        Some(serde_json::Value::String(text)) => {
            result.message = Some(legacy_message(role, text.clone(), created_at, usage_tokens));
        }
        Some(serde_json::Value::Array(blocks)) => {
            let mut text_parts = Vec::new();

            for block in blocks {
                let block_type = block.get("type").and_then(|v| v.as_str()).unwrap_or("");
                match block_type {
                    "text" => {
                        let text = block_text(block);
                        text_parts.push(text.clone());
                        push_observation(
                            &mut result,
                            next_sequence,
                            created_at,
                            ObservationType::Text,
                            None,
                            None,
                            text,
                            None,
                            block,
                        );
                    }
                    "thinking" => {
                        let text = block_text(block);
                        text_parts.push(format!("[thinking] {text}"));
                        push_observation(
                            &mut result,
                            next_sequence,
                            created_at,
                            ObservationType::Thinking,
                            None,
                            None,
                            text,
                            None,
                            block,
                        );
                    }
                    "tool_use" => {
                        let tool_name = block
                            .get("name")
                            .and_then(|v| v.as_str())
                            .unwrap_or("unknown")
                            .to_string();
                        let command = block
                            .get("input")
                            .and_then(|input| input.get("command"))
                            .and_then(|v| v.as_str());
                        let input = block.get("input").cloned().unwrap_or(serde_json::Value::Null);
                        let file_path = extract_file_path(&input);
                        let obs_type = classify_tool_use(&tool_name, command);
                        text_parts.push(format!("[tool_use: {tool_name}]"));
                        let block_id = block.get("id").and_then(|v| v.as_str()).map(str::to_string);
                        let index = push_observation(
                            &mut result,
                            next_sequence,
                            created_at,
                            obs_type,
                            Some(tool_name),
                            file_path,
                            input.to_string(),
                            None,
                            block,
                        );
                        if let Some(block_id) = block_id {
                            result.tool_use_block_ids.push((block_id, index));
                        }
                    }
                    "tool_result" => {
                        let content = tool_result_text(block);
                        text_parts.push(format!("[tool_result] {content}"));
                        let obs_type = classify_tool_result(&content);
                        let index = push_observation(
                            &mut result,
                            next_sequence,
                            created_at,
                            obs_type,
                            None,
                            None,
                            content,
                            None,
                            block,
                        );
                        if let Some(tool_use_id) =
                            block.get("tool_use_id").and_then(|v| v.as_str())
                        {
                            result
                                .deferred_parent_refs
                                .push((index, tool_use_id.to_string()));
                        }
                    }
                    _ => {}
                }
            }

            let legacy_text = text_parts.join("\n");
            result.message = Some(legacy_message(role, legacy_text, created_at, usage_tokens));
        }
        _ => {}
    }

    result
}

#[allow(clippy::too_many_arguments)]
fn push_observation(
    result: &mut LineExtraction,
    next_sequence: &mut i64,
    created_at: DateTime<Utc>,
    observation_type: ObservationType,
    tool_name: Option<String>,
    file_path: Option<String>,
    content: String,
    parent_observation_id: Option<i64>,
    _block: &serde_json::Value,
) -> usize {
    let sequence_number = *next_sequence;
    *next_sequence += 1;

    let observation = ConversationObservation {
        id: None,
        session_id: PLACEHOLDER_SESSION_ID,
        observation_type,
        tool_name,
        file_path,
        content,
        token_count: None,
        sequence_number,
        parent_observation_id,
        created_at,
    };
    result.observations.push(observation);
    result.observations.len() - 1
}

fn legacy_message(
    role: Role,
    content: String,
    created_at: DateTime<Utc>,
    token_count: Option<i64>,
) -> ConversationMessage {
    ConversationMessage {
        id: None,
        session_id: PLACEHOLDER_SESSION_ID,
        role,
        content,
        created_at,
        token_count,
    }
}

fn block_text(block: &serde_json::Value) -> String {
    block
        .get("text")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn tool_result_text(block: &serde_json::Value) -> String {
    match block.get("content") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|v| v.as_str()))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn token_count_from_usage(usage: &serde_json::Value) -> Option<i64> {
    let input = usage.get("input_tokens").and_then(|v| v.as_i64());
    let output = usage.get("output_tokens").and_then(|v| v.as_i64());
    match (input, output) {
        (None, None) => None,
        _ => Some(input.unwrap_or(0) + output.unwrap_or(0)),
    }
}
