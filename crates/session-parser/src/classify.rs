//! Observation classification rules (§3): ordinal-ignore-case substring
//! matches on the tool name, command text, or result content.

use ses_types::ObservationType;

const TEST_COMMANDS: &[&str] = &["dotnet test", "npm test", "pytest", "yarn test"];
const ERROR_MARKERS: &[&str] = &["error", "exception", "failed"];

/// Classify a `tool_use` block, given the tool name and (for `Bash`) its
/// command string.
pub fn classify_tool_use(tool_name: &str, command: Option<&str>) -> ObservationType {
    if tool_name.eq_ignore_ascii_case("bash") {
        if let Some(command) = command {
            let lower = command.to_ascii_lowercase();
            if lower.contains("git commit") {
                return ObservationType::GitCommit;
            }
            if TEST_COMMANDS.iter().any(|needle| lower.contains(needle)) {
                return ObservationType::TestResult;
            }
        }
    }
    ObservationType::ToolUse
}

/// Classify a `tool_result` block by scanning its content for error markers.
pub fn classify_tool_result(content: &str) -> ObservationType {
    let lower = content.to_ascii_lowercase();
    if ERROR_MARKERS.iter().any(|needle| lower.contains(needle)) {
        ObservationType::Error
    } else {
        ObservationType::ToolResult
    }
}

/// Extract a file path from a tool_use block's `input` object, checking
/// `path`, `file_path`, and `filename` keys in that order (§3).
pub fn extract_file_path(input: &serde_json::Value) -> Option<String> {
    for key in ["path", "file_path", "filename"] {
        if let Some(s) = input.get(key).and_then(|v| v.as_str()) {
            return Some(s.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bash_git_commit_is_classified_as_git_commit() {
        let t = classify_tool_use("Bash", Some("git commit -m 'msg'"));
        assert_eq!(t, ObservationType::GitCommit);
    }

    #[test]
    fn bash_git_commit_matches_case_insensitively() {
        let t = classify_tool_use("bash", Some("GIT COMMIT -am x"));
        assert_eq!(t, ObservationType::GitCommit);
    }

    #[test]
    fn bash_test_commands_are_classified_as_test_result() {
        for cmd in ["pytest -v", "npm test", "yarn test", "dotnet test"] {
            assert_eq!(classify_tool_use("Bash", Some(cmd)), ObservationType::TestResult);
        }
    }

    #[test]
    fn other_bash_commands_are_classified_as_tool_use() {
        assert_eq!(classify_tool_use("Bash", Some("ls -la")), ObservationType::ToolUse);
    }

    #[test]
    fn non_bash_tools_are_always_tool_use() {
        assert_eq!(classify_tool_use("Read", Some("git commit")), ObservationType::ToolUse);
    }

    #[test]
    fn tool_result_with_error_marker_is_classified_as_error() {
        assert_eq!(
            classify_tool_result("NullReferenceException at line 42"),
            ObservationType::Error
        );
        assert_eq!(classify_tool_result("Build FAILED"), ObservationType::Error);
        assert_eq!(classify_tool_result("connection error: timeout"), ObservationType::Error);
    }

    #[test]
    fn tool_result_without_error_marker_is_plain_tool_result() {
        assert_eq!(classify_tool_result("ok, file written"), ObservationType::ToolResult);
    }

    #[test]
    fn extract_file_path_checks_keys_in_documented_order() {
        let input = serde_json::json!({"file_path": "/b.rs", "filename": "/c.rs"});
        assert_eq!(extract_file_path(&input), Some("/b.rs".to_string()));

        let input = serde_json::json!({"path": "/a.rs"});
        assert_eq!(extract_file_path(&input), Some("/a.rs".to_string()));

        let input = serde_json::json!({"filename": "/c.rs"});
        assert_eq!(extract_file_path(&input), Some("/c.rs".to_string()));
    }

    #[test]
    fn extract_file_path_returns_none_when_absent() {
        let input = serde_json::json!({"other": "value"});
        assert_eq!(extract_file_path(&input), None);
    }
}
