//! Configuration options (§6 table) plus the derived filesystem paths every
//! other crate needs. Loading from the environment never fails: a malformed
//! value is a Configuration-class error (§7) — logged and replaced with the
//! documented default, not propagated.

use std::path::PathBuf;
use tracing::warn;

use crate::paths;

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            other => {
                warn!(key, value = other, "invalid boolean env var, using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(v) => v.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %v, "invalid integer env var, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// The §6 configuration table, plus the derived paths callers need.
#[derive(Debug, Clone)]
pub struct Config {
    pub identity_base_url: String,
    pub enable_claude_code_sync: bool,
    pub enable_claude_desktop_sync: bool,
    pub polling_interval_seconds: u64,
    pub license_public_key_pem: String,
    pub license_revocation_check_days: u64,

    /// Base URL of the conversation provider consumed by the remote-API
    /// client (§4.5). Not part of the §6 table proper — plumbing the client
    /// needs to be constructed at all.
    pub conversation_provider_base_url: String,
    /// Base URL of the cloud document-store endpoint (§4.6 step 3).
    pub document_service_base_url: String,
    /// Base URL of the cloud memory-retention endpoint (§4.6 step 4).
    pub memory_service_base_url: String,
    /// Tenant id stamped on every document POST (§4.6). No collaborator
    /// interface in §6 exposes this, so it is sourced from configuration;
    /// see DESIGN.md for the Open Question resolution.
    pub cloud_tenant_id: String,

    pub state_dir: PathBuf,
    pub db_path: PathBuf,
    pub offsets_path: PathBuf,
    pub log_dir: PathBuf,
    pub lock_path: PathBuf,
    pub control_socket_path: PathBuf,
    pub claude_projects_dir: PathBuf,
}

impl Config {
    /// Load configuration from the environment, falling back to documented
    /// defaults for anything missing or malformed.
    pub fn from_env() -> Self {
        let state_dir = paths::state_dir().unwrap_or_else(|| PathBuf::from(".ses"));
        Config {
            identity_base_url: env_string(
                "SES_IDENTITY_BASE_URL",
                "https://identity.example.invalid",
            ),
            enable_claude_code_sync: env_bool("SES_ENABLE_CLAUDE_CODE_SYNC", true),
            enable_claude_desktop_sync: env_bool("SES_ENABLE_CLAUDE_DESKTOP_SYNC", true),
            polling_interval_seconds: env_u64("SES_POLLING_INTERVAL_SECONDS", 30),
            license_public_key_pem: env_string("SES_LICENSE_PUBLIC_KEY_PEM", ""),
            license_revocation_check_days: env_u64("SES_LICENSE_REVOCATION_CHECK_DAYS", 7),

            conversation_provider_base_url: env_string(
                "SES_CONVERSATION_PROVIDER_BASE_URL",
                "https://claude.ai",
            ),
            document_service_base_url: env_string(
                "SES_DOCUMENT_SERVICE_BASE_URL",
                "https://documents.example.invalid",
            ),
            memory_service_base_url: env_string(
                "SES_MEMORY_SERVICE_BASE_URL",
                "https://memory.example.invalid",
            ),
            cloud_tenant_id: env_string("SES_CLOUD_TENANT_ID", ""),

            db_path: paths::db_path().unwrap_or_else(|| state_dir.join("local.db")),
            offsets_path: paths::offsets_path()
                .unwrap_or_else(|| state_dir.join("watcher-positions.json")),
            log_dir: paths::log_dir().unwrap_or_else(|| state_dir.join("logs")),
            lock_path: paths::lock_path().unwrap_or_else(|| state_dir.join("ses-local.lock")),
            control_socket_path: paths::control_socket_path()
                .unwrap_or_else(|| state_dir.join("daemon.sock")),
            claude_projects_dir: paths::claude_projects_dir()
                .unwrap_or_else(|| state_dir.join("claude-projects-unresolved")),
            state_dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_match_documented_table() {
        std::env::remove_var("SES_ENABLE_CLAUDE_CODE_SYNC");
        std::env::remove_var("SES_ENABLE_CLAUDE_DESKTOP_SYNC");
        std::env::remove_var("SES_POLLING_INTERVAL_SECONDS");
        std::env::remove_var("SES_LICENSE_REVOCATION_CHECK_DAYS");
        std::env::remove_var("SES_LICENSE_PUBLIC_KEY_PEM");

        let cfg = Config::from_env();
        assert!(cfg.enable_claude_code_sync);
        assert!(cfg.enable_claude_desktop_sync);
        assert_eq!(cfg.polling_interval_seconds, 30);
        assert_eq!(cfg.license_revocation_check_days, 7);
        assert_eq!(cfg.license_public_key_pem, "");
    }

    #[test]
    #[serial]
    fn malformed_bool_falls_back_to_default() {
        std::env::set_var("SES_ENABLE_CLAUDE_CODE_SYNC", "not-a-bool");
        let cfg = Config::from_env();
        assert!(cfg.enable_claude_code_sync);
        std::env::remove_var("SES_ENABLE_CLAUDE_CODE_SYNC");
    }

    #[test]
    #[serial]
    fn explicit_false_gate_is_honored() {
        std::env::set_var("SES_ENABLE_CLAUDE_DESKTOP_SYNC", "false");
        let cfg = Config::from_env();
        assert!(!cfg.enable_claude_desktop_sync);
        std::env::remove_var("SES_ENABLE_CLAUDE_DESKTOP_SYNC");
    }

    #[test]
    #[serial]
    fn malformed_int_falls_back_to_default() {
        std::env::set_var("SES_POLLING_INTERVAL_SECONDS", "soon");
        let cfg = Config::from_env();
        assert_eq!(cfg.polling_interval_seconds, 30);
        std::env::remove_var("SES_POLLING_INTERVAL_SECONDS");
    }
}
