//! Centralized path functions for all app storage locations (§6 Filesystem layout).
//!
//! Single source of truth — eliminates ad-hoc `dirs::home_dir().join(...)`
//! scattered across crates.

use std::path::PathBuf;

/// App state root: `~/.ses/`.
pub fn state_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|d| d.join(".ses"))
}

/// Local store database: `~/.ses/local.db` (plus its `-wal`/`-shm` sidecars).
pub fn db_path() -> Option<PathBuf> {
    state_dir().map(|d| d.join("local.db"))
}

/// Watcher offsets: `~/.ses/watcher-positions.json`.
pub fn offsets_path() -> Option<PathBuf> {
    state_dir().map(|d| d.join("watcher-positions.json"))
}

/// Rolling log directory: `~/.ses/logs/`.
pub fn log_dir() -> Option<PathBuf> {
    state_dir().map(|d| d.join("logs"))
}

/// Single-instance lock file: `~/.ses/ses-local.lock`.
pub fn lock_path() -> Option<PathBuf> {
    state_dir().map(|d| d.join("ses-local.lock"))
}

/// Control-plane socket path.
///
/// Unix: `~/.ses/daemon.sock`. Windows: a well-known named-pipe path (not a
/// filesystem path, returned here only so callers can log/display it).
#[cfg(unix)]
pub fn control_socket_path() -> Option<PathBuf> {
    state_dir().map(|d| d.join("daemon.sock"))
}

#[cfg(windows)]
pub fn control_socket_path() -> Option<PathBuf> {
    Some(PathBuf::from(r"\\.\pipe\ses-local-daemon"))
}

/// Third-party session-log root: `~/.claude/projects/`.
pub fn claude_projects_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|d| d.join(".claude").join("projects"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_dir_is_dot_ses_under_home() {
        let dir = state_dir().expect("home dir resolvable in test env");
        assert!(dir.ends_with(".ses"));
    }

    #[test]
    fn db_path_lives_under_state_dir() {
        let path = db_path().unwrap();
        assert!(path.ends_with("local.db"));
        assert_eq!(path.parent().unwrap().file_name().unwrap(), ".ses");
    }

    #[test]
    fn offsets_path_is_watcher_positions_json() {
        let path = offsets_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "watcher-positions.json");
    }

    #[test]
    fn claude_projects_dir_matches_documented_layout() {
        let path = claude_projects_dir().unwrap();
        assert!(path.ends_with(".claude/projects") || path.ends_with(".claude\\projects"));
    }
}
