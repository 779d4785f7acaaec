// crates/core/src/error.rs
//! Error taxonomy shared across the ingestion/store/sync triangle (§7).
//!
//! Each crate that touches I/O defines its own `thiserror` enum at its own
//! seam, but they all collapse into the same handful of *kinds* so that
//! callers can branch on "does this abort the pass, or just skip one
//! record" without matching on every concrete variant.

use std::path::PathBuf;
use thiserror::Error;

/// The taxonomy from §7: every error in the system is one of these kinds.
/// `ErrorKind` is derived from a concrete error, never constructed directly
/// by a fallible operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input line/byte: log-debug, skip, continue.
    Parse,
    /// Non-2xx or network exception against cloud: log-warn, skip record.
    TransientRemote,
    /// No bearer available: log-debug, abort current pass (not the process).
    AuthAbsent,
    /// 401/403 on optional endpoints: silently succeed (feature unavailable).
    AuthInsufficient,
    /// Statement or constraint failure: propagate within the batch.
    Storage,
    /// Missing directory or gated feature: log-info and idle the component.
    Configuration,
    /// Single-instance lock held: exit 0 with stderr notice.
    Fatal,
}

impl ErrorKind {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::Fatal)
    }
}

/// Errors raised while watching and parsing local data sources (§4.2–§4.4).
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("session-log file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("permission denied reading {path}")]
    PermissionDenied { path: PathBuf },

    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("home directory could not be determined")]
    HomeDirNotFound,
}

impl IngestError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::NotFound { .. } => ErrorKind::Configuration,
            IngestError::PermissionDenied { .. } => ErrorKind::Configuration,
            IngestError::Io { .. } => ErrorKind::Parse,
            IngestError::HomeDirNotFound => ErrorKind::Configuration,
        }
    }
}

/// Errors raised by remote HTTP calls (§4.5, §4.6, §4.8).
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("no bearer credential available")]
    AuthAbsent,

    #[error("insufficient auth scope ({status})")]
    AuthInsufficient { status: u16 },

    #[error("remote returned {status}: {body}")]
    Transient { status: u16, body: String },
}

impl RemoteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RemoteError::Network(_) => ErrorKind::TransientRemote,
            RemoteError::AuthAbsent => ErrorKind::AuthAbsent,
            RemoteError::AuthInsufficient { .. } => ErrorKind::AuthInsufficient,
            RemoteError::Transient { .. } => ErrorKind::TransientRemote,
        }
    }
}
