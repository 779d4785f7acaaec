//! The three watchers: session-log watcher (§4.2), local-storage scanner
//! (§4.3), cookie extractor (§4.4).

pub mod cookie_extractor;
pub mod ldb_scanner;
pub mod offsets;
pub mod session_log_watcher;

pub use cookie_extractor::get_claude_cookie;
pub use ldb_scanner::{scan_directory, LdbScanner};
pub use offsets::OffsetMap;
pub use session_log_watcher::{IngestFileError, SessionLogWatcher};
