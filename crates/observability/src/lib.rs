//! Tracing setup for the daemon: an `EnvFilter`-driven compact layer on
//! stderr plus a JSON-lines layer rolling daily under the app's state
//! directory (§6), in the same layered-`Registry` style production Rust
//! services build their subscriber.
//!
//! Every suspension-point error (§5) is logged at the level its error kind
//! implies (§7): `debug` for Parse/AuthAbsent, `warn` for TransientRemote,
//! `error` for Storage, `info` for Configuration. Auth-insufficient is
//! intentionally silent — it is an expected "feature unavailable" outcome.

use std::path::Path;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Holds the non-blocking file writer's flush guard. Must be kept alive for
/// the process lifetime — dropping it stops the background flush thread.
pub struct LoggingGuard {
    _file_guard: tracing_appender::non_blocking::WorkerGuard,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("SES_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Build and install the global subscriber. `log_dir` is created if it does
/// not already exist; failure to create it falls back to stderr-only
/// logging rather than failing startup (a Configuration-class condition,
/// not fatal).
pub fn init(log_dir: &Path) -> LoggingGuard {
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false).compact();

    if std::fs::create_dir_all(log_dir).is_err() {
        eprintln!("failed to create log directory {}, logging to stderr only", log_dir.display());
        let (sink, guard) = tracing_appender::non_blocking(std::io::sink());
        drop(sink);
        Registry::default().with(env_filter()).with(stderr_layer).init();
        return LoggingGuard { _file_guard: guard };
    }

    let file_appender = tracing_appender::rolling::daily(log_dir, "ses-local.log");
    let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer().with_writer(non_blocking).json().with_ansi(false);

    Registry::default().with(env_filter()).with(stderr_layer).with(file_layer).init();

    LoggingGuard { _file_guard: file_guard }
}
