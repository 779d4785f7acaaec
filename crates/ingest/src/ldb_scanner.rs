//! Scans a third-party client's `.ldb` local-storage directory for
//! conversation UUIDs without parsing its on-disk format (§4.3).
//!
//! The producing client writes keys as cleartext strings inside an
//! append-structured database; a printable-ASCII byte scan plus a regex
//! match is enough to recover them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const MIN_PRINTABLE_RUN: usize = 8;
const DEBOUNCE: Duration = Duration::from_secs(3);
const FALLBACK_RESCAN: Duration = Duration::from_secs(60);

fn uuid_pattern() -> Regex {
    Regex::new(r"(?i)LSS-([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}):").expect("valid regex")
}

/// Scan every `*.ldb` file directly under `dir` and return the deduplicated,
/// lowercased set of UUIDs found in `LSS-<uuid>:` keys.
pub fn scan_directory(dir: &Path) -> HashSet<String> {
    let mut uuids = HashSet::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("failed to read ldb directory {}: {e}", dir.display());
            return uuids;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("ldb") {
            continue;
        }
        match scan_file(&path) {
            Ok(found) => uuids.extend(found),
            Err(e) => warn!("failed to scan {}: {e}", path.display()),
        }
    }

    uuids
}

fn scan_file(path: &Path) -> std::io::Result<HashSet<String>> {
    let temp_dir = tempfile::tempdir()?;
    let temp_path = temp_dir.path().join("scan.ldb");
    std::fs::copy(path, &temp_path)?;

    let result = (|| -> std::io::Result<HashSet<String>> {
        let file = std::fs::File::open(&temp_path)?;
        let metadata = file.metadata()?;
        let bytes = if metadata.len() == 0 {
            Vec::new()
        } else {
            match unsafe { memmap2::Mmap::map(&file) } {
                Ok(mmap) => mmap.to_vec(),
                Err(_) => std::fs::read(&temp_path)?,
            }
        };
        Ok(extract_uuids(&bytes))
    })();

    // Temp dir (and its file) is removed on drop regardless of the branch
    // above, satisfying "delete the temp copy on every exit path".
    drop(temp_dir);
    result
}

fn extract_uuids(bytes: &[u8]) -> HashSet<String> {
    let runs = printable_ascii_runs(bytes);
    let haystack = runs.join("\n");
    let pattern = uuid_pattern();
    pattern
        .captures_iter(&haystack)
        .map(|c| c[1].to_ascii_lowercase())
        .collect()
}

fn printable_ascii_runs(bytes: &[u8]) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for &b in bytes {
        if b.is_ascii_graphic() || b == b' ' {
            current.push(b);
        } else if !current.is_empty() {
            if current.len() >= MIN_PRINTABLE_RUN {
                runs.push(String::from_utf8_lossy(&current).into_owned());
            }
            current.clear();
        }
    }
    if current.len() >= MIN_PRINTABLE_RUN {
        runs.push(String::from_utf8_lossy(&current).into_owned());
    }
    runs
}

/// Wraps [`scan_directory`] with a `notify` watch (3-second leading-edge
/// debounce, coalescing further events within the window) plus a periodic
/// fallback scan. Every scan that finds at least one UUID is sent on
/// `events` for the activity notifier to pick up.
pub struct LdbScanner {
    dir: PathBuf,
}

impl LdbScanner {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub async fn run(self, events: mpsc::Sender<HashSet<String>>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let (fs_tx, mut fs_rx) = mpsc::channel::<()>(64);

        let dir = self.dir.clone();
        let mut watcher = match notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let touches_ldb = event
                    .paths
                    .iter()
                    .any(|p| p.extension().and_then(|e| e.to_str()) == Some("ldb"));
                if touches_ldb {
                    let _ = fs_tx.try_send(());
                }
            }
        }) {
            Ok(w) => Some(w),
            Err(e) => {
                warn!("failed to start ldb scanner watch: {e}");
                None
            }
        };

        if let Some(watcher) = watcher.as_mut() {
            if dir.exists() {
                if let Err(e) = notify::Watcher::watch(watcher, &dir, notify::RecursiveMode::NonRecursive) {
                    warn!("failed to watch {}: {e}", dir.display());
                }
            }
        }

        let mut fallback = tokio::time::interval(FALLBACK_RESCAN);
        let mut debounce_deadline: Option<tokio::time::Instant> = None;

        loop {
            let sleep = async {
                match debounce_deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                Some(()) = fs_rx.recv() => {
                    if debounce_deadline.is_none() {
                        debounce_deadline = Some(tokio::time::Instant::now() + DEBOUNCE);
                    }
                    // else: coalesced into the already-pending window
                }
                _ = sleep => {
                    debounce_deadline = None;
                    self.scan_and_notify(&events).await;
                }
                _ = fallback.tick() => {
                    self.scan_and_notify(&events).await;
                }
            }
        }
    }

    async fn scan_and_notify(&self, events: &mpsc::Sender<HashSet<String>>) {
        let dir = self.dir.clone();
        let found = tokio::task::spawn_blocking(move || scan_directory(&dir))
            .await
            .unwrap_or_default();
        if !found.is_empty() {
            debug!("ldb scan found {} uuid(s)", found.len());
            let _ = events.send(found).await;
        }
    }
}
