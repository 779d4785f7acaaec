//! Watches `~/.claude/projects/` for appended JSONL lines and ingests them
//! into the local store (§4.2).
//!
//! Restart safety is handled by [`OffsetMap`]: each file is read starting
//! at its last persisted byte offset, never from the top. `notify` drives
//! fast-path updates; a periodic re-scan is the fallback for events the
//! watcher misses (renames across directories, coalesced bursts, etc).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use notify::{RecursiveMode, Watcher};
use ses_db::Database;
use ses_session_parser::{derive_session_metadata, extract_line, parse_line};
use ses_types::{ConversationObservation, ConversationSession, Source};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, warn};

use crate::offsets::OffsetMap;

/// Owns the offset map and drives ingestion of one or more session-log
/// directory trees.
pub struct SessionLogWatcher {
    db: Database,
    offsets: Arc<Mutex<OffsetMap>>,
    offsets_path: PathBuf,
}

impl SessionLogWatcher {
    pub async fn new(db: Database, offsets_path: PathBuf) -> Self {
        let offsets = OffsetMap::load(&offsets_path).await;
        Self { db, offsets: Arc::new(Mutex::new(offsets)), offsets_path }
    }

    /// Process every `.jsonl` file already on disk under `root` once.
    /// Called at startup before the watcher attaches, so in-flight changes
    /// made while the daemon was down are not lost.
    pub async fn initial_scan(&self, root: &Path) -> usize {
        let mut processed = 0;
        for path in discover_jsonl_files(root) {
            match self.ingest_file(&path).await {
                Ok(()) => processed += 1,
                Err(e) => warn!("failed to ingest {}: {e}", path.display()),
            }
        }
        self.persist_offsets().await;
        processed
    }

    /// Start a `notify` watch plus a periodic re-scan loop. Runs until
    /// `shutdown` resolves.
    pub async fn run(self: Arc<Self>, root: PathBuf, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let (tx, mut rx) = mpsc::channel::<PathBuf>(256);

        let mut watcher = match notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                for path in event.paths {
                    if path.extension().and_then(|e| e.to_str()) == Some("jsonl")
                        && tx.try_send(path).is_err()
                    {
                        // channel full or closed: periodic rescan will catch up
                    }
                }
            }
        }) {
            Ok(w) => Some(w),
            Err(e) => {
                error!("failed to start session-log watcher: {e}");
                None
            }
        };

        if let Some(watcher) = watcher.as_mut() {
            if root.exists() {
                if let Err(e) = watcher.watch(&root, RecursiveMode::Recursive) {
                    error!("failed to watch {}: {e}", root.display());
                }
            }
        }

        let mut rescan_interval = tokio::time::interval(Duration::from_secs(30));

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                Some(path) = rx.recv() => {
                    if let Err(e) = self.ingest_file(&path).await {
                        warn!("failed to ingest {}: {e}", path.display());
                    }
                    self.persist_offsets().await;
                }
                _ = rescan_interval.tick() => {
                    for path in discover_jsonl_files(&root) {
                        if let Err(e) = self.ingest_file(&path).await {
                            warn!("failed to ingest {}: {e}", path.display());
                        }
                    }
                    self.persist_offsets().await;
                }
            }
        }
    }

    async fn persist_offsets(&self) {
        let offsets = self.offsets.lock().await;
        if let Err(e) = offsets.save(&self.offsets_path).await {
            warn!("failed to persist watcher offsets: {e}");
        }
    }

    /// Read `path` from its last offset to EOF and ingest any complete
    /// lines. Safe to call repeatedly on the same file — it is idempotent
    /// at the database layer (§8).
    pub async fn ingest_file(&self, path: &Path) -> Result<(), IngestFileError> {
        use tokio::io::{AsyncReadExt, AsyncSeekExt};

        let offset = {
            let offsets = self.offsets.lock().await;
            offsets.get(path)
        };

        let mut file = match tokio::fs::File::open(path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(IngestFileError::Io(e)),
        };

        let metadata = file.metadata().await.map_err(IngestFileError::Io)?;
        if metadata.len() < offset {
            // File was truncated/replaced; restart from the top.
            file.seek(std::io::SeekFrom::Start(0)).await.map_err(IngestFileError::Io)?;
        } else {
            file.seek(std::io::SeekFrom::Start(offset)).await.map_err(IngestFileError::Io)?;
        }

        let mut buf = String::new();
        file.read_to_string(&mut buf).await.map_err(IngestFileError::Io)?;

        // Only bytes up to and including the last newline are a complete
        // line; a trailing partial line (still being written) is left
        // unconsumed so the next read starts from its beginning instead of
        // losing it (§8 restart-safety: no gaps).
        let consumed = match buf.rfind('\n') {
            Some(idx) => idx + 1,
            None => 0,
        };
        let new_offset = offset + consumed as u64;

        let lines: Vec<&str> = buf[..consumed].lines().collect();
        if lines.is_empty() {
            let mut offsets = self.offsets.lock().await;
            offsets.set(path, new_offset);
            return Ok(());
        }

        self.ingest_lines(path, &lines).await?;

        let mut offsets = self.offsets.lock().await;
        offsets.set(path, new_offset);
        Ok(())
    }

    async fn ingest_lines(&self, path: &Path, lines: &[&str]) -> Result<(), IngestFileError> {
        let is_subagent = path.components().any(|c| c.as_os_str() == "subagents");
        let file_stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();

        let existing = ses_db::get_session_by_source_external_id(self.db.pool(), Source::ClaudeCode, &file_stem)
            .await
            .map_err(IngestFileError::Store)?;

        let mut session_id: Option<i64> = existing.as_ref().and_then(|s| s.id);
        let mut metadata_derived = existing.is_some();
        let mut sequence: i64 = match session_id {
            Some(id) => ses_db::next_sequence_number(self.db.pool(), id).await.map_err(IngestFileError::Store)?,
            None => 0,
        };

        let mut batch_observations: Vec<ConversationObservation> = Vec::new();
        let mut batch_messages = Vec::new();
        let mut tool_use_ids: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        let mut deferred_parent_refs: Vec<(usize, String)> = Vec::new();

        for line in lines {
            let Some(entry) = parse_line(line) else {
                debug!("skipping malformed line in {}", path.display());
                continue;
            };

            if !metadata_derived && entry.entry_type == "user" {
                let meta = derive_session_metadata(&file_stem, entry.cwd.as_deref(), is_subagent);
                let now = Utc::now();
                let content_hash = ses_core::content_hash(&meta.external_id, now, 0);
                let session = ConversationSession {
                    id: None,
                    source: Source::ClaudeCode,
                    external_id: meta.external_id.clone(),
                    title: Some(meta.title),
                    created_at: now,
                    updated_at: now,
                    synced_at: None,
                    content_hash,
                };
                let id = ses_db::upsert_session(self.db.pool(), &session)
                    .await
                    .map_err(IngestFileError::Store)?;
                session_id = Some(id);
                metadata_derived = true;
            }

            let extraction = extract_line(&entry, &mut sequence);

            if let Some(message) = extraction.message {
                batch_messages.push(message);
            }

            let base_index = batch_observations.len();
            for (block_id, index) in extraction.tool_use_block_ids {
                tool_use_ids.insert(block_id, base_index + index);
            }
            for (index, tool_use_id) in extraction.deferred_parent_refs {
                deferred_parent_refs.push((base_index + index, tool_use_id));
            }
            batch_observations.extend(extraction.observations);
        }

        let Some(session_id) = session_id else {
            // No `user` line yet to derive metadata from; nothing to persist.
            return Ok(());
        };

        for message in &mut batch_messages {
            message.session_id = session_id;
        }
        for observation in &mut batch_observations {
            observation.session_id = session_id;
        }

        if !batch_messages.is_empty() {
            ses_db::upsert_messages(self.db.pool(), session_id, &batch_messages)
                .await
                .map_err(IngestFileError::Store)?;
        }

        if !batch_observations.is_empty() {
            let ids = ses_db::upsert_observations(self.db.pool(), session_id, &batch_observations)
                .await
                .map_err(IngestFileError::Store)?;

            let mut parent_refs = Vec::new();
            for (child_index, tool_use_id) in deferred_parent_refs {
                if let Some(&parent_index) = tool_use_ids.get(&tool_use_id) {
                    if let (Some(&child_id), Some(&parent_id)) = (ids.get(child_index), ids.get(parent_index)) {
                        parent_refs.push((child_id, parent_id));
                    }
                }
            }
            if !parent_refs.is_empty() {
                ses_db::update_observation_parents(self.db.pool(), &parent_refs)
                    .await
                    .map_err(IngestFileError::Store)?;
            }
        }

        Ok(())
    }
}

fn discover_jsonl_files(root: &Path) -> Vec<PathBuf> {
    if !root.exists() {
        return Vec::new();
    }
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|ext| ext.to_str()) == Some("jsonl"))
        .map(|e| e.into_path())
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum IngestFileError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store error: {0}")]
    Store(ses_db::StoreError),
}
