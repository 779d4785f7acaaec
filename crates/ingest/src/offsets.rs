//! Persisted `{file_path -> byte_offset}` map so the session-log watcher can
//! resume after a restart without re-reading whole files (§4.2, §8 restart
//! safety invariant).

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OffsetMap {
    offsets: HashMap<String, u64>,
}

impl OffsetMap {
    /// Load the offset map from `path`, or start empty if the file is
    /// absent or unreadable — a missing offset file is not fatal, it just
    /// means every file is read from the start (§4.2).
    pub async fn load(path: &Path) -> Self {
        match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!("offset map at {} is corrupt, starting fresh: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub async fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(self).unwrap_or_default();
        tokio::fs::write(path, bytes).await
    }

    pub fn get(&self, file_path: &Path) -> u64 {
        self.offsets.get(&key(file_path)).copied().unwrap_or(0)
    }

    pub fn set(&mut self, file_path: &Path, offset: u64) {
        self.offsets.insert(key(file_path), offset);
    }

    pub fn remove(&mut self, file_path: &Path) {
        self.offsets.remove(&key(file_path));
    }
}

fn key(file_path: &Path) -> String {
    file_path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_missing_file_yields_empty_map() {
        let dir = tempfile::tempdir().unwrap();
        let map = OffsetMap::load(&dir.path().join("nope.json")).await;
        assert_eq!(map.get(Path::new("/a/b.jsonl")), 0);
    }

    #[tokio::test]
    async fn save_then_load_round_trips_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offsets.json");

        let mut map = OffsetMap::default();
        map.set(Path::new("/a/b.jsonl"), 42);
        map.save(&path).await.unwrap();

        let loaded = OffsetMap::load(&path).await;
        assert_eq!(loaded.get(Path::new("/a/b.jsonl")), 42);
    }

    #[tokio::test]
    async fn corrupt_file_falls_back_to_empty_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offsets.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let loaded = OffsetMap::load(&path).await;
        assert_eq!(loaded.get(Path::new("/a/b.jsonl")), 0);
    }

    #[test]
    fn remove_clears_a_tracked_file() {
        let mut map = OffsetMap::default();
        map.set(Path::new("/a/b.jsonl"), 10);
        map.remove(Path::new("/a/b.jsonl"));
        assert_eq!(map.get(Path::new("/a/b.jsonl")), 0);
    }
}
