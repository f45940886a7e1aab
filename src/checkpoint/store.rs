//! Durable checkpoint history.

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::Checkpoint;

/// Namespace for deriving storage file names from keys.
const STORE_NAMESPACE: Uuid = Uuid::from_bytes([
    0x3c, 0x51, 0x9e, 0x07, 0x2b, 0x84, 0x4f, 0x1a, 0x9d, 0x6e, 0x5a, 0x17, 0xc2, 0x08, 0x7b, 0x44,
]);

/// Durable local byte store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// One file per key: `<dir>/<uuid-v5(key)>.json`.
pub struct FileKvStore {
    dir: PathBuf,
}

impl FileKvStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let name = Uuid::new_v5(&STORE_NAMESPACE, key.as_bytes());
        self.dir.join(format!("{}.json", name))
    }
}

impl KeyValueStore for FileKvStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create directory {}", self.dir.display()))?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("Failed to replace {}", path.display()))
    }
}

/// Most-recent-first checkpoint lists keyed by sandbox id.
pub struct CheckpointStore {
    kv: Arc<dyn KeyValueStore>,
    history: usize,
}

impl CheckpointStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, history: usize) -> Self {
        Self {
            kv,
            history: history.max(1),
        }
    }

    fn key(sandbox_id: &str) -> String {
        format!("checkpoints:{}", sandbox_id)
    }

    /// Load the list for a sandbox. Entries that fail to parse are dropped.
    pub fn load(&self, sandbox_id: &str) -> Result<Vec<Checkpoint>> {
        let Some(bytes) = self.kv.get(&Self::key(sandbox_id))? else {
            return Ok(Vec::new());
        };

        let entries: Vec<Value> = match serde_json::from_slice(&bytes) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Discarding unreadable checkpoint history for {}: {}", sandbox_id, e);
                return Ok(Vec::new());
            }
        };

        let total = entries.len();
        let mut checkpoints: Vec<Checkpoint> = entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect();
        if checkpoints.len() < total {
            warn!(
                "Discarded {} malformed checkpoint(s) for {}",
                total - checkpoints.len(),
                sandbox_id
            );
        }
        checkpoints.truncate(self.history);
        debug!("Loaded {} checkpoint(s) for {}", checkpoints.len(), sandbox_id);
        Ok(checkpoints)
    }

    /// Persist at most `history` entries of `checkpoints`.
    pub fn save(&self, sandbox_id: &str, checkpoints: &[Checkpoint]) -> Result<()> {
        let kept = &checkpoints[..checkpoints.len().min(self.history)];
        let bytes = serde_json::to_vec(kept).context("Failed to serialize checkpoints")?;
        self.kv.set(&Self::key(sandbox_id), &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{new_checkpoint_id, CheckpointKind};
    use chrono::Utc;
    use tempfile::TempDir;

    fn checkpoint(label: &str) -> Checkpoint {
        Checkpoint {
            id: new_checkpoint_id(Utc::now()),
            label: label.to_string(),
            kind: CheckpointKind::Manual,
            created_at: Utc::now(),
            prompt: None,
            files: Vec::new(),
            file_count: 0,
            total_bytes: 0,
            truncated: false,
        }
    }

    #[test]
    fn test_file_kv_store() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("checkpoints");
        let kv = FileKvStore::new(&dir);

        assert_eq!(kv.get("k").unwrap(), None);
        kv.set("k", b"[1]").unwrap();
        assert_eq!(kv.get("k").unwrap().as_deref(), Some(&b"[1]"[..]));
        assert_eq!(kv.path_for("k"), kv.path_for("k"));
        assert_ne!(kv.path_for("k"), kv.path_for("k2"));
        assert!(kv.path_for("a/../b").starts_with(&dir));
    }

    #[test]
    fn test_round_trip_per_sandbox() {
        let tmp = TempDir::new().unwrap();
        let store = CheckpointStore::new(Arc::new(FileKvStore::new(tmp.path())), 8);
        let list = vec![checkpoint("b"), checkpoint("a")];

        store.save("sb-1", &list).unwrap();
        assert_eq!(store.load("sb-1").unwrap(), list);
        assert!(store.load("sb-2").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_entries_are_discarded() {
        let tmp = TempDir::new().unwrap();
        let kv = Arc::new(FileKvStore::new(tmp.path()));
        let good = checkpoint("good");
        let raw = serde_json::json!([{"id": 3}, good, "junk"]);
        kv.set("checkpoints:sb", raw.to_string().as_bytes()).unwrap();

        let store = CheckpointStore::new(kv.clone(), 8);
        assert_eq!(store.load("sb").unwrap(), vec![good]);

        kv.set("checkpoints:sb", b"not json").unwrap();
        assert!(store.load("sb").unwrap().is_empty());
    }

    #[test]
    fn test_save_caps_history() {
        let tmp = TempDir::new().unwrap();
        let store = CheckpointStore::new(Arc::new(FileKvStore::new(tmp.path())), 3);
        let list: Vec<Checkpoint> = (0..5).map(|i| checkpoint(&i.to_string())).collect();

        store.save("sb", &list).unwrap();
        let loaded = store.load("sb").unwrap();
        assert_eq!(loaded, list[..3].to_vec());
    }
}
