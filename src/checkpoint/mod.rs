//! Workspace checkpoints.
//!
//! A checkpoint is a bounded snapshot of the workspace's text files. A
//! short, most-recent-first history is kept per sandbox so that every
//! batched apply can be undone in one step.

mod capture;
mod manager;
mod restore;
mod store;

pub use capture::{capture, CaptureLimits};
pub use manager::{CheckpointLimits, CheckpointManager};
pub use restore::{restore, RestoreReport};
pub use store::{CheckpointStore, FileKvStore};

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CHECKPOINT_MAX_FILES: usize = 120;
pub const DEFAULT_CHECKPOINT_MAX_BYTES: usize = 2 * 1024 * 1024;
/// Checkpoints kept per sandbox. Older ones are evicted first.
pub const DEFAULT_CHECKPOINT_HISTORY: usize = 8;
pub const DEFAULT_RESTORE_CONCURRENCY: usize = 4;

/// Label of the automatic backup taken before every apply.
pub const BEFORE_APPLY_LABEL: &str = "Before apply";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    #[default]
    Manual,
    BeforeApply,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub kind: CheckpointKind,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub prompt: Option<String>,
    pub files: Vec<CheckpointFile>,
    pub file_count: usize,
    pub total_bytes: usize,
    #[serde(default)]
    pub truncated: bool,
}

impl Checkpoint {
    /// One-line description for listings.
    pub fn describe(&self) -> String {
        let mut line = format!(
            "{}  {}  {}  {} file(s), {} bytes",
            self.id,
            self.created_at.format("%Y-%m-%d %H:%M:%S"),
            self.label,
            self.file_count,
            self.total_bytes
        );
        if self.truncated {
            line.push_str(" (truncated)");
        }
        line
    }
}

/// Millisecond timestamp plus a short random suffix.
pub(crate) fn new_checkpoint_id(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("{}-{}", now.timestamp_millis(), suffix.to_lowercase())
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Could not capture checkpoint: {0:#}")]
    Capture(anyhow::Error),
    #[error("Checkpoint not found: {0}")]
    NotFound(String),
    #[error("Nothing to undo: no apply has been backed up yet")]
    NothingToUndo,
}
