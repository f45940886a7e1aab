use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::capture::capture_with_targets;
use super::{
    capture, restore, CaptureLimits, Checkpoint, CheckpointError, CheckpointKind,
    CheckpointStore, RestoreReport, BEFORE_APPLY_LABEL, DEFAULT_CHECKPOINT_HISTORY,
    DEFAULT_RESTORE_CONCURRENCY,
};
use crate::workspace::WorkspaceFiles;

#[derive(Debug, Clone, Copy)]
pub struct CheckpointLimits {
    pub capture: CaptureLimits,
    pub history: usize,
    pub restore_concurrency: usize,
}

impl Default for CheckpointLimits {
    fn default() -> Self {
        Self {
            capture: CaptureLimits::default(),
            history: DEFAULT_CHECKPOINT_HISTORY,
            restore_concurrency: DEFAULT_RESTORE_CONCURRENCY,
        }
    }
}

/// Checkpoint history of one sandbox.
///
/// The in-memory list is authoritative for this process; the store is
/// written through after every change. When the store is missing or
/// failing, checkpoints still work for the lifetime of the manager.
pub struct CheckpointManager {
    workspace: Arc<dyn WorkspaceFiles>,
    sandbox_id: String,
    store: Option<CheckpointStore>,
    limits: CheckpointLimits,
    entries: Mutex<Vec<Checkpoint>>,
}

impl CheckpointManager {
    pub fn new(
        workspace: Arc<dyn WorkspaceFiles>,
        sandbox_id: impl Into<String>,
        store: Option<CheckpointStore>,
        limits: CheckpointLimits,
    ) -> Self {
        let sandbox_id = sandbox_id.into();
        let entries = match &store {
            Some(store) => store.load(&sandbox_id).unwrap_or_else(|e| {
                warn!("Checkpoint history unavailable, continuing without it: {:#}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        Self {
            workspace,
            sandbox_id,
            store,
            limits,
            entries: Mutex::new(entries),
        }
    }

    pub fn sandbox_id(&self) -> &str {
        &self.sandbox_id
    }

    /// Checkpoints, most recent first.
    pub async fn list(&self) -> Vec<Checkpoint> {
        self.entries.lock().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Checkpoint> {
        self.entries
            .lock()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    /// The backup taken before the most recent apply.
    pub async fn last_apply_backup(&self) -> Option<Checkpoint> {
        self.entries
            .lock()
            .await
            .iter()
            .find(|c| c.kind == CheckpointKind::BeforeApply)
            .cloned()
    }

    pub async fn create(
        &self,
        label: &str,
        kind: CheckpointKind,
        prompt: Option<&str>,
    ) -> Result<Checkpoint, CheckpointError> {
        let checkpoint = capture(
            self.workspace.as_ref(),
            label,
            kind,
            prompt,
            self.limits.capture,
        )
        .await
        .map_err(CheckpointError::Capture)?;
        self.record(&checkpoint).await;
        Ok(checkpoint)
    }

    /// Snapshot taken ahead of a batched apply. Every existing file in
    /// `targets` is in the checkpoint, or no checkpoint is taken.
    pub async fn create_before_apply(
        &self,
        prompt: Option<&str>,
        targets: &[String],
    ) -> Result<Checkpoint, CheckpointError> {
        let checkpoint = capture_with_targets(
            self.workspace.as_ref(),
            BEFORE_APPLY_LABEL,
            CheckpointKind::BeforeApply,
            prompt,
            self.limits.capture,
            targets,
        )
        .await
        .map_err(CheckpointError::Capture)?;
        self.record(&checkpoint).await;
        Ok(checkpoint)
    }

    /// Put a new checkpoint at the front, evict past the history cap and
    /// write through to the store.
    async fn record(&self, checkpoint: &Checkpoint) {
        let mut entries = self.entries.lock().await;
        entries.insert(0, checkpoint.clone());
        let history = self.limits.history.max(1);
        if entries.len() > history {
            for evicted in entries.drain(history..) {
                info!("Evicted checkpoint {} ({})", evicted.id, evicted.label);
            }
        }

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.sandbox_id, &entries) {
                warn!("Could not persist checkpoints, keeping them in memory: {:#}", e);
            }
        }
    }

    pub async fn restore(&self, id: &str) -> Result<RestoreReport, CheckpointError> {
        let checkpoint = self
            .get(id)
            .await
            .ok_or_else(|| CheckpointError::NotFound(id.to_string()))?;
        Ok(restore(
            &checkpoint,
            self.workspace.as_ref(),
            self.limits.restore_concurrency,
        )
        .await)
    }

    /// Restore the backup taken before the most recent apply.
    pub async fn undo_last_apply(&self) -> Result<RestoreReport, CheckpointError> {
        let checkpoint = self
            .last_apply_backup()
            .await
            .ok_or(CheckpointError::NothingToUndo)?;
        info!("Undoing last apply from checkpoint {}", checkpoint.id);
        Ok(restore(
            &checkpoint,
            self.workspace.as_ref(),
            self.limits.restore_concurrency,
        )
        .await)
    }
}
