use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use super::Checkpoint;
use crate::domain::{BatchOutcome, FileFailure};
use crate::workspace::WorkspaceFiles;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    pub checkpoint_id: String,
    pub restored: Vec<String>,
    pub failed: Vec<FileFailure>,
}

impl RestoreReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut line = format!(
            "Restored {} file(s) from checkpoint {}",
            self.restored.len(),
            self.checkpoint_id
        );
        if !self.failed.is_empty() {
            line.push_str(&format!("; {} failed:", self.failed.len()));
            for failure in &self.failed {
                line.push_str(&format!("\n  {}: {}", failure.path, failure.error));
            }
        }
        line
    }
}

/// Write every file of `checkpoint` back, `concurrency` writes in flight.
///
/// Not transactional: failed writes are reported, successful ones are kept.
/// Files created after the checkpoint are left in place.
pub async fn restore(
    checkpoint: &Checkpoint,
    workspace: &dyn WorkspaceFiles,
    concurrency: usize,
) -> RestoreReport {
    let results: Vec<(&str, anyhow::Result<()>)> = stream::iter(checkpoint.files.iter())
        .map(|file| async move {
            (
                file.path.as_str(),
                workspace.write(&file.path, &file.content).await,
            )
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut outcome = BatchOutcome::default();
    for (path, result) in results {
        outcome.record(path, result);
    }

    if outcome.is_complete() {
        info!(
            "Restored {} file(s) from checkpoint {}",
            outcome.succeeded.len(),
            checkpoint.id
        );
    } else {
        warn!(
            "Restore of checkpoint {} incomplete: {} restored, {} failed",
            checkpoint.id,
            outcome.succeeded.len(),
            outcome.failed.len()
        );
    }

    RestoreReport {
        checkpoint_id: checkpoint.id.clone(),
        restored: outcome.succeeded,
        failed: outcome.failed,
    }
}
