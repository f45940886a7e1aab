use anyhow::Result;

use super::AppContext;
use crate::checkpoint::{CheckpointKind, RestoreReport};
use crate::cli::{self, CheckpointAction};

fn finish_restore(report: RestoreReport) -> Result<()> {
    println!("{}", report.summary());
    if !report.is_complete() {
        anyhow::bail!(
            "Restore incomplete: {} file(s) could not be written",
            report.failed.len()
        );
    }
    Ok(())
}

pub async fn run_checkpoint(ctx: &AppContext, action: CheckpointAction) -> Result<()> {
    let target = ctx.target()?;
    let checkpoints = ctx.checkpoints(&target);

    match action {
        CheckpointAction::List => {
            let list = checkpoints.list().await;
            if list.is_empty() {
                println!("No checkpoints for {}.", checkpoints.sandbox_id());
            }
            for checkpoint in list {
                println!("{}", checkpoint.describe());
            }
        }
        CheckpointAction::Create { label } => {
            let label = label.unwrap_or_else(|| "Manual checkpoint".to_string());
            let checkpoint = checkpoints
                .create(&label, CheckpointKind::Manual, None)
                .await?;
            println!("✅ Created {}", checkpoint.describe());
            if checkpoint.truncated {
                println!("⚠️  The workspace exceeded the snapshot limits; not every file was captured.");
            }
        }
        CheckpointAction::Restore { id } => {
            let Some(checkpoint) = checkpoints.get(&id).await else {
                anyhow::bail!("Checkpoint not found: {}", id);
            };
            println!(
                "Restoring overwrites {} file(s) in the workspace.",
                checkpoint.file_count
            );
            if !cli::confirm("Restore this checkpoint?", false, ctx.assume_yes)? {
                println!("Restore cancelled.");
                return Ok(());
            }
            finish_restore(checkpoints.restore(&id).await?)?;
        }
        CheckpointAction::Undo => {
            let Some(backup) = checkpoints.last_apply_backup().await else {
                println!("Nothing to undo.");
                return Ok(());
            };
            println!("Undo restores the backup {}", backup.describe());
            if !cli::confirm("Undo the last apply?", false, ctx.assume_yes)? {
                println!("Undo cancelled.");
                return Ok(());
            }
            finish_restore(checkpoints.undo_last_apply().await?)?;
        }
    }

    Ok(())
}
