//! Natural-language edits against a workspace.
//!
//! - `context`: bounded context gathering
//! - `response`: tolerant parsing of the generator's reply
//! - `normalize`: the trust boundary for proposed edits
//! - `diff`: previews
//! - `plan`: the orchestrator tying them together with checkpoints

mod context;
mod diff;
mod normalize;
mod plan;
mod response;
#[cfg(test)]
mod tests;

pub use context::ContextFile;
pub use diff::{DEFAULT_CONTEXT_LINES, DEFAULT_MAX_DIFF_LINES};
pub use normalize::{normalize, normalize_path, DEFAULT_MAX_EDITS};
pub use plan::{ApplyReport, EditGenerator, EditOrchestrator, EditPlan, FilePreview};
pub use response::parse_edit_response;

pub use context::{
    DEFAULT_MAX_CONTEXT_FILES, DEFAULT_MAX_CONTEXT_FILE_CHARS, DEFAULT_MAX_CONTEXT_TOTAL_CHARS,
};

use thiserror::Error;

use crate::checkpoint::CheckpointError;

/// Rejected edit operations. Display strings are shown to the user as-is.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("Instruction is empty")]
    EmptyInstruction,
    #[error("No project files found to use as context")]
    NoContextFiles,
    #[error("Could not read the edit response: {0}")]
    MalformedResponse(String),
    #[error("No effective changes: every proposed edit was invalid or a no-op")]
    NoEffectiveChanges,
    #[error("No edits selected")]
    NothingSelected,
    #[error("Edit generation failed: {0:#}")]
    Generation(anyhow::Error),
    #[error("Workspace error: {0:#}")]
    Workspace(anyhow::Error),
    #[error("Refusing to apply without a backup: {0}")]
    Checkpoint(#[from] CheckpointError),
}
