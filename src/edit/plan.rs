//! Preview and apply of edit batches.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::context::{gather_context, ContextFile, ContextLimits};
use super::diff::{creation_diff, deletion_diff, diff, diff_with, DiffOptions, FileDiff};
use super::normalize::{normalize, normalize_path, EditAction, NormalizedEdit};
use super::response::parse_edit_response;
use super::EditError;
use crate::checkpoint::CheckpointManager;
use crate::config::Limits;
use crate::domain::{BatchOutcome, FileFailure};
use crate::workspace::WorkspaceFiles;

/// Produces edit proposals for an instruction. The reply is raw text that is
/// parsed leniently.
#[async_trait]
pub trait EditGenerator: Send + Sync {
    async fn generate_edits(
        &self,
        instruction: &str,
        context: &[ContextFile],
    ) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePreview {
    pub path: String,
    pub additions: usize,
    pub deletions: usize,
    pub changed: bool,
    pub is_new_file: bool,
    pub is_deleted: bool,
    pub diff: String,
}

impl FilePreview {
    fn new(path: &str, diff: FileDiff, is_new_file: bool, is_deleted: bool) -> Self {
        Self {
            path: path.to_string(),
            additions: diff.additions,
            deletions: diff.deletions,
            changed: diff.changed,
            is_new_file,
            is_deleted,
            diff: diff.diff,
        }
    }
}

/// Reviewed edits awaiting selection. Previews and edits cover the same
/// paths, in the same order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditPlan {
    instruction: String,
    summary: Option<String>,
    notes: Vec<String>,
    previews: Vec<FilePreview>,
    proposed_edits: Vec<NormalizedEdit>,
}

impl EditPlan {
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn previews(&self) -> &[FilePreview] {
        &self.previews
    }

    pub fn proposed_edits(&self) -> &[NormalizedEdit] {
        &self.proposed_edits
    }

    pub fn paths(&self) -> Vec<String> {
        self.proposed_edits.iter().map(|e| e.path.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport {
    /// Backup taken before the first write.
    pub checkpoint_id: String,
    pub applied: Vec<String>,
    pub failed: Vec<FileFailure>,
}

impl ApplyReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Multi-line report suitable for the session log.
    pub fn summary(&self) -> String {
        let mut text = format!("Applied {} edit(s)", self.applied.len());
        if !self.applied.is_empty() {
            text.push_str(&format!(": {}", self.applied.join(", ")));
        }
        if !self.failed.is_empty() {
            text.push_str(&format!("\n{} edit(s) failed:", self.failed.len()));
            for failure in &self.failed {
                text.push_str(&format!("\n  {}: {}", failure.path, failure.error));
            }
        }
        text.push_str(&format!("\nUndo with checkpoint {}", self.checkpoint_id));
        text
    }
}

pub struct EditOrchestrator {
    workspace: Arc<dyn WorkspaceFiles>,
    checkpoints: Arc<CheckpointManager>,
    generator: Option<Arc<dyn EditGenerator>>,
    limits: Limits,
}

impl EditOrchestrator {
    pub fn new(
        workspace: Arc<dyn WorkspaceFiles>,
        checkpoints: Arc<CheckpointManager>,
        limits: Limits,
    ) -> Self {
        Self {
            workspace,
            checkpoints,
            generator: None,
            limits,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn EditGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    fn context_limits(&self) -> ContextLimits {
        ContextLimits {
            max_files: self.limits.max_context_files,
            max_file_chars: self.limits.max_context_file_chars,
            max_total_chars: self.limits.max_context_total_chars,
        }
    }

    fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            context_lines: self.limits.context_lines,
            max_lines: self.limits.max_diff_lines,
        }
    }

    /// Ask the generator for edits and preview them.
    pub async fn prepare(
        &self,
        instruction: &str,
        explicit_paths: &[String],
    ) -> Result<EditPlan, EditError> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(EditError::EmptyInstruction);
        }
        let generator = self.generator.as_ref().ok_or_else(|| {
            EditError::Generation(anyhow::anyhow!("No edit generator configured"))
        })?;

        let context = gather_context(
            self.workspace.as_ref(),
            explicit_paths,
            self.context_limits(),
        )
        .await
        .map_err(EditError::Workspace)?;
        if context.is_empty() {
            return Err(EditError::NoContextFiles);
        }
        info!("Requesting edits with {} context file(s)", context.len());

        let raw = generator
            .generate_edits(instruction, &context)
            .await
            .map_err(EditError::Generation)?;
        let response = parse_edit_response(&raw)?;
        let edits = normalize(&response.edits, self.limits.max_edits);

        let context_paths: HashSet<&str> = context.iter().map(|f| f.path.as_str()).collect();
        for edit in &edits {
            if !context_paths.contains(edit.path.as_str()) {
                debug!("Edit targets {} outside the provided context", edit.path);
            }
        }

        self.build_plan(instruction, response.summary, response.notes, edits)
            .await
    }

    /// Preview caller-supplied candidates without calling the generator.
    pub async fn preview_edits(
        &self,
        instruction: &str,
        candidates: &[Value],
    ) -> Result<EditPlan, EditError> {
        let edits = normalize(candidates, self.limits.max_edits);
        self.build_plan(instruction.trim(), None, Vec::new(), edits)
            .await
    }

    /// Apply the selected subset of a plan. Unknown paths are ignored.
    pub async fn apply_selected(
        &self,
        plan: &EditPlan,
        selected_paths: &[String],
    ) -> Result<ApplyReport, EditError> {
        let selected: HashSet<String> = selected_paths
            .iter()
            .filter_map(|p| normalize_path(p))
            .collect();
        let edits: Vec<NormalizedEdit> = plan
            .proposed_edits
            .iter()
            .filter(|e| selected.contains(&e.path))
            .cloned()
            .collect();
        if edits.is_empty() {
            return Err(EditError::NothingSelected);
        }

        self.apply_batch(Some(&plan.instruction), edits).await
    }

    /// Apply edits directly. No-ops against the current workspace are
    /// dropped first.
    pub async fn apply_edits(&self, edits: Vec<NormalizedEdit>) -> Result<ApplyReport, EditError> {
        let mut effective = Vec::new();
        for edit in edits {
            if self.is_effective(&edit).await? {
                effective.push(edit);
            } else {
                debug!("Dropping no-op edit for {}", edit.path);
            }
        }
        if effective.is_empty() {
            return Err(EditError::NoEffectiveChanges);
        }

        self.apply_batch(None, effective).await
    }

    async fn is_effective(&self, edit: &NormalizedEdit) -> Result<bool, EditError> {
        let current = self
            .workspace
            .read(&edit.path)
            .await
            .map_err(EditError::Workspace)?;

        Ok(match (&edit.action, current) {
            (EditAction::Delete, current) => current.is_some(),
            (EditAction::Write { .. }, None) => true,
            (EditAction::Write { content }, Some(before)) => {
                diff(&edit.path, &before, content).changed
            }
        })
    }

    /// Diff one edit against the workspace. `None` for a no-op.
    async fn preview(&self, edit: &NormalizedEdit) -> Result<Option<FilePreview>, EditError> {
        let current = self
            .workspace
            .read(&edit.path)
            .await
            .map_err(EditError::Workspace)?;

        let preview = match (&edit.action, current) {
            (EditAction::Delete, None) => {
                debug!("Dropping delete of missing file {}", edit.path);
                None
            }
            (EditAction::Delete, Some(before)) => Some(FilePreview::new(
                &edit.path,
                deletion_diff(&edit.path, &before),
                false,
                true,
            )),
            (EditAction::Write { content }, None) => Some(FilePreview::new(
                &edit.path,
                creation_diff(&edit.path, content),
                true,
                false,
            )),
            (EditAction::Write { content }, Some(before)) => {
                let diff = diff_with(&edit.path, &before, content, self.diff_options());
                if diff.changed {
                    Some(FilePreview::new(&edit.path, diff, false, false))
                } else {
                    debug!("Dropping unchanged edit for {}", edit.path);
                    None
                }
            }
        };
        Ok(preview)
    }

    async fn build_plan(
        &self,
        instruction: &str,
        summary: Option<String>,
        notes: Vec<String>,
        edits: Vec<NormalizedEdit>,
    ) -> Result<EditPlan, EditError> {
        let mut previews = Vec::new();
        let mut proposed_edits = Vec::new();

        for edit in edits {
            if let Some(preview) = self.preview(&edit).await? {
                previews.push(preview);
                proposed_edits.push(edit);
            }
        }

        if proposed_edits.is_empty() {
            return Err(EditError::NoEffectiveChanges);
        }
        info!("Prepared {} edit(s) for review", proposed_edits.len());

        Ok(EditPlan {
            instruction: instruction.to_string(),
            summary,
            notes,
            previews,
            proposed_edits,
        })
    }

    /// Back up, then apply each edit independently.
    async fn apply_batch(
        &self,
        instruction: Option<&str>,
        edits: Vec<NormalizedEdit>,
    ) -> Result<ApplyReport, EditError> {
        let targets: Vec<String> = edits.iter().map(|e| e.path.clone()).collect();
        let checkpoint = self
            .checkpoints
            .create_before_apply(instruction, &targets)
            .await?;

        let mut outcome = BatchOutcome::default();
        for edit in &edits {
            let result = match &edit.action {
                EditAction::Write { content } => self.workspace.write(&edit.path, content).await,
                EditAction::Delete => self.workspace.delete(&edit.path).await,
            };
            if let Err(e) = &result {
                warn!("Failed to apply edit to {}: {:#}", edit.path, e);
            }
            outcome.record(&edit.path, result);
        }

        info!(
            "Applied {}/{} edit(s), backup {}",
            outcome.succeeded.len(),
            edits.len(),
            checkpoint.id
        );
        Ok(ApplyReport {
            checkpoint_id: checkpoint.id,
            applied: outcome.succeeded,
            failed: outcome.failed,
        })
    }
}
