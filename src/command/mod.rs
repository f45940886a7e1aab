//! Subcommand implementations.

mod apply;
mod checkpoint;
mod config;
mod edit;
mod generate;

pub use apply::run_apply;
pub use checkpoint::run_checkpoint;
pub use config::run_config;
pub use edit::run_edit;
pub use generate::run_generate;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::debug;

use crate::api::{ApiClient, HttpEditGenerator, RemoteWorkspace};
use crate::checkpoint::{
    CaptureLimits, CheckpointLimits, CheckpointManager, CheckpointStore, FileKvStore,
};
use crate::cli::{self, Cli};
use crate::config::{Settings, SettingsStore};
use crate::edit::{EditOrchestrator, EditPlan, FilePreview};
use crate::workspace::{LocalWorkspace, WorkspaceFiles};

/// Where checkpoint history lives inside the cache directory.
const CHECKPOINT_DIR: &str = "checkpoints";

/// Settings and global flags shared by every command.
pub struct AppContext {
    pub settings: Settings,
    pub settings_store: SettingsStore,
    pub assume_yes: bool,
    sandbox: Option<String>,
    local: Option<String>,
}

/// A resolved workspace plus the identity its checkpoints are keyed by.
pub struct Target {
    pub workspace: Arc<dyn WorkspaceFiles>,
    pub identity: String,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let settings_store = SettingsStore::new(cli.cache_dir.clone())?;
        let settings = settings_store
            .load()
            .with_overrides(cli.api_url.clone(), cli.api_token.clone());

        Ok(Self {
            settings,
            settings_store,
            assume_yes: cli.yes,
            sandbox: cli.sandbox.clone(),
            local: cli.local.clone(),
        })
    }

    pub fn sandbox(&self) -> Option<&str> {
        self.sandbox.as_deref()
    }

    pub fn api_client(&self) -> Result<Arc<ApiClient>> {
        let url = self.settings.api_url.as_deref().context(
            "No API URL configured. Pass --api-url, set SANDPIT_API_URL, or add apiUrl to the settings file",
        )?;
        Ok(Arc::new(ApiClient::new(
            url,
            self.settings.api_token.clone(),
        )?))
    }

    /// The workspace selected by `--local` or `--sandbox`.
    pub fn target(&self) -> Result<Target> {
        if let Some(local) = &self.local {
            let root = cli::resolve_local_root(local)?;
            debug!("Using local workspace {}", root.display());
            return Ok(Target {
                identity: format!("local:{}", root.display()),
                workspace: Arc::new(LocalWorkspace::new(root)),
            });
        }

        let sandbox = self
            .sandbox
            .as_deref()
            .context("No workspace selected. Pass --sandbox <ID> or --local <DIR>")?;
        Ok(self.sandbox_target(self.api_client()?, sandbox))
    }

    pub fn sandbox_target(&self, client: Arc<ApiClient>, sandbox_id: &str) -> Target {
        Target {
            workspace: Arc::new(RemoteWorkspace::new(client, sandbox_id)),
            identity: sandbox_id.to_string(),
        }
    }

    pub fn checkpoints(&self, target: &Target) -> Arc<CheckpointManager> {
        let limits = self.settings.limits;
        let store = CheckpointStore::new(
            Arc::new(FileKvStore::new(
                self.settings_store.base_dir().join(CHECKPOINT_DIR),
            )),
            limits.checkpoint_history,
        );
        Arc::new(CheckpointManager::new(
            target.workspace.clone(),
            target.identity.clone(),
            Some(store),
            CheckpointLimits {
                capture: CaptureLimits {
                    max_files: limits.checkpoint_max_files,
                    max_bytes: limits.checkpoint_max_bytes,
                },
                history: limits.checkpoint_history,
                restore_concurrency: limits.restore_concurrency,
            },
        ))
    }

    /// Orchestrator for `target`. The edit generator needs the API and is
    /// attached only when one is configured.
    pub fn orchestrator(&self, target: &Target, with_generator: bool) -> Result<EditOrchestrator> {
        let orchestrator = EditOrchestrator::new(
            target.workspace.clone(),
            self.checkpoints(target),
            self.settings.limits,
        );
        if !with_generator {
            return Ok(orchestrator);
        }
        let generator = HttpEditGenerator::new(self.api_client()?, target.identity.clone());
        Ok(orchestrator.with_generator(Arc::new(generator)))
    }
}

/// Print a plan's previews, numbered from 1.
pub(crate) fn print_plan(plan: &EditPlan) {
    println!("Proposed edits for: {}", plan.instruction());
    if let Some(summary) = plan.summary() {
        println!("{}\n", summary);
    }
    for (index, preview) in plan.previews().iter().enumerate() {
        println!("[{}] {}", index + 1, describe_preview(preview));
        println!("{}\n", preview.diff);
    }
    for note in plan.notes() {
        println!("Note: {}", note);
    }
}

fn describe_preview(preview: &FilePreview) -> String {
    let tag = if preview.is_new_file {
        " (new)"
    } else if preview.is_deleted {
        " (delete)"
    } else {
        ""
    };
    format!(
        "{}{}  +{} -{}",
        preview.path, tag, preview.additions, preview.deletions
    )
}
