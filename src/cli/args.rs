use clap::{Parser, Subcommand};

/// Sandpit - drive AI code generation in a sandbox, then edit it safely
#[derive(Parser)]
#[command(name = "sandpit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Base URL of the sandbox API
    #[arg(long, global = true, env = "SANDPIT_API_URL")]
    pub api_url: Option<String>,

    /// API token
    #[arg(long, global = true, env = "SANDPIT_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Sandbox to operate on
    #[arg(short, long, global = true)]
    pub sandbox: Option<String>,

    /// Operate on a local directory instead of a remote sandbox
    #[arg(long, global = true, conflicts_with = "sandbox")]
    pub local: Option<String>,

    /// Answer yes to every confirmation
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Directory for settings and checkpoint history. Defaults to ~/.sandpit
    #[arg(long, global = true)]
    pub cache_dir: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a project from a prompt and wait for its preview
    Generate {
        /// What to build
        prompt: String,
    },
    /// Propose edits for an instruction, review the diffs, and apply
    Edit {
        /// What to change
        instruction: String,

        /// Files to use as context (defaults to discovered project files)
        #[arg(short, long = "file")]
        files: Vec<String>,

        /// Write the proposed edits to a file instead of applying them
        #[arg(long)]
        save: Option<String>,
    },
    /// Apply edits from a JSON file of `{path, content}` / `{path, delete: true}`
    Apply {
        /// Path to the edits file
        #[arg(long)]
        edits: String,

        /// Preview the diffs and pick which edits to apply
        #[arg(long)]
        review: bool,
    },
    /// Manage workspace checkpoints
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,
    },
    /// Save --api-url / --api-token to the settings file and show settings
    Config,
}

#[derive(Subcommand)]
pub enum CheckpointAction {
    /// List checkpoints, most recent first
    List,
    /// Snapshot the workspace now
    Create {
        /// Label shown in listings
        #[arg(short, long)]
        label: Option<String>,
    },
    /// Write a checkpoint's files back to the workspace
    Restore {
        /// Checkpoint id
        id: String,
    },
    /// Restore the backup taken before the last apply
    Undo,
}
