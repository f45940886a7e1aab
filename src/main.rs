use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

mod api;
mod checkpoint;
mod cli;
mod command;
mod config;
mod domain;
mod edit;
mod session;
mod workspace;

use cli::{Cli, Commands};
use command::AppContext;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        if let Some(api_error) = e.downcast_ref::<api::ApiError>() {
            debug!(
                "API call failed with HTTP {} ({:?}), request id {}",
                api_error.http_status,
                api_error.status,
                api_error.request_id.as_deref().unwrap_or("unknown")
            );
        }
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let ctx = AppContext::from_cli(&cli)?;

    match cli.command {
        Commands::Generate { prompt } => command::run_generate(&ctx, prompt).await,
        Commands::Edit {
            instruction,
            files,
            save,
        } => command::run_edit(&ctx, instruction, files, save).await,
        Commands::Apply { edits, review } => command::run_apply(&ctx, edits, review).await,
        Commands::Checkpoint { action } => command::run_checkpoint(&ctx, action).await,
        Commands::Config => command::run_config(&ctx).await,
    }
}
