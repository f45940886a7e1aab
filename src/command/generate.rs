use anyhow::{Context, Result};
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::edit::review_and_apply;
use super::AppContext;
use crate::api::HttpGenerationTransport;
use crate::cli;
use crate::session::{GenerationSession, Lifecycle, Session, Stage};

/// How often the log is polled for new messages while a run is streaming.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Tracks what has already been printed for the live session.
#[derive(Default)]
struct Printer {
    last_id: Option<u64>,
    stage: Stage,
}

impl Printer {
    fn show(&mut self, session: &Session) {
        for message in &session.messages {
            if self.last_id.map_or(true, |last| message.id > last) {
                println!("{}", message.display_line());
                self.last_id = Some(message.id);
            }
        }

        let live = !matches!(session.lifecycle, Lifecycle::Failed | Lifecycle::Canceled);
        if live && session.stage > self.stage {
            println!("== {}", session.stage.label());
            self.stage = session.stage;
        }
    }

    /// Forget the stage before a retry; message ids keep increasing.
    fn restart(&mut self) {
        self.stage = Stage::default();
    }
}

/// Run (or retry) the session to completion, printing as it goes. Ctrl-C
/// cancels the run.
async fn watch_run(
    session: &Arc<GenerationSession>,
    prompt: Option<String>,
    printer: &mut Printer,
) -> Result<Session> {
    let runner = session.clone();
    let mut run = tokio::spawn(async move {
        match prompt {
            Some(prompt) => runner.start(&prompt).await,
            None => runner.retry().await,
        }
    });
    let mut ticker = tokio::time::interval(POLL_INTERVAL);

    loop {
        tokio::select! {
            result = &mut run => {
                let finished = result.context("Generation task failed")??;
                printer.show(&finished);
                return Ok(finished);
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nCanceling...");
                session.cancel().await;
            }
            _ = ticker.tick() => {
                printer.show(&session.snapshot().await);
            }
        }
    }
}

pub async fn run_generate(ctx: &AppContext, prompt: String) -> Result<()> {
    let client = ctx.api_client()?;
    let transport =
        HttpGenerationTransport::new(client.clone(), ctx.sandbox().map(str::to_string));
    let session = Arc::new(GenerationSession::new(Arc::new(transport)));
    let mut printer = Printer::default();

    let interactive = std::io::stdin().is_terminal() && !ctx.assume_yes;
    let mut outcome = watch_run(&session, Some(prompt), &mut printer).await?;

    loop {
        match outcome.lifecycle {
            Lifecycle::Ready => break,
            Lifecycle::Canceled => {
                println!("Generation canceled at stage: {}", outcome.stage.label());
                return Ok(());
            }
            _ => {
                let error = outcome
                    .error
                    .clone()
                    .unwrap_or_else(|| "Generation failed".to_string());
                eprintln!("❌ {}", error);
                if !interactive || !cli::confirm("Retry with the same prompt?", true, false)? {
                    anyhow::bail!(error);
                }
                printer.restart();
                outcome = watch_run(&session, None, &mut printer).await?;
            }
        }
    }

    if outcome.parse_warnings > 0 {
        debug!("{} frame(s) could not be parsed", outcome.parse_warnings);
    }
    println!(
        "\n✅ Preview ready: {}",
        outcome.preview_url.as_deref().unwrap_or_default()
    );
    let Some(sandbox_id) = outcome.sandbox_id.clone() else {
        return Ok(());
    };
    println!("   Sandbox: {}", sandbox_id);

    if !interactive {
        return Ok(());
    }

    // Follow-up edits on the new sandbox; apply reports go into the session log
    let target = ctx.sandbox_target(client, &sandbox_id);
    let orchestrator = ctx.orchestrator(&target, true)?;
    loop {
        let instruction = cli::ask("\nEdit instruction (empty to finish): ")?;
        if instruction.is_empty() {
            break;
        }
        match review_and_apply(ctx, &orchestrator, &instruction, &[]).await {
            Ok(Some(report)) => {
                session.push_note(report.summary()).await;
                printer.show(&session.snapshot().await);
            }
            Ok(None) => {}
            Err(e) => eprintln!("❌ {:#}", e),
        }
    }

    session.reset().await;
    debug!("Generation session closed");
    Ok(())
}
