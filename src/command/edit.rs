use anyhow::{Context, Result};

use super::{print_plan, AppContext};
use crate::cli;
use crate::edit::{ApplyReport, EditOrchestrator, EditPlan};

/// Ask which previews to apply. `None` when the user picks nothing.
fn choose_paths(ctx: &AppContext, plan: &EditPlan) -> Result<Option<Vec<String>>> {
    let previews = plan.previews();
    if ctx.assume_yes {
        return Ok(Some(plan.paths()));
    }

    let indices = loop {
        let answer = cli::ask("Apply which edits? [all/none/1,3-4] (default all): ")?;
        match cli::parse_selection(&answer, previews.len()) {
            Ok(indices) => break indices,
            Err(message) => eprintln!("{}", message),
        }
    };
    if indices.is_empty() {
        return Ok(None);
    }

    let deletions: Vec<&str> = indices
        .iter()
        .filter(|&&i| previews[i].is_deleted)
        .map(|&i| previews[i].path.as_str())
        .collect();
    if !deletions.is_empty() {
        println!("The selection deletes: {}", deletions.join(", "));
        if !cli::confirm("Delete these files?", false, false)? {
            return Ok(None);
        }
    }

    Ok(Some(
        indices.iter().map(|&i| previews[i].path.clone()).collect(),
    ))
}

/// Prepare a plan, show it, and apply the user's selection.
pub(crate) async fn review_and_apply(
    ctx: &AppContext,
    orchestrator: &EditOrchestrator,
    instruction: &str,
    files: &[String],
) -> Result<Option<ApplyReport>> {
    let plan = orchestrator.prepare(instruction, files).await?;
    print_plan(&plan);
    apply_plan(ctx, orchestrator, &plan).await
}

pub(crate) async fn apply_plan(
    ctx: &AppContext,
    orchestrator: &EditOrchestrator,
    plan: &EditPlan,
) -> Result<Option<ApplyReport>> {
    let Some(paths) = choose_paths(ctx, plan)? else {
        println!("No edits applied.");
        return Ok(None);
    };

    let report = orchestrator.apply_selected(plan, &paths).await?;
    println!("{}", report.summary());
    Ok(Some(report))
}

pub async fn run_edit(
    ctx: &AppContext,
    instruction: String,
    files: Vec<String>,
    save: Option<String>,
) -> Result<()> {
    let target = ctx.target()?;
    let orchestrator = ctx.orchestrator(&target, true)?;

    let Some(save) = save else {
        let report = review_and_apply(ctx, &orchestrator, &instruction, &files).await?;
        if let Some(report) = report {
            if !report.is_complete() {
                anyhow::bail!("{} edit(s) failed to apply", report.failed.len());
            }
        }
        return Ok(());
    };

    let plan = orchestrator.prepare(&instruction, &files).await?;
    print_plan(&plan);
    let json = serde_json::to_string_pretty(plan.proposed_edits())
        .context("Failed to serialize edits")?;
    std::fs::write(&save, json).with_context(|| format!("Failed to write {}", save))?;
    println!(
        "Saved {} edit(s) to {}. Apply them with `sandpit apply --edits {}`.",
        plan.proposed_edits().len(),
        save,
        save
    );
    Ok(())
}
