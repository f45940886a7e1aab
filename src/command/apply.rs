use anyhow::{Context, Result};
use serde_json::Value;

use super::edit::apply_plan;
use super::{print_plan, AppContext};
use crate::cli;
use crate::edit::{normalize, parse_edit_response};

/// Read candidates from either a bare array or an `{ "edits": [...] }`
/// document.
fn read_candidates(path: &str) -> Result<Vec<Value>> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(&text) {
        return Ok(items);
    }
    Ok(parse_edit_response(&text)?.edits)
}

pub async fn run_apply(ctx: &AppContext, edits_path: String, review: bool) -> Result<()> {
    let candidates = read_candidates(&edits_path)?;
    let target = ctx.target()?;
    let orchestrator = ctx.orchestrator(&target, false)?;

    if review {
        let plan = orchestrator
            .preview_edits(&format!("apply {}", edits_path), &candidates)
            .await?;
        print_plan(&plan);
        apply_plan(ctx, &orchestrator, &plan).await?;
        return Ok(());
    }

    let edits = normalize(&candidates, ctx.settings.limits.max_edits);
    let deletions: Vec<&str> = edits
        .iter()
        .filter(|e| e.is_delete())
        .map(|e| e.path.as_str())
        .collect();
    if !deletions.is_empty() {
        println!("These edits delete: {}", deletions.join(", "));
        if !cli::confirm("Delete these files?", false, ctx.assume_yes)? {
            println!("No edits applied.");
            return Ok(());
        }
    }

    let report = orchestrator.apply_edits(edits).await?;
    println!("{}", report.summary());
    if !report.is_complete() {
        anyhow::bail!("{} edit(s) failed to apply", report.failed.len());
    }
    Ok(())
}
