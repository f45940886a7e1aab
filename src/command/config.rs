use anyhow::{Context, Result};
use std::path::Path;

use super::AppContext;
use crate::config::Settings;

/// Show a token without revealing it.
fn mask(token: &str) -> String {
    let count = token.chars().count();
    if count <= 8 {
        return "****".to_string();
    }
    let visible: String = token.chars().skip(count - 4).collect();
    format!("****{}", visible)
}

/// Warning shown when saving would write a token the file does not hold yet.
/// Tokens from `--api-token` and `SANDPIT_API_TOKEN` both end up on disk.
fn token_write_notice(stored: &Settings, next: &Settings, path: &Path) -> Option<String> {
    let token = next.api_token.as_deref()?;
    if stored.api_token.as_deref() == Some(token) {
        return None;
    }
    Some(format!(
        "⚠️  Storing API token {} in plaintext in {}",
        mask(token),
        path.display()
    ))
}

pub async fn run_config(ctx: &AppContext) -> Result<()> {
    let stored = ctx.settings_store.load();
    if let Some(notice) =
        token_write_notice(&stored, &ctx.settings, ctx.settings_store.settings_path())
    {
        eprintln!("{}", notice);
    }
    ctx.settings_store.save(&ctx.settings)?;
    println!(
        "Settings saved to {}",
        ctx.settings_store.settings_path().display()
    );
    println!(
        "  API URL:   {}",
        ctx.settings.api_url.as_deref().unwrap_or("(not set)")
    );
    println!(
        "  API token: {}",
        ctx.settings
            .api_token
            .as_deref()
            .map(mask)
            .unwrap_or_else(|| "(not set)".to_string())
    );
    let limits =
        serde_json::to_string_pretty(&ctx.settings.limits).context("Failed to render limits")?;
    println!("  Limits: {}", limits);
    Ok(())
}
