//! Settings storage.
//!
//! Settings are resolved from, in order:
//! 1. the `SANDPIT_SETTINGS` environment variable (JSON)
//! 2. `~/.sandpit/settings.json` (or `<cache-dir>/settings.json`)
//! 3. built-in defaults
//!
//! CLI flags (with their own `SANDPIT_API_URL` / `SANDPIT_API_TOKEN` env
//! fallbacks) override the API fields afterwards.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::checkpoint::{
    DEFAULT_CHECKPOINT_HISTORY, DEFAULT_CHECKPOINT_MAX_BYTES, DEFAULT_CHECKPOINT_MAX_FILES,
    DEFAULT_RESTORE_CONCURRENCY,
};
use crate::edit::{
    DEFAULT_CONTEXT_LINES, DEFAULT_MAX_CONTEXT_FILES, DEFAULT_MAX_CONTEXT_FILE_CHARS,
    DEFAULT_MAX_CONTEXT_TOTAL_CHARS, DEFAULT_MAX_DIFF_LINES, DEFAULT_MAX_EDITS,
};

/// Environment variable holding a full settings JSON document.
pub const SETTINGS_ENV: &str = "SANDPIT_SETTINGS";

/// Default cache directory name under the home directory.
const CACHE_DIR_NAME: &str = ".sandpit";

/// Caps applied across generation, editing and checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Limits {
    pub max_edits: usize,
    pub context_lines: usize,
    pub max_diff_lines: usize,
    pub max_context_files: usize,
    pub max_context_file_chars: usize,
    pub max_context_total_chars: usize,
    pub checkpoint_max_files: usize,
    pub checkpoint_max_bytes: usize,
    pub checkpoint_history: usize,
    pub restore_concurrency: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_edits: DEFAULT_MAX_EDITS,
            context_lines: DEFAULT_CONTEXT_LINES,
            max_diff_lines: DEFAULT_MAX_DIFF_LINES,
            max_context_files: DEFAULT_MAX_CONTEXT_FILES,
            max_context_file_chars: DEFAULT_MAX_CONTEXT_FILE_CHARS,
            max_context_total_chars: DEFAULT_MAX_CONTEXT_TOTAL_CHARS,
            checkpoint_max_files: DEFAULT_CHECKPOINT_MAX_FILES,
            checkpoint_max_bytes: DEFAULT_CHECKPOINT_MAX_BYTES,
            checkpoint_history: DEFAULT_CHECKPOINT_HISTORY,
            restore_concurrency: DEFAULT_RESTORE_CONCURRENCY,
        }
    }
}

/// Settings file contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default)]
    pub limits: Limits,
}

impl Settings {
    /// Apply CLI-level overrides.
    pub fn with_overrides(mut self, api_url: Option<String>, api_token: Option<String>) -> Self {
        if api_url.is_some() {
            self.api_url = api_url;
        }
        if api_token.is_some() {
            self.api_token = api_token;
        }
        self
    }
}

/// Locates and reads settings inside the cache directory.
pub struct SettingsStore {
    base_dir: PathBuf,
    settings_path: PathBuf,
}

impl SettingsStore {
    /// # Arguments
    /// * `cache_dir` - Optional custom cache directory. Defaults to ~/.sandpit
    pub fn new(cache_dir: Option<String>) -> Result<Self> {
        let base_dir = match cache_dir {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .context("Could not determine home directory")?
                .join(CACHE_DIR_NAME),
        };

        std::fs::create_dir_all(&base_dir)
            .with_context(|| format!("Failed to create cache directory: {:?}", base_dir))?;

        let settings_path = base_dir.join("settings.json");
        Ok(Self {
            base_dir,
            settings_path,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    fn parse(raw: &str, source: &str) -> Option<Settings> {
        match serde_json::from_str::<Settings>(raw) {
            Ok(settings) => Some(settings),
            Err(e) => {
                warn!("Ignoring invalid settings from {}: {}", source, e);
                None
            }
        }
    }

    /// Resolve settings. Invalid sources are logged and skipped.
    pub fn load(&self) -> Settings {
        if let Ok(raw) = std::env::var(SETTINGS_ENV) {
            if let Some(settings) = Self::parse(&raw, SETTINGS_ENV) {
                info!("Using settings from {} environment variable", SETTINGS_ENV);
                return settings;
            }
        }

        if !self.settings_path.exists() {
            return Settings::default();
        }

        match std::fs::read_to_string(&self.settings_path) {
            Ok(raw) => {
                debug!("Loaded settings from {:?}", self.settings_path);
                Self::parse(&raw, &self.settings_path.display().to_string()).unwrap_or_default()
            }
            Err(e) => {
                warn!("Failed to read settings file: {}", e);
                Settings::default()
            }
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        let content =
            serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;
        std::fs::write(&self.settings_path, content)
            .with_context(|| format!("Failed to write settings file: {:?}", self.settings_path))?;
        debug!("Settings saved to {:?}", self.settings_path);
        Ok(())
    }
}
