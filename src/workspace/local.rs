//! Workspace backed by a directory on disk.
//!
//! Uses `ignore::WalkBuilder` so `.gitignore` rules (recursively) and a
//! root-level `.sandpitignore` shape the listing.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ignore::WalkBuilder;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{EntryKind, WorkspaceEntry, WorkspaceFiles, IGNORED_DIRS};
use crate::edit::normalize_path;

/// Project-specific ignore file, same syntax as `.gitignore`.
pub const IGNORE_FILENAME: &str = ".sandpitignore";

pub struct LocalWorkspace {
    root: PathBuf,
}

impl LocalWorkspace {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Map a project-relative path onto the root, refusing anything that
    /// would land outside it.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative =
            normalize_path(path).ok_or_else(|| anyhow!("Path escapes the workspace: {}", path))?;
        Ok(self.root.join(relative))
    }
}

fn build_walker(root: &Path, start: &Path, depth: usize) -> WalkBuilder {
    let mut builder = WalkBuilder::new(start);

    builder.standard_filters(true);
    builder.require_git(false);
    builder.follow_links(false);
    builder.max_depth(Some(depth));
    builder.sort_by_file_name(|a, b| a.cmp(b));
    builder.add_custom_ignore_filename(IGNORE_FILENAME);

    let root = root.to_path_buf();
    builder.filter_entry(move |entry| {
        let skip = entry.path() != root
            && entry
                .file_name()
                .to_str()
                .map(|name| IGNORED_DIRS.contains(&name))
                .unwrap_or(false);
        !skip
    });

    builder
}

fn walk(root: &Path, start: &Path, depth: usize) -> Vec<WorkspaceEntry> {
    let mut entries = Vec::new();

    for entry in build_walker(root, start, depth).build() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Error walking directory: {}", e);
                continue;
            }
        };

        let relative = match entry.path().strip_prefix(root) {
            Ok(p) if !p.as_os_str().is_empty() => p.to_string_lossy().replace('\\', "/"),
            _ => continue,
        };

        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            entries.push(WorkspaceEntry {
                path: relative,
                kind: EntryKind::Directory,
                size: None,
                children: Vec::new(),
            });
        } else if file_type.is_file() {
            let size = entry.metadata().ok().map(|m| m.len());
            entries.push(WorkspaceEntry::file(relative, size));
        }
    }

    debug!("Listed {} entries under {}", entries.len(), start.display());
    entries
}

#[async_trait]
impl WorkspaceFiles for LocalWorkspace {
    async fn list(&self, path: Option<&str>, depth: usize) -> Result<Vec<WorkspaceEntry>> {
        let start = match path {
            Some(p) => self.resolve(p)?,
            None => self.root.clone(),
        };
        let root = self.root.clone();

        tokio::task::spawn_blocking(move || walk(&root, &start, depth))
            .await
            .context("Workspace listing task failed")
    }

    async fn read(&self, path: &str) -> Result<Option<String>> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => Ok(Some(text)),
                Err(_) => Err(anyhow!("Not a text file: {}", path)),
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", full.display())),
        }
    }

    async fn write(&self, path: &str, content: &str) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        tokio::fs::write(&full, content)
            .await
            .with_context(|| format!("Failed to write {}", full.display()))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", full.display())),
        }
    }
}
