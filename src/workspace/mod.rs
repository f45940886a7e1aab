//! Project workspace access.
//!
//! The sandbox's file tree is an external mutable resource. Everything in
//! this crate reaches it through `WorkspaceFiles`, implemented remotely over
//! HTTP (`crate::api::RemoteWorkspace`) and locally on disk
//! (`LocalWorkspace`).

mod local;
#[cfg(test)]
pub mod memory;

pub use local::LocalWorkspace;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Default depth for project listings.
pub const DEFAULT_LIST_DEPTH: usize = 8;

/// Directory names never treated as project source.
pub const IGNORED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    ".next",
    "dist",
    "build",
    "target",
    ".turbo",
    ".vercel",
    "coverage",
];

/// File service scoped to a single project root.
#[async_trait]
pub trait WorkspaceFiles: Send + Sync {
    /// List entries below `path` (the root when `None`) down to `depth`.
    async fn list(&self, path: Option<&str>, depth: usize) -> Result<Vec<WorkspaceEntry>>;

    /// Read a file. `Ok(None)` means the file does not exist.
    async fn read(&self, path: &str) -> Result<Option<String>>;

    async fn write(&self, path: &str, content: &str) -> Result<()>;

    async fn delete(&self, path: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    #[serde(alias = "dir")]
    Directory,
}

/// One node of a project listing. Remote listings may nest children;
/// `flatten_files` walks them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<WorkspaceEntry>,
}

impl WorkspaceEntry {
    pub fn file(path: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
            size,
            children: Vec::new(),
        }
    }
}

fn is_ignored(path: &str) -> bool {
    path.split('/').any(|segment| IGNORED_DIRS.contains(&segment))
}

/// File paths of a listing in pre-order, skipping ignored directories.
pub fn flatten_files(entries: &[WorkspaceEntry]) -> Vec<String> {
    let mut files = Vec::new();
    let mut stack: Vec<&WorkspaceEntry> = entries.iter().rev().collect();

    while let Some(entry) = stack.pop() {
        if is_ignored(&entry.path) {
            continue;
        }
        match entry.kind {
            EntryKind::File => files.push(entry.path.clone()),
            EntryKind::Directory => stack.extend(entry.children.iter().rev()),
        }
    }

    files
}

/// Every project file path, in listing order.
pub async fn list_project_files(workspace: &dyn WorkspaceFiles) -> Result<Vec<String>> {
    let entries = workspace.list(None, DEFAULT_LIST_DEPTH).await?;
    Ok(flatten_files(&entries))
}
