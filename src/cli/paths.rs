use anyhow::{Context, Result};
use std::path::PathBuf;

/// Find the git root directory by searching upward from current directory.
pub fn find_git_root() -> Option<PathBuf> {
    let current = std::env::current_dir().ok()?;
    let mut path = current.as_path();

    loop {
        if path.join(".git").exists() {
            return Some(path.to_path_buf());
        }
        path = path.parent()?;
    }
}

/// Resolve the `--local` directory. `.` means the enclosing git root when
/// there is one.
pub fn resolve_local_root(local: &str) -> Result<PathBuf> {
    let path = if local == "." {
        match find_git_root() {
            Some(root) => root,
            None => std::env::current_dir().context("Failed to get current directory")?,
        }
    } else {
        PathBuf::from(local)
    };

    let root = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve local workspace: {}", local))?;
    if !root.is_dir() {
        anyhow::bail!("Local workspace is not a directory: {}", root.display());
    }
    Ok(root)
}
