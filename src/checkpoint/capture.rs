use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::collections::HashSet;
use tracing::{debug, info};

use super::{
    new_checkpoint_id, Checkpoint, CheckpointFile, CheckpointKind, DEFAULT_CHECKPOINT_MAX_BYTES,
    DEFAULT_CHECKPOINT_MAX_FILES,
};
use crate::workspace::{list_project_files, WorkspaceFiles};

#[derive(Debug, Clone, Copy)]
pub struct CaptureLimits {
    pub max_files: usize,
    pub max_bytes: usize,
}

impl Default for CaptureLimits {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_CHECKPOINT_MAX_FILES,
            max_bytes: DEFAULT_CHECKPOINT_MAX_BYTES,
        }
    }
}

/// Snapshot the workspace's files in listing order.
///
/// Stops and marks the checkpoint truncated as soon as the next file would
/// exceed either cap. Missing or unreadable files are skipped. Only a
/// failed listing is an error.
pub async fn capture(
    workspace: &dyn WorkspaceFiles,
    label: &str,
    kind: CheckpointKind,
    prompt: Option<&str>,
    limits: CaptureLimits,
) -> Result<Checkpoint> {
    capture_with_targets(workspace, label, kind, prompt, limits, &[]).await
}

/// Like [`capture`], but `targets` are snapshotted before anything else.
///
/// A target that exists must make it into the checkpoint: an unreadable
/// target, or one that does not fit the caps, fails the capture. Targets
/// that do not exist yet have nothing to back up.
pub async fn capture_with_targets(
    workspace: &dyn WorkspaceFiles,
    label: &str,
    kind: CheckpointKind,
    prompt: Option<&str>,
    limits: CaptureLimits,
    targets: &[String],
) -> Result<Checkpoint> {
    let mut files = Vec::new();
    let mut total_bytes = 0usize;
    let mut truncated = false;

    for path in targets {
        let content = workspace
            .read(path)
            .await
            .with_context(|| format!("Cannot back up {}", path))?;
        let Some(content) = content else {
            debug!("{} does not exist yet, nothing to back up", path);
            continue;
        };
        if files.len() >= limits.max_files || total_bytes + content.len() > limits.max_bytes {
            bail!("Cannot back up {}: checkpoint size limits reached", path);
        }
        total_bytes += content.len();
        files.push(CheckpointFile {
            path: path.clone(),
            content,
        });
    }

    let seen: HashSet<&str> = targets.iter().map(String::as_str).collect();
    let paths = list_project_files(workspace).await?;

    for path in paths {
        if seen.contains(path.as_str()) {
            continue;
        }
        if files.len() >= limits.max_files {
            truncated = true;
            break;
        }

        let content = match workspace.read(&path).await {
            Ok(Some(content)) => content,
            Ok(None) => continue,
            Err(e) => {
                debug!("Skipping unreadable file {} in checkpoint: {:#}", path, e);
                continue;
            }
        };

        if total_bytes + content.len() > limits.max_bytes {
            truncated = true;
            break;
        }
        total_bytes += content.len();
        files.push(CheckpointFile { path, content });
    }

    let now = Utc::now();
    let checkpoint = Checkpoint {
        id: new_checkpoint_id(now),
        label: label.to_string(),
        kind,
        created_at: now,
        prompt: prompt.map(str::to_string),
        file_count: files.len(),
        files,
        total_bytes,
        truncated,
    };

    info!(
        "Captured checkpoint {} ({} files, {} bytes{})",
        checkpoint.id,
        checkpoint.file_count,
        checkpoint.total_bytes,
        if truncated { ", truncated" } else { "" }
    );
    Ok(checkpoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::LocalWorkspace;
    use tempfile::TempDir;

    fn workspace(files: &[(&str, &str)]) -> (TempDir, LocalWorkspace) {
        let tmp = TempDir::new().unwrap();
        for (path, content) in files {
            let full = tmp.path().join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, content).unwrap();
        }
        let workspace = LocalWorkspace::new(tmp.path().to_path_buf());
        (tmp, workspace)
    }

    #[tokio::test]
    async fn test_capture_everything_within_limits() {
        let (_tmp, ws) = workspace(&[("a.ts", "aaa"), ("dir/b.ts", "bb")]);

        let checkpoint = capture(
            &ws,
            "manual",
            CheckpointKind::Manual,
            Some("p"),
            CaptureLimits::default(),
        )
        .await
        .unwrap();
        assert_eq!(checkpoint.file_count, 2);
        assert_eq!(checkpoint.total_bytes, 5);
        assert!(!checkpoint.truncated);
        assert_eq!(checkpoint.prompt.as_deref(), Some("p"));
        assert_eq!(checkpoint.files[1].path, "dir/b.ts");
    }

    #[tokio::test]
    async fn test_file_cap_truncates() {
        let (_tmp, ws) = workspace(&[("a.ts", "a"), ("b.ts", "b"), ("c.ts", "c")]);
        let limits = CaptureLimits {
            max_files: 2,
            max_bytes: 1024,
        };

        let checkpoint = capture(&ws, "x", CheckpointKind::Manual, None, limits)
            .await
            .unwrap();
        assert_eq!(checkpoint.file_count, 2);
        assert!(checkpoint.truncated);

        let exact = CaptureLimits {
            max_files: 3,
            max_bytes: 3,
        };
        let checkpoint = capture(&ws, "x", CheckpointKind::Manual, None, exact)
            .await
            .unwrap();
        assert_eq!(checkpoint.file_count, 3);
        assert!(!checkpoint.truncated);
    }

    #[tokio::test]
    async fn test_byte_cap_truncates() {
        let (_tmp, ws) = workspace(&[("a.ts", "aaaa"), ("b.ts", "bbbb")]);
        let limits = CaptureLimits {
            max_files: 10,
            max_bytes: 6,
        };

        let checkpoint = capture(&ws, "x", CheckpointKind::Manual, None, limits)
            .await
            .unwrap();
        assert_eq!(checkpoint.file_count, 1);
        assert_eq!(checkpoint.total_bytes, 4);
        assert!(checkpoint.truncated);
    }

    #[tokio::test]
    async fn test_targets_come_first() {
        let (_tmp, ws) = workspace(&[
            ("f0.ts", "0"),
            ("f1.ts", "1"),
            ("f2.ts", "2"),
            ("f3.ts", "3"),
            ("f4.ts", "4"),
        ]);
        let limits = CaptureLimits {
            max_files: 3,
            max_bytes: 1024,
        };
        let targets = vec!["f4.ts".to_string(), "new.ts".to_string()];

        let checkpoint = capture_with_targets(
            &ws,
            "before",
            CheckpointKind::BeforeApply,
            None,
            limits,
            &targets,
        )
        .await
        .unwrap();
        let paths: Vec<&str> = checkpoint.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["f4.ts", "f0.ts", "f1.ts"]);
        assert!(checkpoint.truncated);
    }

    #[tokio::test]
    async fn test_target_over_limits_fails() {
        let (tmp, ws) = workspace(&[("small.ts", "s"), ("big.ts", "0123456789")]);
        let limits = CaptureLimits {
            max_files: 10,
            max_bytes: 4,
        };

        let err = capture_with_targets(
            &ws,
            "before",
            CheckpointKind::BeforeApply,
            None,
            limits,
            &["big.ts".to_string()],
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("big.ts"));

        // Unreadable targets fail too
        std::fs::write(tmp.path().join("blob.bin"), [0xff, 0xfe]).unwrap();
        assert!(capture_with_targets(
            &ws,
            "before",
            CheckpointKind::BeforeApply,
            None,
            CaptureLimits::default(),
            &["blob.bin".to_string()],
        )
        .await
        .is_err());
    }

    #[tokio::test]
    async fn test_unreadable_files_are_skipped() {
        let (tmp, ws) = workspace(&[("a.ts", "a")]);
        std::fs::write(tmp.path().join("blob.bin"), [0xff, 0xfe, 0x00]).unwrap();

        let limits = CaptureLimits::default();
        let checkpoint = capture(&ws, "x", CheckpointKind::Manual, None, limits)
            .await
            .unwrap();
        assert_eq!(checkpoint.file_count, 1);
        assert_eq!(checkpoint.files[0].path, "a.ts");
        assert!(!checkpoint.truncated);
    }
}
