//! Bounded context for edit generation.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, warn};

use super::normalize_path;
use crate::workspace::{list_project_files, WorkspaceFiles};

pub const DEFAULT_MAX_CONTEXT_FILES: usize = 12;
pub const DEFAULT_MAX_CONTEXT_FILE_CHARS: usize = 12_000;
pub const DEFAULT_MAX_CONTEXT_TOTAL_CHARS: usize = 60_000;

/// Extensions considered project source when discovering context.
const SOURCE_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "json", "css", "scss", "html", "md", "mdx", "vue",
    "svelte", "py", "rs", "go", "toml", "yaml", "yml",
];

/// Generated files that match a source extension but are never useful context.
const SKIPPED_FILES: &[&str] = &["package-lock.json", "pnpm-lock.yaml", "yarn.lock"];

#[derive(Debug, Clone, Copy)]
pub struct ContextLimits {
    pub max_files: usize,
    pub max_file_chars: usize,
    pub max_total_chars: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_CONTEXT_FILES,
            max_file_chars: DEFAULT_MAX_CONTEXT_FILE_CHARS,
            max_total_chars: DEFAULT_MAX_CONTEXT_TOTAL_CHARS,
        }
    }
}

/// A file handed to the edit generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextFile {
    pub path: String,
    pub content: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

fn is_source_file(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    if SKIPPED_FILES.contains(&name) {
        return false;
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            SOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
        }
        _ => false,
    }
}

/// Cut `text` to at most `max_chars` characters.
fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => (&text[..byte_index], true),
        None => (text, false),
    }
}

/// Collect context files: the explicit paths when given, otherwise source
/// files discovered through the workspace listing.
///
/// Missing or unreadable files are skipped. An empty result is left to the
/// caller to reject.
pub async fn gather_context(
    workspace: &dyn WorkspaceFiles,
    explicit_paths: &[String],
    limits: ContextLimits,
) -> Result<Vec<ContextFile>> {
    let candidates: Vec<String> = if explicit_paths.is_empty() {
        list_project_files(workspace)
            .await?
            .into_iter()
            .filter(|path| is_source_file(path))
            .collect()
    } else {
        explicit_paths
            .iter()
            .filter_map(|raw| {
                let normalized = normalize_path(raw);
                if normalized.is_none() {
                    warn!("Ignoring context path outside the project: {}", raw);
                }
                normalized
            })
            .collect()
    };

    let mut files = Vec::new();
    let mut total = 0usize;

    for path in candidates {
        if files.len() >= limits.max_files || total >= limits.max_total_chars {
            debug!("Context cap reached at {} file(s), {} chars", files.len(), total);
            break;
        }

        let content = match workspace.read(&path).await {
            Ok(Some(content)) => content,
            Ok(None) => {
                debug!("Context file {} does not exist, skipping", path);
                continue;
            }
            Err(e) => {
                warn!("Could not read context file {}: {:#}", path, e);
                continue;
            }
        };

        let budget = limits.max_file_chars.min(limits.max_total_chars - total);
        let (kept, truncated) = truncate_chars(&content, budget);
        total += kept.chars().count();
        files.push(ContextFile {
            path,
            content: kept.to_string(),
            truncated,
        });
    }

    debug!("Gathered {} context file(s), {} chars", files.len(), total);
    Ok(files)
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

    #[test]
    fn test_source_filter() {
        assert!(is_source_file("app/page.tsx"));
        assert!(is_source_file("styles/Main.CSS"));
        assert!(!is_source_file("package-lock.json"));
        assert!(!is_source_file("public/logo.png"));
        assert!(!is_source_file(".env"));
        assert!(!is_source_file("Makefile"));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), ("hé", true));
        assert_eq!(truncate_chars("abc", 3), ("abc", false));
        assert_eq!(truncate_chars("", 0), ("", false));
    }

    #[tokio::test]
    async fn test_discovery_filters_and_caps() {
        let (_tmp, ws) = workspace(&[
            ("app/page.tsx", "<div>Home</div>"),
            ("app/layout.tsx", "layout"),
            ("public/logo.png", "binary-ish"),
            ("package-lock.json", "{}"),
        ]);

        let files = gather_context(&ws, &[], ContextLimits::default())
            .await
            .unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["app/layout.tsx", "app/page.tsx"]);

        let limits = ContextLimits {
            max_files: 1,
            ..ContextLimits::default()
        };
        assert_eq!(gather_context(&ws, &[], limits).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_explicit_paths_and_char_budgets() {
        let (_tmp, ws) = workspace(&[("a.ts", "aaaaaaaaaa"), ("b.ts", "bbbbbbbbbb")]);
        let explicit = vec![
            "a.ts".to_string(),
            "../escape.ts".to_string(),
            "missing.ts".to_string(),
            "b.ts".to_string(),
        ];
        let limits = ContextLimits {
            max_files: 12,
            max_file_chars: 8,
            max_total_chars: 12,
        };

        let files = gather_context(&ws, &explicit, limits).await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].content, "aaaaaaaa");
        assert!(files[0].truncated);
        assert_eq!(files[1].content, "bbbb");
        assert!(files[1].truncated);
    }
}
