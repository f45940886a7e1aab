//! Bounded unified diffs for whole-file replacements.
//!
//! Edits from the model replace entire files, so the changed region is found
//! by trimming the common prefix and suffix rather than by a general sequence
//! alignment. The result is always a single contiguous hunk.

use serde::Serialize;

/// Context lines rendered around the changed region.
pub const DEFAULT_CONTEXT_LINES: usize = 3;

/// Rendered diffs longer than this are cut in the middle.
pub const DEFAULT_MAX_DIFF_LINES: usize = 220;

/// Marker returned for identical inputs.
pub const NO_CHANGES: &str = "No changes";

/// Body of a diff whose lines match but whose line endings do not.
pub const LINE_ENDINGS_CHANGED: &str = "Line endings changed";

/// Result of diffing one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDiff {
    pub changed: bool,
    pub additions: usize,
    pub deletions: usize,
    pub diff: String,
}

/// Rendering limits.
#[derive(Debug, Clone, Copy)]
pub struct DiffOptions {
    pub context_lines: usize,
    pub max_lines: usize,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            context_lines: DEFAULT_CONTEXT_LINES,
            max_lines: DEFAULT_MAX_DIFF_LINES,
        }
    }
}

/// Split text into lines. CRLF counts as one line break and the empty text
/// has no lines at all.
fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

/// Diff two versions of a file with the default options.
pub fn diff(path: &str, before: &str, after: &str) -> FileDiff {
    diff_with(path, before, after, DiffOptions::default())
}

pub fn diff_with(path: &str, before: &str, after: &str, options: DiffOptions) -> FileDiff {
    if before == after {
        return FileDiff {
            changed: false,
            additions: 0,
            deletions: 0,
            diff: NO_CHANGES.to_string(),
        };
    }

    let old = split_lines(before);
    let new = split_lines(after);
    if old == new {
        return FileDiff {
            changed: true,
            additions: 0,
            deletions: 0,
            diff: format!("--- a/{}\n+++ b/{}\n{}", path, path, LINE_ENDINGS_CHANGED),
        };
    }

    let max_common = old.len().min(new.len());
    let prefix = old
        .iter()
        .zip(new.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take(max_common - prefix)
        .take_while(|(a, b)| a == b)
        .count();

    let old_end = old.len() - suffix;
    let new_end = new.len() - suffix;
    let removed = &old[prefix..old_end];
    let added = &new[prefix..new_end];

    let context_start = prefix.saturating_sub(options.context_lines);
    let leading = &old[context_start..prefix];
    let trailing_end = old_end.saturating_add(options.context_lines).min(old.len());
    let trailing = &old[old_end..trailing_end];

    let old_count = leading.len() + removed.len() + trailing.len();
    let new_count = leading.len() + added.len() + trailing.len();

    let mut lines = Vec::with_capacity(old_count + added.len() + 1);
    lines.push(format!(
        "@@ -{} +{} @@",
        hunk_range(context_start, old_count),
        hunk_range(context_start, new_count)
    ));
    lines.extend(leading.iter().map(|l| format!(" {}", l)));
    lines.extend(removed.iter().map(|l| format!("-{}", l)));
    lines.extend(added.iter().map(|l| format!("+{}", l)));
    lines.extend(trailing.iter().map(|l| format!(" {}", l)));

    FileDiff {
        changed: true,
        additions: added.len(),
        deletions: removed.len(),
        diff: render(&format!("a/{}", path), &format!("b/{}", path), lines, options),
    }
}

/// Diff for a file that is being removed: every line is a deletion.
pub fn deletion_diff(path: &str, before: &str) -> FileDiff {
    let old = split_lines(before);
    let mut lines = vec![format!("@@ -{} +0,0 @@", hunk_range(0, old.len()))];
    lines.extend(old.iter().map(|l| format!("-{}", l)));

    FileDiff {
        changed: true,
        additions: 0,
        deletions: old.len(),
        diff: render(
            &format!("a/{}", path),
            "/dev/null",
            lines,
            DiffOptions::default(),
        ),
    }
}

/// Diff for a file that does not exist yet: every line is an addition.
pub fn creation_diff(path: &str, after: &str) -> FileDiff {
    let new = split_lines(after);
    let mut lines = vec![format!("@@ -0,0 +{} @@", hunk_range(0, new.len()))];
    lines.extend(new.iter().map(|l| format!("+{}", l)));

    FileDiff {
        changed: true,
        additions: new.len(),
        deletions: 0,
        diff: render(
            "/dev/null",
            &format!("b/{}", path),
            lines,
            DiffOptions::default(),
        ),
    }
}

/// `start,count` with 1-based start. An empty range points at the line
/// before it, as in `diff -u`.
fn hunk_range(start: usize, count: usize) -> String {
    if count == 0 {
        format!("{},0", start)
    } else {
        format!("{},{}", start + 1, count)
    }
}

fn render(old_label: &str, new_label: &str, lines: Vec<String>, options: DiffOptions) -> String {
    let lines = truncate_lines(lines, options.max_lines);
    let mut out = format!("--- {}\n+++ {}\n", old_label, new_label);
    out.push_str(&lines.join("\n"));
    out
}

/// Keep roughly the first 60% and last 40% of an over-long hunk.
fn truncate_lines(lines: Vec<String>, max_lines: usize) -> Vec<String> {
    if lines.len() <= max_lines {
        return lines;
    }

    let head = max_lines * 3 / 5;
    let tail = max_lines - head;
    let omitted = lines.len() - head - tail;

    let mut kept = Vec::with_capacity(max_lines + 1);
    kept.extend_from_slice(&lines[..head]);
    kept.push(format!("... {} lines truncated ...", omitted));
    kept.extend_from_slice(&lines[lines.len() - tail..]);
    kept
}
