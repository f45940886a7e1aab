//! Validation of model-proposed edits.
//!
//! This is the only gate between model output and workspace mutation. It
//! never fails: invalid candidates are dropped (and logged), never repaired
//! into something the model did not ask for.

use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::warn;

/// Default maximum number of edits kept from one proposal.
pub const DEFAULT_MAX_EDITS: usize = 20;

/// What to do with a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditAction {
    Write { content: String },
    Delete,
}

/// An edit whose path is relative, traversal-free, non-empty and unique
/// within its batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEdit {
    pub path: String,
    pub action: EditAction,
}

impl NormalizedEdit {
    pub fn is_delete(&self) -> bool {
        matches!(self.action, EditAction::Delete)
    }

    /// The candidate shape this edit was accepted from.
    pub fn to_candidate(&self) -> Value {
        match &self.action {
            EditAction::Write { content } => json!({ "path": self.path, "content": content }),
            EditAction::Delete => json!({ "path": self.path, "delete": true }),
        }
    }
}

impl Serialize for NormalizedEdit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_candidate().serialize(serializer)
    }
}

fn drive_letter() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z]:").expect("valid drive-letter regex"))
}

/// Normalize a relative path. `None` for absolute, empty or escaping paths.
pub fn normalize_path(raw: &str) -> Option<String> {
    if raw.contains('\0') {
        return None;
    }

    let path = raw.trim().replace('\\', "/");
    if path.starts_with('/') || path.starts_with('~') || drive_letter().is_match(&path) {
        return None;
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

fn normalize_one(candidate: &Value) -> Result<NormalizedEdit, &'static str> {
    let object = candidate.as_object().ok_or("candidate is not an object")?;
    let raw_path = object
        .get("path")
        .and_then(Value::as_str)
        .ok_or("path is not a string")?;
    let path = normalize_path(raw_path).ok_or("path is absolute, empty or escapes the project")?;

    let action = if object.get("delete").and_then(Value::as_bool) == Some(true) {
        EditAction::Delete
    } else {
        let content = object
            .get("content")
            .and_then(Value::as_str)
            .ok_or("neither string content nor delete flag")?;
        EditAction::Write {
            content: content.to_string(),
        }
    };

    Ok(NormalizedEdit { path, action })
}

/// Validate candidates in order, keeping the first occurrence of each path
/// and at most `max_edits` edits.
pub fn normalize(candidates: &[Value], max_edits: usize) -> Vec<NormalizedEdit> {
    let mut seen = HashSet::new();
    let mut edits = Vec::new();

    for (index, candidate) in candidates.iter().enumerate() {
        if edits.len() >= max_edits {
            warn!(
                "Edit cap of {} reached, ignoring {} remaining candidate(s)",
                max_edits,
                candidates.len() - index
            );
            break;
        }

        match normalize_one(candidate) {
            Ok(edit) => {
                if seen.insert(edit.path.clone()) {
                    edits.push(edit);
                } else {
                    warn!("Dropping duplicate edit for {}", edit.path);
                }
            }
            Err(reason) => warn!("Dropping edit candidate #{}: {}", index, reason),
        }
    }

    edits
}
