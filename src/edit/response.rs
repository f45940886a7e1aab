//! Parsing the edit generator's reply.
//!
//! Generators often wrap their JSON in prose or code fences, so parsing
//! falls back to the outermost `{ ... }` span before giving up.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::EditError;

/// Notes beyond this count are dropped.
pub const MAX_NOTES: usize = 5;

/// A reply with untrusted edit candidates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditResponse {
    pub summary: Option<String>,
    pub edits: Vec<Value>,
    pub notes: Vec<String>,
}

#[derive(Deserialize)]
struct RawResponse {
    #[serde(default)]
    summary: Option<Value>,
    #[serde(default)]
    edits: Option<Value>,
    #[serde(default)]
    notes: Option<Value>,
}

fn extract_json(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        return Some(value);
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    debug!("Falling back to brace extraction for edit response");
    serde_json::from_str(&text[start..=end]).ok()
}

/// Parse a reply into summary, candidates and notes. Fields of the wrong
/// type are treated as absent; a reply with no `edits` array yields an empty
/// candidate list.
pub fn parse_edit_response(text: &str) -> Result<EditResponse, EditError> {
    let value = extract_json(text)
        .ok_or_else(|| EditError::MalformedResponse("no JSON object found".to_string()))?;
    if !value.is_object() {
        return Err(EditError::MalformedResponse(
            "expected a JSON object".to_string(),
        ));
    }
    let raw: RawResponse = serde_json::from_value(value)
        .map_err(|e| EditError::MalformedResponse(e.to_string()))?;

    let summary = raw
        .summary
        .as_ref()
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let edits = match raw.edits {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };

    let notes = match raw.notes {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .take(MAX_NOTES)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    Ok(EditResponse {
        summary,
        edits,
        notes,
    })
}
