//! Typed generation events, the message log entries built from them, and
//! the progress-line stage classifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Event decoded from a single stream frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    AssistantText {
        text: String,
    },
    ToolUse {
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    Progress {
        #[serde(default)]
        message: Option<String>,
        #[serde(default, rename = "sandboxId")]
        sandbox_id: Option<String>,
    },
    Error {
        #[serde(default, alias = "error")]
        message: Option<String>,
    },
    Complete {
        #[serde(default, rename = "previewUrl")]
        preview_url: Option<String>,
        #[serde(default, rename = "sandboxId")]
        sandbox_id: Option<String>,
    },
}

impl StreamEvent {
    pub fn parse(frame: &str) -> serde_json::Result<Self> {
        serde_json::from_str(frame)
    }
}

/// Lifecycle of one generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Idle,
    Requesting,
    Streaming,
    ProvisioningPreview,
    Ready,
    Failed,
    Canceled,
}

impl Lifecycle {
    /// Terminal states are never left except through a new `start` or `reset`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Lifecycle::Ready | Lifecycle::Failed | Lifecycle::Canceled)
    }
}

/// Coarse progress indicator. Ordering follows the declaration order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Queued,
    CreatingSandbox,
    GeneratingCode,
    InstallingDeps,
    StartingPreview,
    Ready,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Queued => "Queued",
            Stage::CreatingSandbox => "Creating sandbox",
            Stage::GeneratingCode => "Generating code",
            Stage::InstallingDeps => "Installing dependencies",
            Stage::StartingPreview => "Starting preview",
            Stage::Ready => "Ready",
        }
    }
}

/// Phrases mapped to stages, most advanced stage first. The first stage with
/// a matching phrase wins.
///
/// The upstream service gives no contract for this wording; the test below
/// pins the table so wording changes are noticed.
const STAGE_PHRASES: &[(Stage, &[&str])] = &[
    (
        Stage::StartingPreview,
        &["starting preview", "starting dev server", "dev server", "preview"],
    ),
    (
        Stage::InstallingDeps,
        &["installing", "npm install", "dependencies"],
    ),
    (
        Stage::GeneratingCode,
        &["generating", "writing code", "writing file", "code generation"],
    ),
    (
        Stage::CreatingSandbox,
        &["creating sandbox", "sandbox", "provisioning"],
    ),
];

/// Classify a free-text progress line. `None` when no phrase matches.
pub fn classify_progress(message: &str) -> Option<Stage> {
    let lower = message.to_lowercase();
    STAGE_PHRASES
        .iter()
        .find(|(_, phrases)| phrases.iter().any(|p| lower.contains(p)))
        .map(|(stage, _)| *stage)
}

/// Next stage after a progress line; never moves backward.
pub fn advance_stage(current: Stage, message: &str) -> Stage {
    match classify_progress(message) {
        Some(stage) => current.max(stage),
        None => current,
    }
}

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Entry in the session's append-only message log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: MessageKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageKind {
    AssistantText {
        text: String,
    },
    ToolUse {
        name: String,
        input: serde_json::Value,
    },
    Progress {
        message: String,
    },
    Error {
        message: String,
    },
    Complete {
        preview_url: Option<String>,
        sandbox_id: Option<String>,
    },
}

impl Message {
    pub fn new(kind: MessageKind) -> Self {
        Self {
            id: NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed),
            created_at: Utc::now(),
            kind,
        }
    }

    /// One-line rendering for terminal output.
    pub fn display_line(&self) -> String {
        match &self.kind {
            MessageKind::AssistantText { text } => text.clone(),
            MessageKind::ToolUse { name, .. } => format!("[tool] {}", name),
            MessageKind::Progress { message } => format!("… {}", message),
            MessageKind::Error { message } => format!("error: {}", message),
            MessageKind::Complete { preview_url, .. } => match preview_url {
                Some(url) => format!("complete: {}", url),
                None => "complete".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_events() {
        let event = StreamEvent::parse(r#"{"type":"progress","message":"Installing"}"#).unwrap();
        assert_eq!(
            event,
            StreamEvent::Progress {
                message: Some("Installing".to_string()),
                sandbox_id: None
            }
        );

        let event = StreamEvent::parse(
            r#"{"type":"complete","previewUrl":"https://x.dev","sandboxId":"sb-1"}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            StreamEvent::Complete {
                preview_url: Some("https://x.dev".to_string()),
                sandbox_id: Some("sb-1".to_string())
            }
        );

        let event = StreamEvent::parse(r#"{"type":"error","error":"boom"}"#).unwrap();
        assert_eq!(
            event,
            StreamEvent::Error {
                message: Some("boom".to_string())
            }
        );

        assert!(StreamEvent::parse(r#"{"type":"mystery"}"#).is_err());
        assert!(StreamEvent::parse("not json").is_err());
    }

    #[test]
    fn test_stage_phrase_table_is_pinned() {
        let cases = [
            ("Creating sandbox...", Some(Stage::CreatingSandbox)),
            ("Provisioning environment", Some(Stage::CreatingSandbox)),
            ("Generating code with the model", Some(Stage::GeneratingCode)),
            ("Writing file app/page.tsx", Some(Stage::GeneratingCode)),
            ("Running npm install", Some(Stage::InstallingDeps)),
            ("Installing dependencies in sandbox", Some(Stage::InstallingDeps)),
            ("Starting dev server", Some(Stage::StartingPreview)),
            ("Preview is warming up", Some(Stage::StartingPreview)),
            ("Thinking", None),
        ];
        for (message, expected) in cases {
            assert_eq!(classify_progress(message), expected, "{}", message);
        }
    }

    #[test]
    fn test_stage_never_regresses() {
        let lines = [
            "Creating sandbox",
            "Installing dependencies",
            "Generating code",
            "Creating sandbox",
            "unrelated",
            "Starting preview",
            "Writing file",
        ];
        let mut stage = Stage::Queued;
        let mut seen = vec![stage];
        for line in lines {
            stage = advance_stage(stage, line);
            seen.push(stage);
        }
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(stage, Stage::StartingPreview);
    }

    #[test]
    fn test_message_ids_are_monotonic() {
        let a = Message::new(MessageKind::AssistantText {
            text: "a".to_string(),
        });
        let b = Message::new(MessageKind::AssistantText {
            text: "b".to_string(),
        });
        assert!(b.id > a.id);
    }
}
