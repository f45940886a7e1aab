//! Request and response bodies for the sandbox API, and its error type.

use serde::{Deserialize, Serialize};

use crate::edit::ContextFile;
use crate::workspace::WorkspaceEntry;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct GenerateRequest<'a> {
    pub prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct EditsRequest<'a> {
    pub instruction: &'a str,
    pub files: &'a [ContextFile],
    pub sandbox_id: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct ListFilesRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<&'a str>,
    pub depth: usize,
}

#[derive(Debug, Deserialize)]
pub(super) struct ListFilesResponse {
    #[serde(default)]
    pub entries: Vec<WorkspaceEntry>,
}

#[derive(Debug, Serialize)]
pub(super) struct FilePathRequest<'a> {
    pub path: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct ReadFileResponse {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct WriteFileRequest<'a> {
    pub path: &'a str,
    pub content: &'a str,
}

/// Classification of a failed API response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStatus {
    InvalidArgument,
    Unauthenticated,
    PermissionDenied,
    NotFound,
    Timeout,
    TooLarge,
    RateLimited,
    Unavailable,
    Unknown,
}

impl ApiStatus {
    pub fn from_http_status(http_status: u16) -> Self {
        match http_status {
            400 | 422 => ApiStatus::InvalidArgument,
            401 => ApiStatus::Unauthenticated,
            403 => ApiStatus::PermissionDenied,
            404 => ApiStatus::NotFound,
            408 | 504 => ApiStatus::Timeout,
            413 => ApiStatus::TooLarge,
            429 => ApiStatus::RateLimited,
            500..=599 => ApiStatus::Unavailable,
            _ => ApiStatus::Unknown,
        }
    }

    /// Needs user action before any retry can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ApiStatus::Unauthenticated | ApiStatus::PermissionDenied
        )
    }

    pub fn error_message(&self) -> &'static str {
        match self {
            ApiStatus::InvalidArgument => "Invalid request",
            ApiStatus::Unauthenticated => "Authentication failed",
            ApiStatus::PermissionDenied => "Permission denied",
            ApiStatus::NotFound => "Not found",
            ApiStatus::Timeout => "Request timed out",
            ApiStatus::TooLarge => "Request body too large",
            ApiStatus::RateLimited => "Rate limit exceeded",
            ApiStatus::Unavailable => "Service temporarily unavailable",
            ApiStatus::Unknown => "Unknown error",
        }
    }
}

/// A non-success API response.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: ApiStatus,
    pub http_status: u16,
    pub message: String,
    pub request_id: Option<String>,
}

/// Longest response body quoted in an error message.
const MAX_ERROR_BODY_CHARS: usize = 300;

impl ApiError {
    pub fn from_http_response(http_status: u16, body: &str, request_id: Option<String>) -> Self {
        let status = ApiStatus::from_http_status(http_status);
        let body = body.trim();

        let message = match status {
            ApiStatus::Unauthenticated | ApiStatus::PermissionDenied => format!(
                "{} (HTTP {}). Check SANDPIT_API_TOKEN or the apiToken setting.",
                status.error_message(),
                http_status
            ),
            ApiStatus::RateLimited => format!(
                "Rate limit exceeded (HTTP {}). Please wait and try again.",
                http_status
            ),
            _ if body.is_empty() => format!(
                "API error (HTTP {}): {}",
                http_status,
                status.error_message()
            ),
            _ => {
                let quoted: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
                format!("API error (HTTP {}): {}", http_status, quoted)
            }
        };

        Self {
            status,
            http_status,
            message,
            request_id,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.status.is_fatal()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}
