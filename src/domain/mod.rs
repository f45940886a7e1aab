//! Domain types shared across modules.
//!
//! Both batched edit application and checkpoint restore write many files
//! independently and report per-file outcomes with these types.

use serde::Serialize;

/// A file that could not be written during a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: String,
    pub error: String,
}

impl FileFailure {
    pub fn new(path: impl Into<String>, error: &anyhow::Error) -> Self {
        Self {
            path: path.into(),
            error: format!("{:#}", error),
        }
    }
}

/// Per-file outcome of a best-effort batch: never collapsed into a boolean.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<FileFailure>,
}

impl BatchOutcome {
    pub fn record(&mut self, path: &str, result: anyhow::Result<()>) {
        match result {
            Ok(()) => self.succeeded.push(path.to_string()),
            Err(e) => self.failed.push(FileFailure::new(path, &e)),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
