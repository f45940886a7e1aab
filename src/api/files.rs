//! Sandbox file service over HTTP.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use tracing::debug;

use super::client::{check_status, ApiClient, DEFAULT_TIMEOUT_SECS};
use super::types::{
    FilePathRequest, ListFilesRequest, ListFilesResponse, ReadFileResponse, WriteFileRequest,
};
use crate::workspace::{WorkspaceEntry, WorkspaceFiles};

/// Files of one sandbox under `{api}/sandboxes/{id}/files/*`.
pub struct RemoteWorkspace {
    client: Arc<ApiClient>,
    sandbox_id: String,
}

impl RemoteWorkspace {
    pub fn new(client: Arc<ApiClient>, sandbox_id: impl Into<String>) -> Self {
        Self {
            client,
            sandbox_id: sandbox_id.into(),
        }
    }

    fn segments<'a>(&'a self, operation: &'a str) -> [&'a str; 4] {
        ["sandboxes", &self.sandbox_id, "files", operation]
    }
}

#[async_trait]
impl WorkspaceFiles for RemoteWorkspace {
    async fn list(&self, path: Option<&str>, depth: usize) -> Result<Vec<WorkspaceEntry>> {
        let body = ListFilesRequest { path, depth };
        let response: ListFilesResponse = self.client.call(&self.segments("list"), &body).await?;
        debug!("Remote listing returned {} top-level entries", response.entries.len());
        Ok(response.entries)
    }

    async fn read(&self, path: &str) -> Result<Option<String>> {
        let response = self
            .client
            .post(
                &self.segments("read"),
                &FilePathRequest { path },
                DEFAULT_TIMEOUT_SECS,
            )
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body: ReadFileResponse = check_status(response).await?.json().await?;
        Ok(body.content)
    }

    async fn write(&self, path: &str, content: &str) -> Result<()> {
        self.client
            .call_text(
                &self.segments("write"),
                &WriteFileRequest { path, content },
                DEFAULT_TIMEOUT_SECS,
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let response = self
            .client
            .post(
                &self.segments("delete"),
                &FilePathRequest { path },
                DEFAULT_TIMEOUT_SECS,
            )
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(response).await?;
        Ok(())
    }
}
