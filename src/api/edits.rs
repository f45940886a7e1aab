use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::client::ApiClient;
use super::types::EditsRequest;
use crate::edit::{ContextFile, EditGenerator};

/// Model calls can take a while on large contexts.
const EDITS_TIMEOUT_SECS: u64 = 120;

/// `POST {api}/edits`. The raw body is returned for lenient parsing.
pub struct HttpEditGenerator {
    client: Arc<ApiClient>,
    sandbox_id: String,
}

impl HttpEditGenerator {
    pub fn new(client: Arc<ApiClient>, sandbox_id: impl Into<String>) -> Self {
        Self {
            client,
            sandbox_id: sandbox_id.into(),
        }
    }
}

#[async_trait]
impl EditGenerator for HttpEditGenerator {
    async fn generate_edits(
        &self,
        instruction: &str,
        context: &[ContextFile],
    ) -> anyhow::Result<String> {
        let body = EditsRequest {
            instruction,
            files: context,
            sandbox_id: &self.sandbox_id,
        };
        let text = self
            .client
            .call_text(&["edits"], &body, EDITS_TIMEOUT_SECS)
            .await?;
        debug!("Edit response: {} bytes", text.len());
        Ok(text)
    }
}
