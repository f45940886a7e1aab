//! Streaming generation over HTTP.

use async_trait::async_trait;
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::info;

use super::client::ApiClient;
use super::types::GenerateRequest;
use crate::session::{ByteStream, GenerationTransport};

/// `POST {api}/generate`, answered with an event stream.
pub struct HttpGenerationTransport {
    client: Arc<ApiClient>,
    sandbox_id: Option<String>,
}

impl HttpGenerationTransport {
    /// `sandbox_id` targets an existing sandbox instead of provisioning a
    /// new one.
    pub fn new(client: Arc<ApiClient>, sandbox_id: Option<String>) -> Self {
        Self { client, sandbox_id }
    }
}

#[async_trait]
impl GenerationTransport for HttpGenerationTransport {
    async fn open(&self, prompt: &str) -> anyhow::Result<ByteStream> {
        let body = GenerateRequest {
            prompt,
            sandbox_id: self.sandbox_id.as_deref(),
        };
        let response = self.client.post_stream(&["generate"], &body).await?;
        info!("Generation stream opened");

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(anyhow::Error::from));
        Ok(stream.boxed())
    }
}
