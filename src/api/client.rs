use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};
use url::Url;
use uuid::Uuid;

use super::http::{send_with_retry, RetryPolicy};
use super::types::ApiError;

/// Default request timeout in seconds
pub(super) const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connect timeout for long-lived streaming responses, which have no
/// overall deadline.
const STREAM_CONNECT_TIMEOUT_SECS: u64 = 30;

const USER_AGENT: &str = concat!("sandpit/", env!("CARGO_PKG_VERSION"));

/// HTTP client bound to one API base URL and credentials.
pub struct ApiClient {
    client: Client,
    stream_client: Client,
    base_url: Url,
    api_token: Option<String>,
    session_id: String,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(base_url: &str, api_token: Option<String>) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("Invalid API URL: {}", base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Invalid API URL: {}", base_url);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;
        let stream_client = Client::builder()
            .connect_timeout(Duration::from_secs(STREAM_CONNECT_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            stream_client,
            base_url,
            api_token,
            session_id: Uuid::new_v4().to_string(),
            retry: RetryPolicy::default(),
        })
    }

    /// Append path segments to the base URL. Segments are percent-encoded.
    pub(super) fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Invalid API URL: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request<T: Serialize + ?Sized>(
        &self,
        client: &Client,
        url: &Url,
        request_id: &str,
        body: &T,
        timeout_secs: u64,
    ) -> reqwest::RequestBuilder {
        let mut request = client
            .post(url.clone())
            .header("Content-Type", "application/json")
            .header("User-Agent", USER_AGENT)
            .header("x-request-id", request_id)
            .header("x-request-session-id", &self.session_id);

        if timeout_secs != DEFAULT_TIMEOUT_SECS {
            request = request.timeout(Duration::from_secs(timeout_secs));
        }
        if let Some(token) = &self.api_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        request.json(body)
    }

    /// POST with retries. The response may carry any status.
    pub(super) async fn post<T: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: &T,
        timeout_secs: u64,
    ) -> Result<reqwest::Response> {
        let url = self.endpoint(segments)?;
        let request_id = Uuid::new_v4().to_string();

        debug!("=== API Request ===");
        debug!("URL: {}", url);
        debug!("Request id: {}", request_id);

        send_with_retry(self.retry, || {
            self.request(&self.client, &url, &request_id, body, timeout_secs)
        })
        .await
        .with_context(|| format!("Failed to send request to {}", url))
    }

    /// POST once, for a response consumed as a stream. Streams are never
    /// retried since the server may already have acted on the request.
    pub(super) async fn post_stream<T: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: &T,
    ) -> Result<reqwest::Response> {
        let url = self.endpoint(segments)?;
        let request_id = Uuid::new_v4().to_string();
        debug!("=== API Stream Request ===");
        debug!("URL: {}", url);

        let mut request = self
            .stream_client
            .post(url.clone())
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .header("User-Agent", USER_AGENT)
            .header("x-request-id", &request_id)
            .header("x-request-session-id", &self.session_id);
        if let Some(token) = &self.api_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;
        check_status(response).await
    }

    /// POST and return the body as text.
    pub(super) async fn call_text<T: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: &T,
        timeout_secs: u64,
    ) -> Result<String> {
        let response = check_status(self.post(segments, body, timeout_secs).await?).await?;
        response.text().await.context("Failed to read response body")
    }

    /// POST and decode a JSON response.
    pub(super) async fn call<T, R>(&self, segments: &[&str], body: &T) -> Result<R>
    where
        T: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let text = self.call_text(segments, body, DEFAULT_TIMEOUT_SECS).await?;
        serde_json::from_str(&text).context("Failed to parse API response")
    }
}

/// Turn a non-success response into an `ApiError`.
pub(super) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    debug!("=== API Response ===");
    debug!("Status: {}", status);
    if status.is_success() {
        return Ok(response);
    }

    let request_id = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    let api_error = ApiError::from_http_response(status.as_u16(), &body, request_id);
    if api_error.is_fatal() {
        error!("❌ {}", api_error.message);
    } else {
        error!("API request failed: {}", api_error.message);
    }
    Err(api_error.into())
}
