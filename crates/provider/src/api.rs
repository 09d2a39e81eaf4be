//! REST client for the video-generation provider.
//!
//! Wraps the provider's HTTP API (task dispatch and status polling) using
//! [`reqwest`]. Raw response bodies go through the [`crate::wire`]
//! normalization adapter; no other module parses provider JSON.

use serde::Serialize;

use crate::wire::{self, TaskStatus, WireError};

/// HTTP client for the video provider.
pub struct VideoApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// Payload for a task dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchRequest {
    /// Provider-side model name (from the catalog entry).
    pub model: String,
    pub script: String,
    pub image_urls: Vec<String>,
    pub aspect_ratio: String,
    pub duration_secs: u32,
    /// Optional risk hint forwarded to providers that tune sampling on it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_hint: Option<String>,
    /// Optional quality-tier hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_hint: Option<String>,
}

/// Errors from the provider REST layer.
#[derive(Debug, thiserror::Error)]
pub enum VideoApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("Provider API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The response body did not match any known wire shape.
    #[error(transparent)]
    Wire(#[from] WireError),
}

impl VideoApi {
    /// Create a new API client.
    ///
    /// * `base_url` - Base HTTP URL, e.g. `https://api.provider.example`.
    /// * `api_key`  - Bearer token for the provider account.
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling across clients).
    pub fn with_client(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    /// Dispatch a generation task.
    ///
    /// Sends `POST /v1/tasks` and returns the provider task handle used for
    /// subsequent status polls.
    pub async fn dispatch(&self, request: &DispatchRequest) -> Result<String, VideoApiError> {
        let response = self
            .client
            .post(format!("{}/v1/tasks", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let body = Self::read_success_body(response).await?;
        Ok(wire::extract_task_handle(&body)?)
    }

    /// Poll the status of a dispatched task.
    ///
    /// Sends `GET /v1/tasks/{handle}` and normalizes whichever wire
    /// revision the provider answers with.
    pub async fn poll_status(&self, task_handle: &str) -> Result<TaskStatus, VideoApiError> {
        let response = self
            .client
            .get(format!("{}/v1/tasks/{}", self.base_url, task_handle))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let body = Self::read_success_body(response).await?;
        Ok(wire::normalize_status(&body)?)
    }

    // ---- private helpers ----

    /// Ensure a success status code and return the body text. A non-2xx
    /// response becomes [`VideoApiError::ApiError`] with the raw body.
    async fn read_success_body(response: reqwest::Response) -> Result<String, VideoApiError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        if !status.is_success() {
            return Err(VideoApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}
