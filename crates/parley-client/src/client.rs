//! HTTP client for the agent server API.
//!
//! This module provides [`AdkClient`], the reqwest implementation of
//! [`AgentBackend`]. All path segments taken from the conversation identity
//! are percent-encoded.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parley_core::{ConversationIdentity, UserId};
use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use serde_json::Value;

use crate::backend::{AgentBackend, ByteStream};
use crate::error::{ClientError, Result};
use crate::types::{CreateSessionRequest, RunAgentRequest};

/// Client for the agent server REST and SSE API.
#[derive(Debug, Clone)]
pub struct AdkClient {
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

impl AdkClient {
    /// Create a new client.
    ///
    /// Only the connection phase is bounded at the client level; streaming
    /// bodies may stay open as long as the server keeps them open.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the agent server (e.g., "http://localhost:8000")
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");

        Self::with_client(client, base_url)
    }

    /// Create a new client with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Set the timeout for non-streaming requests.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build `<base_url>/<segments...>`, encoding each segment.
    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn sessions_url(&self, app_name: &str, user_id: &str, session_id: Option<&str>) -> Result<Url> {
        let base = ["apps", app_name, "users", user_id, "sessions"];
        self.endpoint(base.into_iter().chain(session_id))
    }

    /// Turn a non-2xx response into `ClientError::Http`.
    async fn handle_error(response: reqwest::Response) -> ClientError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("Unknown error").to_string()
        } else {
            body
        };
        ClientError::Http {
            status: status.as_u16(),
            message,
        }
    }

    /// Read a JSON body; an empty body is `Value::Null`.
    async fn json_body(response: reqwest::Response) -> Result<Value> {
        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn post_session(&self, url: Url, body: &CreateSessionRequest) -> Result<Value> {
        let response = self
            .client
            .post(url)
            .header(ACCEPT, "application/json")
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        Self::json_body(response).await
    }
}

#[async_trait]
impl AgentBackend for AdkClient {
    async fn get_session(&self, identity: &ConversationIdentity) -> Result<()> {
        let url = self.sessions_url(
            &identity.app_name,
            identity.user_id.as_str(),
            Some(identity.session_id.as_str()),
        )?;

        let response = self
            .client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        Ok(())
    }

    async fn create_session(
        &self,
        app_name: &str,
        user_id: &UserId,
        request: &CreateSessionRequest,
    ) -> Result<Value> {
        let url = self.sessions_url(app_name, user_id.as_str(), None)?;
        self.post_session(url, request).await
    }

    async fn create_session_at(&self, identity: &ConversationIdentity) -> Result<Value> {
        let url = self.sessions_url(
            &identity.app_name,
            identity.user_id.as_str(),
            Some(identity.session_id.as_str()),
        )?;
        self.post_session(url, &CreateSessionRequest::empty()).await
    }

    async fn run_sse(&self, request: &RunAgentRequest) -> Result<ByteStream> {
        let url = self.endpoint(["run_sse"])?;

        let response = self
            .client
            .post(url)
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ClientError::from));
        Ok(body.boxed())
    }

    async fn run(&self, request: &RunAgentRequest) -> Result<Value> {
        let url = self.endpoint(["run"])?;

        let response = self
            .client
            .post(url)
            .header(ACCEPT, "application/json")
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        Self::json_body(response).await
    }
}
