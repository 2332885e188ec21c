//! The agent server surface the dispatcher depends on.

use async_trait::async_trait;
use futures::stream::BoxStream;
use parley_core::{ConversationIdentity, UserId};
use serde_json::Value;

use crate::error::{ClientError, Result};
use crate::types::{CreateSessionRequest, RunAgentRequest};

/// Raw body of a streaming response, chunked however the transport delivers it.
pub type ByteStream = BoxStream<'static, std::result::Result<Vec<u8>, ClientError>>;

/// Trait for agent server communication.
///
/// This trait abstracts the HTTP client, allowing scripted implementations
/// in tests.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Check that the identity's session exists.
    ///
    /// # Errors
    ///
    /// Returns an error for a non-2xx status or a failed request.
    async fn get_session(&self, identity: &ConversationIdentity) -> Result<()>;

    /// Create a session in the user's session collection.
    ///
    /// Returns the response JSON, or `Value::Null` if the body was empty.
    ///
    /// # Errors
    ///
    /// Returns an error for a non-2xx status or a failed request.
    async fn create_session(
        &self,
        app_name: &str,
        user_id: &UserId,
        request: &CreateSessionRequest,
    ) -> Result<Value>;

    /// Create the identity's session with its id in the path.
    ///
    /// # Errors
    ///
    /// Returns an error for a non-2xx status or a failed request.
    async fn create_session_at(&self, identity: &ConversationIdentity) -> Result<Value>;

    /// Start a streaming run and return the event-stream body.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the status is not 2xx.
    async fn run_sse(&self, request: &RunAgentRequest) -> Result<ByteStream>;

    /// Run without streaming and return the JSON result.
    ///
    /// # Errors
    ///
    /// Returns an error for a failed request, a non-2xx status, or a body that
    /// is not JSON.
    async fn run(&self, request: &RunAgentRequest) -> Result<Value>;
}
