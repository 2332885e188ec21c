//! Request bodies for the agent server API.

use parley_core::ConversationIdentity;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Session Types
// =============================================================================

/// Body for the session creation endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    /// Requested session id; omitted to let the server choose one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Initial session state (always empty).
    pub state: Map<String, Value>,
}

impl CreateSessionRequest {
    /// Body requesting a specific session id.
    #[must_use]
    pub fn with_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            state: Map::new(),
        }
    }

    /// Body with only an empty state.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Pick the session id out of a creation response (`id`, else `session_id`).
#[must_use]
pub fn assigned_session_id(response: &Value) -> Option<&str> {
    ["id", "session_id"]
        .into_iter()
        .filter_map(|key| response.get(key).and_then(Value::as_str))
        .find(|id| !id.trim().is_empty())
}

// =============================================================================
// Run Types
// =============================================================================

/// One part of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePart {
    /// Text content.
    pub text: String,
}

/// An outbound user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    /// Always `"user"`.
    pub role: String,
    /// Message parts; a single text part for chat input.
    pub parts: Vec<MessagePart>,
}

impl NewMessage {
    /// A user message with a single text part.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![MessagePart { text: text.into() }],
        }
    }
}

/// Body for `/run_sse` and `/run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunAgentRequest {
    /// Agent application name.
    pub app_name: String,
    /// User id.
    pub user_id: String,
    /// Session id.
    pub session_id: String,
    /// The message to send.
    pub new_message: NewMessage,
    /// Whether the server should stream the reply.
    pub streaming: bool,
}

impl RunAgentRequest {
    /// Build a streaming request for `text` in the given conversation.
    #[must_use]
    pub fn streaming(identity: &ConversationIdentity, text: &str) -> Self {
        Self {
            app_name: identity.app_name.clone(),
            user_id: identity.user_id.to_string(),
            session_id: identity.session_id.to_string(),
            new_message: NewMessage::user(text),
            streaming: true,
        }
    }

    /// The same request with streaming turned off.
    #[must_use]
    pub fn non_streaming(&self) -> Self {
        Self {
            streaming: false,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity() -> ConversationIdentity {
        ConversationIdentity {
            user_id: "u_1".parse().unwrap(),
            session_id: "s_1".parse().unwrap(),
            app_name: "helper".to_string(),
        }
    }

    #[test]
    fn run_request_wire_shape() {
        let request = RunAgentRequest::streaming(&identity(), "hi");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "app_name": "helper",
                "user_id": "u_1",
                "session_id": "s_1",
                "new_message": {"role": "user", "parts": [{"text": "hi"}]},
                "streaming": true
            })
        );

        let fallback = request.non_streaming();
        assert!(!fallback.streaming);
        assert_eq!(fallback.new_message, request.new_message);
    }

    #[test]
    fn create_session_bodies() {
        assert_eq!(
            serde_json::to_value(CreateSessionRequest::with_id("s_9")).unwrap(),
            json!({"session_id": "s_9", "state": {}})
        );
        assert_eq!(
            serde_json::to_value(CreateSessionRequest::empty()).unwrap(),
            json!({"state": {}})
        );
    }

    #[test]
    fn assigned_id_prefers_id() {
        assert_eq!(assigned_session_id(&json!({"id": "a", "session_id": "b"})), Some("a"));
        assert_eq!(assigned_session_id(&json!({"session_id": "b"})), Some("b"));
        assert_eq!(assigned_session_id(&json!({"id": "", "session_id": "b"})), Some("b"));
        assert_eq!(assigned_session_id(&json!({"id": 5})), None);
        assert_eq!(assigned_session_id(&json!(null)), None);
    }
}
