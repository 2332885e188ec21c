//! Server-side session bootstrap.
//!
//! Before a message is sent the conversation's session must exist on the
//! server. Servers differ in how they accept a client-chosen id, so creation
//! walks a fixed chain of strategies, each tried exactly once:
//!
//! 1. `GET .../sessions/{id}`: already exists, nothing to do
//! 2. `POST .../sessions` with `{session_id, state}`
//! 3. `POST .../sessions/{id}` with `{state}`
//! 4. `POST .../sessions` with `{state}`, adopting the id the server assigns
//!
//! Failures of individual steps are logged and absorbed; only exhausting the
//! chain is an error.

use parley_core::{ConversationContext, SessionId};

use crate::backend::AgentBackend;
use crate::error::SessionError;
use crate::types::{assigned_session_id, CreateSessionRequest};

/// How the session was ensured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// The session already existed.
    Existing,
    /// Created with the id in the request body.
    Created,
    /// Created with the id in the request path.
    CreatedInPath,
    /// The server assigned a different id, now stored in the context.
    Replaced(SessionId),
}

/// Make sure the context's session exists on the server.
///
/// # Errors
///
/// Returns `SessionError::CreationFailed` if the session does not exist and
/// every creation strategy failed.
pub async fn ensure_session<B>(
    backend: &B,
    context: &mut ConversationContext,
) -> Result<SessionStatus, SessionError>
where
    B: AgentBackend + ?Sized,
{
    let identity = context.identity();

    match backend.get_session(&identity).await {
        Ok(()) => {
            tracing::debug!(session_id = %identity.session_id, "Session exists");
            return Ok(SessionStatus::Existing);
        }
        Err(e) => {
            tracing::debug!(session_id = %identity.session_id, error = %e, "Session check failed");
        }
    }

    let with_id = CreateSessionRequest::with_id(identity.session_id.as_str());
    let last_error = match backend
        .create_session(&identity.app_name, &identity.user_id, &with_id)
        .await
    {
        Ok(_) => {
            tracing::debug!(session_id = %identity.session_id, "Created session");
            return Ok(SessionStatus::Created);
        }
        Err(e) => {
            tracing::debug!(error = %e, "Session create with id in body failed");
            e
        }
    };

    let last_error = match backend.create_session_at(&identity).await {
        Ok(_) => {
            tracing::debug!(session_id = %identity.session_id, "Created session at path");
            return Ok(SessionStatus::CreatedInPath);
        }
        Err(e) => {
            tracing::debug!(error = %e, previous = %last_error, "Session create with id in path failed");
            e
        }
    };

    match backend
        .create_session(&identity.app_name, &identity.user_id, &CreateSessionRequest::empty())
        .await
    {
        Ok(response) => {
            let session_id = match assigned_session_id(&response).map(str::parse::<SessionId>) {
                Some(Ok(id)) => id,
                _ => {
                    tracing::warn!("Server did not return a session id, generating one");
                    SessionId::generate()
                }
            };
            if let Err(e) = context.replace_session_id(session_id.clone()) {
                tracing::warn!(error = %e, "Failed to persist new session id");
            }
            Ok(SessionStatus::Replaced(session_id))
        }
        Err(e) => {
            tracing::warn!(
                session_id = %identity.session_id,
                error = %e,
                previous = %last_error,
                "All session creation strategies failed"
            );
            Err(SessionError::CreationFailed {
                attempts: 3,
                last_error: e.to_string(),
            })
        }
    }
}
