//! Error types for the agent client.

use thiserror::Error;

/// A result type using `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors from a single HTTP exchange with the agent server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be sent or the connection failed.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// Response status code.
        status: u16,
        /// Response body, or the status reason if the body was empty.
        message: String,
    },

    /// A 2xx response body was not the expected JSON.
    #[error("failed to parse response: {0}")]
    Decode(String),

    /// The configured server URL cannot be used to build request URLs.
    #[error("invalid server URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Returns `true` for connection-level failures.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// HTTP status code, if the server answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors while reading an event stream.
///
/// Malformed records are not errors; they are skipped inside the consumer.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The underlying byte stream failed mid-read.
    #[error("stream read failed: {0}")]
    Read(String),
}

/// Errors from ensuring a server-side session exists.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Every creation strategy failed.
    #[error("failed to create session after {attempts} attempts (last error: {last_error})")]
    CreationFailed {
        /// Number of creation requests issued.
        attempts: usize,
        /// Description of the final failure.
        last_error: String,
    },
}

/// Reason carried by a failed dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No session could be ensured; nothing was sent.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Streaming did not produce a reply and the fallback request failed.
    #[error("fallback request failed: {0}")]
    Fallback(#[source] ClientError),
}

impl DispatchError {
    /// Message shown to the user in place of an agent reply.
    #[must_use]
    pub fn user_message(&self) -> String {
        let detail = match self {
            Self::Session(_) => "Failed to create session".to_string(),
            Self::Fallback(e) => e.to_string(),
        };
        format!(
            "Unable to connect to the server: {detail}. Please check your connection and try again."
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_helpers() {
        let err = ClientError::Http {
            status: 503,
            message: "unavailable".into(),
        };
        assert_eq!(err.status(), Some(503));
        assert!(!err.is_network());
        assert_eq!(err.to_string(), "HTTP 503: unavailable");
    }

    #[test]
    fn decode_error_has_no_status() {
        let err = ClientError::Decode("eof".into());
        assert_eq!(err.status(), None);
    }

    #[test]
    fn user_messages() {
        let session = DispatchError::Session(SessionError::CreationFailed {
            attempts: 3,
            last_error: "HTTP 500: boom".into(),
        });
        assert_eq!(
            session.user_message(),
            "Unable to connect to the server: Failed to create session. Please check your connection and try again."
        );

        let fallback = DispatchError::Fallback(ClientError::Http {
            status: 502,
            message: "bad gateway".into(),
        });
        assert!(fallback.user_message().contains("HTTP 502: bad gateway"));
    }
}
