//! Core types and utilities for parley.
//!
//! This crate provides the foundational pieces used by the client and the CLI:
//!
//! - **Identifiers**: user and session ids as the agent backend understands them
//! - **Conversation context**: identity, preferences and their persisted store
//! - **Normalizer**: text extraction from heterogeneous agent response JSON
//! - **Error types**: errors raised while loading or persisting client state
//!
//! # Example
//!
//! ```
//! use parley_core::extract_text;
//! use serde_json::json;
//!
//! let event = json!({"content": {"parts": [{"text": "a"}, {"text": "b"}]}});
//! assert_eq!(extract_text(&event), "ab");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod context;
pub mod error;
pub mod ids;
pub mod normalize;
pub mod settings;
pub mod store;

pub use context::{ConversationContext, ConversationIdentity};
pub use error::{CoreError, Result};
pub use ids::{IdError, SessionId, UserId};
pub use normalize::extract_text;
pub use settings::{Settings, Theme};
pub use store::{FileStateStore, MemoryStateStore, PersistedState, StateStore};
