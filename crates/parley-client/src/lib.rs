//! Agent backend client for parley.
//!
//! This crate implements the response-ingestion pipeline of the chat client:
//!
//! - [`AdkClient`]: reqwest implementation of the [`AgentBackend`] HTTP surface
//! - [`ensure_session`]: makes sure the server-side session exists, trying a
//!   chain of creation strategies
//! - [`consume_stream`]: incremental SSE reader that feeds snapshots of the
//!   agent's reply to a live sink
//! - [`Dispatcher`]: session ensure, time-bounded streaming attempt, and a
//!   non-streaming fallback, resolving exactly one [`DispatchOutcome`]
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │   Front end      │────▶│   Dispatcher     │────▶ ResponseSink
//! │   (CLI)          │     │                  │      (thinking, live text,
//! └──────────────────┘     └───┬─────┬─────┬──┘       one resolve)
//!                              │     │     │
//!                 ensure_session  run_sse  run (fallback)
//!                              │     │     │
//!                          ┌───▼─────▼─────▼──┐
//!                          │  AgentBackend    │
//!                          │  (AdkClient)     │
//!                          └────────┬─────────┘
//!                                   │ HTTP / SSE
//!                          ┌────────▼─────────┐
//!                          │   Agent server   │
//!                          └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use parley_client::{AdkClient, DispatchConfig, Dispatcher, ResponseSink};
//! use parley_core::{ConversationContext, MemoryStateStore};
//!
//! # async fn example(sink: Arc<dyn ResponseSink>) -> Result<(), Box<dyn std::error::Error>> {
//! let mut context = ConversationContext::load(Arc::new(MemoryStateStore::new()))?;
//! let backend = Arc::new(AdkClient::new(&context.settings().server_url));
//! let mut dispatcher = Dispatcher::new(backend, sink, DispatchConfig::default());
//!
//! let outcome = dispatcher.send_to_agent(&mut context, "hello").await;
//! println!("{:?}", outcome.text());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod backend;
pub mod client;
pub mod dispatch;
pub mod error;
pub mod session;
pub mod sink;
pub mod stream;
pub mod types;

pub use backend::{AgentBackend, ByteStream};
pub use client::AdkClient;
pub use dispatch::{DispatchConfig, DispatchOutcome, Dispatcher, StreamFailure};
pub use error::{ClientError, DispatchError, Result, SessionError, StreamError};
pub use session::{ensure_session, SessionStatus};
pub use sink::ResponseSink;
pub use stream::{consume_stream, SseLineDecoder, SseRecord, StreamOutcome};
pub use types::{CreateSessionRequest, MessagePart, NewMessage, RunAgentRequest};
