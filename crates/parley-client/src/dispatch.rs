//! Message dispatch: streaming first, non-streaming fallback.
//!
//! ```text
//! START -> ENSURE_SESSION -> STREAM_ATTEMPT -> {STREAMED_OK | STREAM_EMPTY | STREAM_FAILED | STREAM_TIMEOUT}
//! STREAM_EMPTY | STREAM_FAILED | STREAM_TIMEOUT -> FALLBACK_CHECK
//! FALLBACK_CHECK -> {SKIP (already streaming) | FALLBACK_REQUEST}
//! FALLBACK_REQUEST -> {FALLBACK_OK | FALLBACK_NO_TEXT | FALLBACK_FAILED}
//! any terminal state -> RESOLVED (exactly once)
//! ```
//!
//! The streaming attempt runs as its own task and races a timer. Whether the
//! fallback may run is decided under the same lock the stream task takes
//! before showing its first text, so a reply is never shown twice: either the
//! stream got there first and its text wins, or the attempt is marked settled
//! and any later stream output is dropped. A timed-out task is not cancelled;
//! it is kept and joined later.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use parley_core::{extract_text, ConversationContext};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::backend::AgentBackend;
use crate::error::{ClientError, DispatchError, StreamError};
use crate::session::ensure_session;
use crate::sink::ResponseSink;
use crate::stream::{consume_stream, StreamOutcome};
use crate::types::RunAgentRequest;

/// Timing configuration for dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Upper bound on the streaming attempt, from request dispatch.
    pub stream_timeout: Duration,
    /// Pause between ensuring the session and sending the message.
    pub session_settle_delay: Duration,
}

impl DispatchConfig {
    const fn default_stream_timeout() -> Duration {
        Duration::from_secs(30)
    }

    const fn default_settle_delay() -> Duration {
        Duration::from_millis(100)
    }

    /// Override the streaming timeout.
    #[must_use]
    pub const fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    /// Override the settle delay.
    #[must_use]
    pub const fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.session_settle_delay = delay;
        self
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            stream_timeout: Self::default_stream_timeout(),
            session_settle_delay: Self::default_settle_delay(),
        }
    }
}

/// The single terminal result of [`Dispatcher::send_to_agent`].
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The streamed reply was shown; holds its last snapshot.
    StreamedSuccess(String),
    /// The fallback request produced text.
    FallbackSuccess(String),
    /// The fallback request succeeded but no text could be extracted.
    FallbackNoText(Value),
    /// Nothing could be shown.
    Failure(DispatchError),
}

impl DispatchOutcome {
    /// Reply text, for the two success variants that carry one.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::StreamedSuccess(text) | Self::FallbackSuccess(text) => Some(text),
            Self::FallbackNoText(_) | Self::Failure(_) => None,
        }
    }

    /// Returns `true` unless the dispatch failed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Failure(_))
    }
}

/// Why the streaming attempt did not settle the dispatch on its own.
#[derive(Debug, thiserror::Error)]
pub enum StreamFailure {
    /// The streaming request failed or returned a non-2xx status.
    #[error("streaming request failed: {0}")]
    Request(#[source] ClientError),

    /// The event stream broke while being read.
    #[error(transparent)]
    Read(#[from] StreamError),

    /// The attempt exceeded the configured bound.
    #[error("streaming timed out after {0:?}")]
    Timeout(Duration),

    /// The stream completed without producing text.
    #[error("stream completed without text")]
    Empty,

    /// The stream task panicked.
    #[error("stream task failed: {0}")]
    Task(String),
}

/// Who owns the visible reply of the current attempt.
enum Phase {
    /// No text yet; the fallback may still take over.
    Waiting,
    /// Streamed text is live; holds the latest snapshot.
    Streaming(String),
    /// The dispatch has been decided; stream output is ignored.
    Settled,
}

/// State shared between the dispatcher and its stream task.
struct Attempt {
    phase: Mutex<Phase>,
    sink: Arc<dyn ResponseSink>,
}

impl Attempt {
    /// Claim the reply for the stream, storing its first snapshot.
    fn first_text(&self, text: &str) {
        let mut phase = self.phase.lock();
        if matches!(*phase, Phase::Waiting) {
            *phase = Phase::Streaming(text.to_owned());
            self.sink.begin_response();
        } else {
            tracing::debug!("Dropping late stream output");
        }
    }

    fn update(&self, text: &str) {
        let mut phase = self.phase.lock();
        if let Phase::Streaming(current) = &mut *phase {
            text.clone_into(current);
            self.sink.update_response(text);
        }
    }

    /// Settle the attempt, returning the streamed text if streaming won.
    fn settle(&self) -> Option<String> {
        match std::mem::replace(&mut *self.phase.lock(), Phase::Settled) {
            Phase::Streaming(text) => Some(text),
            Phase::Waiting | Phase::Settled => None,
        }
    }
}

type StreamTask = JoinHandle<Result<StreamOutcome, StreamFailure>>;

/// Orchestrates one message at a time against an [`AgentBackend`].
pub struct Dispatcher<B: ?Sized> {
    backend: Arc<B>,
    sink: Arc<dyn ResponseSink>,
    config: DispatchConfig,
    background: Vec<StreamTask>,
}

impl<B> Dispatcher<B>
where
    B: AgentBackend + ?Sized + 'static,
{
    /// Create a dispatcher.
    #[must_use]
    pub fn new(backend: Arc<B>, sink: Arc<dyn ResponseSink>, config: DispatchConfig) -> Self {
        Self {
            backend,
            sink,
            config,
            background: Vec::new(),
        }
    }

    /// Swap the backend, e.g. after the server URL changed.
    pub fn set_backend(&mut self, backend: Arc<B>) {
        self.backend = backend;
    }

    /// Current configuration.
    #[must_use]
    pub const fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Number of abandoned stream tasks still running.
    #[must_use]
    pub fn pending_background(&self) -> usize {
        self.background.iter().filter(|t| !t.is_finished()).count()
    }

    /// Send `message` and surface exactly one outcome to the sink.
    ///
    /// The caller must not start another dispatch until this one returns.
    pub async fn send_to_agent(
        &mut self,
        context: &mut ConversationContext,
        message: &str,
    ) -> DispatchOutcome {
        self.reap_background();
        self.sink.show_thinking();

        let outcome = self.dispatch(context, message).await;

        match &outcome {
            DispatchOutcome::StreamedSuccess(text) => {
                tracing::info!(len = text.len(), "Reply streamed");
            }
            DispatchOutcome::FallbackSuccess(text) => {
                tracing::info!(len = text.len(), "Reply received via fallback");
            }
            DispatchOutcome::FallbackNoText(raw) => {
                tracing::warn!("Fallback response contained no extractable text");
                tracing::debug!(
                    raw = %serde_json::to_string_pretty(raw).unwrap_or_default(),
                    "Full fallback response"
                );
            }
            DispatchOutcome::Failure(e) => {
                tracing::error!(error = %e, "Dispatch failed");
            }
        }

        self.sink.resolve(&outcome);
        self.sink.connection_status(outcome.is_success());
        outcome
    }

    /// Check whether the current session is reachable and report it.
    pub async fn check_connection(&self, context: &ConversationContext) -> bool {
        let connected = match self.backend.get_session(&context.identity()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Connection check failed");
                false
            }
        };
        self.sink.connection_status(connected);
        connected
    }

    /// Wait up to `limit` for abandoned stream tasks to finish.
    ///
    /// Returns the number still running when the limit expired.
    pub async fn drain(&mut self, limit: Duration) -> usize {
        let tasks = std::mem::take(&mut self.background);
        let total = tasks.len();
        if total == 0 {
            return 0;
        }

        let mut finished = 0;
        let deadline = tokio::time::Instant::now() + limit;
        for task in tasks {
            if tokio::time::timeout_at(deadline, task).await.is_ok() {
                finished += 1;
            }
        }
        tracing::debug!(total, finished, "Drained background stream tasks");
        total - finished
    }

    async fn dispatch(
        &mut self,
        context: &mut ConversationContext,
        message: &str,
    ) -> DispatchOutcome {
        match ensure_session(self.backend.as_ref(), context).await {
            Ok(status) => {
                tracing::debug!(?status, session_id = %context.session_id(), "Session ready");
            }
            Err(e) => return DispatchOutcome::Failure(e.into()),
        }
        if !self.config.session_settle_delay.is_zero() {
            tokio::time::sleep(self.config.session_settle_delay).await;
        }

        let request = RunAgentRequest::streaming(&context.identity(), message);
        tracing::debug!(
            app_name = %request.app_name,
            session_id = %request.session_id,
            len = message.len(),
            "Sending message"
        );

        let attempt = Arc::new(Attempt {
            phase: Mutex::new(Phase::Waiting),
            sink: Arc::clone(&self.sink),
        });
        let failure = self.stream_attempt(&request, &attempt).await;

        if let Some(text) = attempt.settle() {
            if let Some(failure) = &failure {
                tracing::debug!(reason = %failure, "Keeping streamed reply, skipping fallback");
            }
            return DispatchOutcome::StreamedSuccess(text);
        }

        let reason = failure.unwrap_or(StreamFailure::Empty);
        tracing::debug!(reason = %reason, "Falling back to non-streaming request");

        match self.backend.run(&request.non_streaming()).await {
            Ok(result) => {
                let text = extract_text(&result);
                if text.is_empty() {
                    DispatchOutcome::FallbackNoText(result)
                } else {
                    DispatchOutcome::FallbackSuccess(text)
                }
            }
            Err(e) => DispatchOutcome::Failure(DispatchError::Fallback(e)),
        }
    }

    /// Run the streaming attempt under the timeout.
    ///
    /// Returns why it did not finish with text, or `None` if it did.
    async fn stream_attempt(
        &mut self,
        request: &RunAgentRequest,
        attempt: &Arc<Attempt>,
    ) -> Option<StreamFailure> {
        let mut task = self.spawn_stream(request.clone(), Arc::clone(attempt));

        match tokio::time::timeout(self.config.stream_timeout, &mut task).await {
            Ok(Ok(Ok(StreamOutcome::CompletedWithText(_)))) => None,
            Ok(Ok(Ok(StreamOutcome::CompletedEmpty))) => Some(StreamFailure::Empty),
            Ok(Ok(Err(failure))) => Some(failure),
            Ok(Err(join_error)) => Some(StreamFailure::Task(join_error.to_string())),
            Err(_) => {
                tracing::debug!(
                    timeout = ?self.config.stream_timeout,
                    "Streaming attempt timed out"
                );
                self.background.push(task);
                Some(StreamFailure::Timeout(self.config.stream_timeout))
            }
        }
    }

    fn spawn_stream(&self, request: RunAgentRequest, attempt: Arc<Attempt>) -> StreamTask {
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            let body = backend
                .run_sse(&request)
                .await
                .map_err(StreamFailure::Request)?;

            let on_first = Arc::clone(&attempt);
            let outcome = consume_stream(
                body,
                move |text: &str| on_first.first_text(text),
                move |text: &str| attempt.update(text),
            )
            .await?;
            Ok(outcome)
        })
    }

    fn reap_background(&mut self) {
        let before = self.background.len();
        self.background.retain(|task| !task.is_finished());
        let reaped = before - self.background.len();
        if reaped > 0 {
            tracing::debug!(
                reaped,
                remaining = self.background.len(),
                "Reaped background stream tasks"
            );
        }
    }
}
