//! Shared fixtures for the client integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use parley_client::{
    AgentBackend, ByteStream, ClientError, CreateSessionRequest, DispatchOutcome, ResponseSink,
    RunAgentRequest,
};
use parley_core::{
    ConversationContext, ConversationIdentity, MemoryStateStore, PersistedState, Settings, UserId,
};
use serde_json::{json, Value};

// =============================================================================
// Context
// =============================================================================

/// A context with fixed ids pointing at `server_url`, plus its store.
pub fn context(server_url: &str) -> (ConversationContext, Arc<MemoryStateStore>) {
    let state = PersistedState {
        user_id: "u_test".parse().unwrap(),
        session_id: "s_test".parse().unwrap(),
        settings: Settings {
            server_url: server_url.to_string(),
            app_name: "helper".to_string(),
            ..Settings::default()
        },
    };
    let store = Arc::new(MemoryStateStore::with_state(state.clone()));
    let context = ConversationContext::from_state(state, store.clone());
    (context, store)
}

// =============================================================================
// Recording Sink
// =============================================================================

/// Everything the dispatcher showed, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Thinking,
    Begin,
    Update(String),
    Resolved(String),
    Connection(bool),
}

/// Sink that records every call.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn resolved(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Resolved(summary) => Some(summary),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &Event) -> usize {
        self.events().iter().filter(|event| *event == wanted).count()
    }

    fn push(&self, event: Event) {
        self.events.lock().push(event);
    }
}

/// One-line summary of an outcome for assertions.
pub fn summarize(outcome: &DispatchOutcome) -> String {
    match outcome {
        DispatchOutcome::StreamedSuccess(text) => format!("streamed:{text}"),
        DispatchOutcome::FallbackSuccess(text) => format!("fallback:{text}"),
        DispatchOutcome::FallbackNoText(_) => "no_text".to_string(),
        DispatchOutcome::Failure(e) => format!("failure:{}", e.user_message()),
    }
}

impl ResponseSink for RecordingSink {
    fn show_thinking(&self) {
        self.push(Event::Thinking);
    }

    fn begin_response(&self) {
        self.push(Event::Begin);
    }

    fn update_response(&self, text: &str) {
        self.push(Event::Update(text.to_string()));
    }

    fn resolve(&self, outcome: &DispatchOutcome) {
        self.push(Event::Resolved(summarize(outcome)));
    }

    fn connection_status(&self, connected: bool) {
        self.push(Event::Connection(connected));
    }
}

// =============================================================================
// Scripted Backend
// =============================================================================

/// One step of a scripted event stream.
#[derive(Debug, Clone)]
pub enum Step {
    /// Yield these bytes.
    Chunk(&'static str),
    /// Sleep before the next step.
    Wait(Duration),
    /// Fail the read with this message.
    Fail(&'static str),
    /// Never yield again.
    Stall,
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// In-process backend with a fixed script and call counters.
pub struct ScriptedBackend {
    session_ok: bool,
    sse: Result<Vec<Step>, u16>,
    run: Result<Value, u16>,
    stream_released: Arc<AtomicBool>,
    pub get_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub run_sse_calls: AtomicUsize,
    pub run_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            session_ok: true,
            sse: Ok(Vec::new()),
            run: Ok(json!({})),
            stream_released: Arc::new(AtomicBool::new(false)),
            get_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            run_sse_calls: AtomicUsize::new(0),
            run_calls: AtomicUsize::new(0),
        }
    }

    pub fn streaming(mut self, steps: Vec<Step>) -> Self {
        self.sse = Ok(steps);
        self
    }

    pub fn streaming_status(mut self, status: u16) -> Self {
        self.sse = Err(status);
        self
    }

    pub fn fallback(mut self, response: Value) -> Self {
        self.run = Ok(response);
        self
    }

    pub fn fallback_status(mut self, status: u16) -> Self {
        self.run = Err(status);
        self
    }

    /// Every session lookup and creation fails.
    pub fn without_session(mut self) -> Self {
        self.session_ok = false;
        self
    }

    /// Whether the last event stream handed out has been dropped.
    pub fn stream_released(&self) -> bool {
        self.stream_released.load(Ordering::SeqCst)
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn session_result(&self) -> Result<Value, ClientError> {
        if self.session_ok {
            Ok(json!({}))
        } else {
            Err(http(503))
        }
    }
}

fn http(status: u16) -> ClientError {
    ClientError::Http {
        status,
        message: "scripted".to_string(),
    }
}

#[async_trait]
impl AgentBackend for ScriptedBackend {
    async fn get_session(&self, _identity: &ConversationIdentity) -> parley_client::Result<()> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.session_result().map(|_| ())
    }

    async fn create_session(
        &self,
        _app_name: &str,
        _user_id: &UserId,
        _request: &CreateSessionRequest,
    ) -> parley_client::Result<Value> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.session_result()
    }

    async fn create_session_at(
        &self,
        _identity: &ConversationIdentity,
    ) -> parley_client::Result<Value> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.session_result()
    }

    async fn run_sse(&self, _request: &RunAgentRequest) -> parley_client::Result<ByteStream> {
        self.run_sse_calls.fetch_add(1, Ordering::SeqCst);
        let steps = self.sse.clone().map_err(http)?;

        self.stream_released.store(false, Ordering::SeqCst);
        let guard = DropFlag(Arc::clone(&self.stream_released));

        let body = futures::stream::unfold(
            (steps.into_iter(), guard),
            |(mut steps, guard)| async move {
                loop {
                    match steps.next()? {
                        Step::Chunk(text) => {
                            return Some((Ok(text.as_bytes().to_vec()), (steps, guard)));
                        }
                        Step::Wait(delay) => tokio::time::sleep(delay).await,
                        Step::Fail(message) => {
                            let err = ClientError::Decode(message.to_string());
                            return Some((Err(err), (steps, guard)));
                        }
                        Step::Stall => futures::future::pending::<()>().await,
                    }
                }
            },
        );
        Ok(body.boxed())
    }

    async fn run(&self, _request: &RunAgentRequest) -> parley_client::Result<Value> {
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        self.run.clone().map_err(http)
    }
}
