//! The UI surface a dispatch reports to.

use crate::dispatch::DispatchOutcome;

/// Receiver of a dispatch's visible effects.
///
/// For each dispatch the dispatcher calls, in order:
///
/// 1. [`show_thinking`](Self::show_thinking) once
/// 2. [`begin_response`](Self::begin_response) at most once, when streamed
///    text first arrives (the placeholder becomes a live reply)
/// 3. [`update_response`](Self::update_response) with the full reply so far,
///    zero or more times, only after `begin_response`
/// 4. [`resolve`](Self::resolve) exactly once
///
/// `resolve` must clear the placeholder if it is still showing. Methods may be
/// called from a background task, hence `Send + Sync` and `&self`.
pub trait ResponseSink: Send + Sync {
    /// Show the "thinking" placeholder.
    fn show_thinking(&self);

    /// Replace the placeholder with an (empty) live reply.
    fn begin_response(&self);

    /// Replace the live reply's content with `text`.
    fn update_response(&self, text: &str);

    /// Present the terminal outcome of the dispatch.
    fn resolve(&self, outcome: &DispatchOutcome);

    /// Report whether the server is reachable.
    fn connection_status(&self, _connected: bool) {}
}
