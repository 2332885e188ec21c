//! Parley - terminal chat client for agent servers.
//!
//! This is the entry point for the `parley` binary.

mod app;
mod commands;
mod ui;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use parley_client::DispatchConfig;
use parley_core::{ConversationContext, FileStateStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use app::{App, CONNECTION_CHECK_INTERVAL};
use ui::TerminalSink;

/// Parley - chat with an agent server from the terminal.
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Agent server URL (saved for later runs).
    #[arg(long, env = "PARLEY_SERVER_URL")]
    server: Option<String>,

    /// Agent application name (saved for later runs).
    #[arg(long, env = "PARLEY_APP_NAME")]
    app: Option<String>,

    /// Path of the state file (defaults to the user config directory).
    #[arg(long, env = "PARLEY_STATE_FILE")]
    state_file: Option<PathBuf>,

    /// Seconds to wait for a streamed reply before falling back.
    #[arg(long, env = "PARLEY_STREAM_TIMEOUT", default_value_t = 30)]
    stream_timeout_secs: u64,

    /// Seconds to wait for session and non-streaming requests.
    #[arg(long, env = "PARLEY_REQUEST_TIMEOUT", default_value_t = 30)]
    request_timeout_secs: u64,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    let filter = if args.debug {
        EnvFilter::new("parley_core=debug,parley_client=debug,parley_cli=debug,warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Load persisted identity and preferences
    let store = match &args.state_file {
        Some(path) => FileStateStore::new(path),
        None => FileStateStore::in_config_dir()?,
    };
    tracing::debug!(path = %store.path().display(), "Using state file");
    let mut context = ConversationContext::load(Arc::new(store))?;

    // Flags override and persist the stored preferences
    if let Some(server) = &args.server {
        context.update_settings(|settings| settings.set_server_url(server))?;
    }
    if let Some(app_name) = &args.app {
        context.update_settings(|settings| {
            settings.set_app_name(app_name);
            Ok(())
        })?;
    }

    let config = DispatchConfig::default()
        .with_stream_timeout(Duration::from_secs(args.stream_timeout_secs));
    let sink = Arc::new(TerminalSink::stdout(context.settings().theme));
    let request_timeout = Duration::from_secs(args.request_timeout_secs);
    let mut app = App::new(context, sink, config, request_timeout);

    app.banner();
    let result = run_repl(&mut app).await;
    app.shutdown().await;

    result
}

/// Read input lines until EOF, `/quit` or Ctrl-C.
///
/// Dispatches run inline, so input typed while one is outstanding is only
/// read after it resolves. The connection is checked on a timer while idle.
/// One Ctrl-C listener lives for the whole loop, so a signal during a
/// dispatch ends the session too.
async fn run_repl(app: &mut App) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut connection_interval = tokio::time::interval(CONNECTION_CHECK_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    app.prompt();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if interruptible(app.handle_line(&line), ctrl_c.as_mut()).await.is_none() {
                    app.interrupted();
                    break;
                }
                if app.should_quit() {
                    break;
                }
                app.prompt();
            }

            _ = connection_interval.tick() => {
                app.check_connection().await;
            }

            _ = &mut ctrl_c => {
                break;
            }
        }
    }

    Ok(())
}

/// Run `work` to completion unless `interrupt` finishes first.
async fn interruptible<T, I>(work: impl Future<Output = T>, interrupt: Pin<&mut I>) -> Option<T>
where
    I: Future,
{
    tokio::select! {
        output = work => Some(output),
        _ = interrupt => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn interrupt_cuts_work_short() {
        let signal = tokio::time::sleep(Duration::from_secs(1));
        tokio::pin!(signal);

        let work = tokio::time::sleep(Duration::from_secs(60));
        assert_eq!(interruptible(work, signal.as_mut()).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn one_signal_future_spans_several_dispatches() {
        let signal = tokio::time::sleep(Duration::from_secs(10));
        tokio::pin!(signal);

        let quick = async { "first" };
        assert_eq!(interruptible(quick, signal.as_mut()).await, Some("first"));

        let slow = tokio::time::sleep(Duration::from_secs(60));
        let started = tokio::time::Instant::now();
        assert_eq!(interruptible(slow, signal.as_mut()).await, None);
        assert!(started.elapsed() <= Duration::from_secs(10));
    }
}
