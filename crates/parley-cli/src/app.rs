//! Application state for the chat REPL.
//!
//! Owns the conversation context, the dispatcher and the terminal sink, and
//! turns parsed input lines into dispatches or settings changes.

use std::sync::Arc;
use std::time::Duration;

use parley_client::{AdkClient, DispatchConfig, Dispatcher};
use parley_core::{ConversationContext, Settings};

use crate::commands::{self, Command, Input, HELP};
use crate::ui::TerminalSink;

/// Interval between idle connection checks.
pub const CONNECTION_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Upper bound on waiting for abandoned streams at exit.
const SHUTDOWN_DRAIN_LIMIT: Duration = Duration::from_secs(2);

/// The REPL application.
pub struct App {
    context: ConversationContext,
    dispatcher: Dispatcher<AdkClient>,
    sink: Arc<TerminalSink>,
    request_timeout: Duration,
    should_quit: bool,
}

impl App {
    /// Create the app with a backend for the context's server URL.
    ///
    /// `request_timeout` bounds the session and fallback requests.
    pub fn new(
        context: ConversationContext,
        sink: Arc<TerminalSink>,
        config: DispatchConfig,
        request_timeout: Duration,
    ) -> Self {
        let backend = Arc::new(Self::client(&context.settings().server_url, request_timeout));
        let dispatcher = Dispatcher::new(backend, sink.clone(), config);
        Self {
            context,
            dispatcher,
            sink,
            request_timeout,
            should_quit: false,
        }
    }

    fn client(url: &str, request_timeout: Duration) -> AdkClient {
        AdkClient::new(url).with_request_timeout(request_timeout)
    }

    /// Whether `/quit` was entered.
    pub const fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Show the input prompt.
    pub fn prompt(&self) {
        self.sink.prompt();
    }

    /// Print the startup banner.
    pub fn banner(&self) {
        let settings = self.context.settings();
        self.sink.info(&format!(
            "Chatting with '{}' at {} (session {}). Type /help for commands.",
            settings.app_name,
            settings.server_url,
            self.context.session_id()
        ));
    }

    /// Handle one line of input.
    pub async fn handle_line(&mut self, line: &str) {
        match commands::parse(line) {
            Ok(Input::Empty) => {}
            Ok(Input::Message(text)) => {
                self.dispatcher.send_to_agent(&mut self.context, &text).await;
            }
            Ok(Input::Command(command)) => self.run_command(command).await,
            Err(e) => self.sink.error(&e.to_string()),
        }
    }

    /// Note that a dispatch was abandoned by Ctrl-C.
    pub fn interrupted(&self) {
        self.sink.interrupted();
    }

    /// Check the connection and report changes.
    pub async fn check_connection(&self) -> bool {
        self.dispatcher.check_connection(&self.context).await
    }

    /// Wait briefly for abandoned streams before exiting.
    pub async fn shutdown(&mut self) {
        let remaining = self.dispatcher.drain(SHUTDOWN_DRAIN_LIMIT).await;
        if remaining > 0 {
            tracing::debug!(remaining, "Exiting with streams still open");
        }
    }

    async fn run_command(&mut self, command: Command) {
        match command {
            Command::New => match self.context.new_session() {
                Ok(id) => {
                    let message = format!("Started new session {id}");
                    self.sink.info(&message);
                }
                Err(e) => self.sink.error(&format!("Failed to save new session: {e}")),
            },
            Command::Server(None) => {
                let message = format!("Server: {}", self.context.settings().server_url);
                self.sink.info(&message);
            }
            Command::Server(Some(url)) => {
                let result = self
                    .context
                    .update_settings(|settings| settings.set_server_url(&url));
                match result {
                    Ok(()) => {
                        let url = self.context.settings().server_url.clone();
                        let client = Self::client(&url, self.request_timeout);
                        self.dispatcher.set_backend(Arc::new(client));
                        self.sink.info(&format!("Server set to {url}"));
                        self.check_connection().await;
                    }
                    Err(e) => self.sink.error(&e.to_string()),
                }
            }
            Command::App(None) => {
                let message = format!("App: {}", self.context.settings().app_name);
                self.sink.info(&message);
            }
            Command::App(Some(name)) => {
                let result = self.context.update_settings(|settings| {
                    settings.set_app_name(&name);
                    Ok(())
                });
                match result {
                    Ok(()) => {
                        let message = format!("App set to {}", self.context.settings().app_name);
                        self.sink.info(&message);
                    }
                    Err(e) => self.sink.error(&e.to_string()),
                }
            }
            Command::Theme(theme) => {
                let result = self.context.update_settings(|settings| {
                    settings.theme = theme;
                    Ok(())
                });
                self.sink.set_theme(theme);
                match result {
                    Ok(()) => self.sink.info(&format!("Theme set to {}", theme.as_str())),
                    Err(e) => self.sink.error(&e.to_string()),
                }
            }
            Command::Settings => self.show_settings(),
            Command::Status => {
                let message = if self.check_connection().await {
                    "Server is reachable"
                } else {
                    "Server is unreachable"
                };
                self.sink.info(message);
            }
            Command::Help => self.sink.info(HELP),
            Command::Quit => self.should_quit = true,
        }
    }

    fn show_settings(&self) {
        let Settings {
            server_url,
            app_name,
            theme,
        } = self.context.settings();
        let config = self.dispatcher.config();
        let text = format!(
            "user {}\nsession {}\nserver {server_url}\napp {app_name}\ntheme {}\nstream timeout {:?}\nrequest timeout {:?}",
            self.context.user_id(),
            self.context.session_id(),
            theme.as_str(),
            config.stream_timeout,
            self.request_timeout,
        );
        self.sink.info(&text);
    }
}
