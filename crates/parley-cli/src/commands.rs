//! Parsing of REPL input lines.
//!
//! A line starting with `/` is a command; anything else is a message for the
//! agent.

use parley_core::Theme;
use thiserror::Error;

/// Help text for `/help`.
pub const HELP: &str = "\
Commands:
  /new              start a new conversation session
  /server [url]     show or set the agent server URL
  /app [name]       show or set the agent application name
  /theme light|dark switch the color theme
  /settings         show the current settings
  /status           check the connection to the server
  /help             show this help
  /quit             exit

Anything else is sent to the agent.";

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Blank line.
    Empty,
    /// Text for the agent.
    Message(String),
    /// A slash command.
    Command(Command),
}

/// Slash commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    New,
    Server(Option<String>),
    App(Option<String>),
    Theme(Theme),
    Settings,
    Status,
    Help,
    Quit,
}

/// Errors from parsing a command line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command: /{0} (try /help)")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("unknown theme '{0}' (expected light or dark)")]
    InvalidTheme(String),
}

/// Parse one input line.
pub fn parse(line: &str) -> Result<Input, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Empty);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Input::Message(line.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
        None => (rest, None),
    };

    let command = match name.to_ascii_lowercase().as_str() {
        "new" => Command::New,
        "server" => Command::Server(arg.map(str::to_string)),
        "app" => Command::App(arg.map(str::to_string)),
        "theme" => {
            let name = arg.ok_or(CommandError::Usage("/theme light|dark"))?;
            let theme =
                Theme::parse(name).ok_or_else(|| CommandError::InvalidTheme(name.to_string()))?;
            Command::Theme(theme)
        }
        "settings" => Command::Settings,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Input::Command(command))
}
