//! Line-oriented terminal rendering.
//!
//! The agent's reply is drawn in place: the "thinking" placeholder and the
//! streamed text both start at a saved cursor position right after the reply
//! prefix, so replacing one with the other (or redrawing a snapshot) is a
//! restore-and-clear. Snapshots that extend what is already on screen are
//! appended instead of redrawn.

use std::io::{self, Stdout, Write};

use chrono::Local;
use crossterm::cursor::{RestorePosition, SavePosition};
use crossterm::queue;
use crossterm::style::{Color, Print, PrintStyledContent, Stylize};
use crossterm::terminal::{Clear, ClearType};
use parking_lot::Mutex;
use parley_client::{DispatchOutcome, ResponseSink};
use parley_core::Theme;

/// Notice shown when the fallback reply had no extractable text.
pub const NO_TEXT_NOTICE: &str = "Response received but could not extract text.";

/// Colors for one theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Palette {
    user: Color,
    agent: Color,
    error: Color,
    notice: Color,
    muted: Color,
}

impl Palette {
    const fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Light => Self {
                user: Color::DarkBlue,
                agent: Color::DarkGreen,
                error: Color::DarkRed,
                notice: Color::DarkYellow,
                muted: Color::DarkGrey,
            },
            Theme::Dark => Self {
                user: Color::Cyan,
                agent: Color::Green,
                error: Color::Red,
                notice: Color::Yellow,
                muted: Color::Grey,
            },
        }
    }
}

struct Screen<W> {
    out: W,
    palette: Palette,
    /// Streamed text currently on screen, while a reply is live.
    reply: Option<String>,
    /// A reply line (placeholder or text) is open at the saved position.
    reply_open: bool,
    prompting: bool,
    connected: Option<bool>,
}

impl<W: Write> Screen<W> {
    fn timestamp() -> String {
        Local::now().format("%H:%M:%S").to_string()
    }

    fn rewind_reply(&mut self) -> io::Result<()> {
        if self.reply_open {
            queue!(self.out, RestorePosition, Clear(ClearType::FromCursorDown))?;
        }
        Ok(())
    }

    fn close_reply(&mut self) -> io::Result<()> {
        self.reply = None;
        self.reply_open = false;
        queue!(self.out, Print("\n"))
    }

    fn line(&mut self, label: &str, color: Color, text: &str) -> io::Result<()> {
        self.prompting = false;
        queue!(
            self.out,
            PrintStyledContent(format!("[{}] {label} › ", Self::timestamp()).with(color).bold()),
            Print(text),
            Print("\n"),
        )?;
        self.out.flush()
    }
}

/// [`ResponseSink`] that renders to a terminal.
pub struct TerminalSink<W = Stdout> {
    screen: Mutex<Screen<W>>,
}

impl TerminalSink<Stdout> {
    /// Sink writing to standard output.
    pub fn stdout(theme: Theme) -> Self {
        Self::new(io::stdout(), theme)
    }
}

impl<W: Write + Send> TerminalSink<W> {
    /// Sink writing to `out`.
    pub fn new(out: W, theme: Theme) -> Self {
        Self {
            screen: Mutex::new(Screen {
                out,
                palette: Palette::for_theme(theme),
                reply: None,
                reply_open: false,
                prompting: false,
                connected: None,
            }),
        }
    }

    /// Switch the color palette.
    pub fn set_theme(&self, theme: Theme) {
        self.screen.lock().palette = Palette::for_theme(theme);
    }

    /// Show the input prompt.
    pub fn prompt(&self) {
        self.draw(|screen| {
            screen.prompting = true;
            let color = screen.palette.user;
            queue!(screen.out, PrintStyledContent("you › ".with(color).bold()))
        });
    }

    /// Show an informational line.
    pub fn info(&self, text: &str) {
        self.draw(|screen| {
            let color = screen.palette.muted;
            screen.line("parley", color, text)
        });
    }

    /// Show a warning or error line.
    pub fn error(&self, text: &str) {
        self.draw(|screen| {
            let color = screen.palette.error;
            screen.line("error", color, text)
        });
    }

    /// Close any open reply line and note the interruption.
    pub fn interrupted(&self) {
        self.draw(|screen| {
            if screen.reply_open {
                screen.close_reply()?;
            }
            let color = screen.palette.notice;
            screen.line("parley", color, "Interrupted")
        });
    }

    fn draw<F>(&self, render: F)
    where
        F: FnOnce(&mut Screen<W>) -> io::Result<()>,
    {
        let mut screen = self.screen.lock();
        let result = render(&mut screen).and_then(|()| screen.out.flush());
        if let Err(e) = result {
            tracing::debug!(error = %e, "Terminal write failed");
        }
    }
}

impl<W: Write + Send> ResponseSink for TerminalSink<W> {
    fn show_thinking(&self) {
        self.draw(|screen| {
            screen.prompting = false;
            screen.reply = None;
            screen.reply_open = true;
            let Palette { agent, muted, .. } = screen.palette;
            queue!(
                screen.out,
                PrintStyledContent(
                    format!("[{}] agent › ", Screen::<W>::timestamp())
                        .with(agent)
                        .bold()
                ),
                SavePosition,
                PrintStyledContent("Thinking...".with(muted).italic()),
            )
        });
    }

    fn begin_response(&self) {
        self.draw(|screen| {
            screen.rewind_reply()?;
            screen.reply = Some(String::new());
            Ok(())
        });
    }

    fn update_response(&self, text: &str) {
        self.draw(|screen| {
            let shown = screen.reply.take().unwrap_or_default();
            match text.strip_prefix(shown.as_str()) {
                Some(tail) => queue!(screen.out, Print(tail))?,
                None => {
                    screen.rewind_reply()?;
                    queue!(screen.out, Print(text))?;
                }
            }
            screen.reply = Some(text.to_string());
            Ok(())
        });
    }

    fn resolve(&self, outcome: &DispatchOutcome) {
        self.draw(|screen| {
            let Palette { notice, error, .. } = screen.palette;
            match outcome {
                DispatchOutcome::StreamedSuccess(text) => {
                    if screen.reply.as_deref() != Some(text.as_str()) {
                        screen.rewind_reply()?;
                        queue!(screen.out, Print(text))?;
                    }
                }
                DispatchOutcome::FallbackSuccess(text) => {
                    screen.rewind_reply()?;
                    queue!(screen.out, Print(text))?;
                }
                DispatchOutcome::FallbackNoText(_) => {
                    screen.rewind_reply()?;
                    queue!(screen.out, PrintStyledContent(NO_TEXT_NOTICE.with(notice).italic()))?;
                }
                DispatchOutcome::Failure(e) => {
                    screen.rewind_reply()?;
                    queue!(screen.out, PrintStyledContent(e.user_message().with(error)))?;
                }
            }
            screen.close_reply()
        });
    }

    fn connection_status(&self, connected: bool) {
        self.draw(|screen| {
            let previous = screen.connected.replace(connected);
            if previous == Some(connected) || (previous.is_none() && connected) {
                return Ok(());
            }

            let prompting = screen.prompting;
            if prompting {
                queue!(screen.out, Print("\r"), Clear(ClearType::CurrentLine))?;
            }
            let Palette { agent, error, .. } = screen.palette;
            if connected {
                screen.line("status", agent, "Connected to server")?;
            } else {
                screen.line("status", error, "Server unreachable")?;
            }
            if prompting {
                screen.prompting = true;
                let user = screen.palette.user;
                queue!(screen.out, PrintStyledContent("you › ".with(user).bold()))?;
            }
            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_client::{ClientError, DispatchError};
    use serde_json::json;

    fn sink() -> TerminalSink<Vec<u8>> {
        TerminalSink::new(Vec::new(), Theme::Light)
    }

    fn output(sink: &TerminalSink<Vec<u8>>) -> String {
        String::from_utf8_lossy(&sink.screen.lock().out).into_owned()
    }

    #[test]
    fn streamed_reply_appends_extensions() {
        let sink = sink();
        sink.show_thinking();
        sink.begin_response();
        sink.update_response("Hel");
        sink.update_response("Hello");
        sink.resolve(&DispatchOutcome::StreamedSuccess("Hello".into()));

        let out = output(&sink);
        assert!(out.contains("Thinking..."));
        assert!(out.contains("Hello"));
        assert_eq!(out.matches("Hel").count(), 1, "extending snapshot is appended");
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn rewritten_snapshot_is_redrawn() {
        let sink = sink();
        sink.show_thinking();
        sink.begin_response();
        sink.update_response("draft");
        sink.update_response("final");
        sink.resolve(&DispatchOutcome::StreamedSuccess("final".into()));

        let out = output(&sink);
        assert!(out.contains("draft"));
        assert!(out.contains("final"));
    }

    #[test]
    fn no_text_notice() {
        let sink = sink();
        sink.show_thinking();
        sink.resolve(&DispatchOutcome::FallbackNoText(json!({"usage": 1})));

        assert!(output(&sink).contains(NO_TEXT_NOTICE));
    }

    #[test]
    fn failure_shows_user_message() {
        let sink = sink();
        sink.show_thinking();
        sink.resolve(&DispatchOutcome::Failure(DispatchError::Fallback(
            ClientError::Http {
                status: 502,
                message: "bad gateway".into(),
            },
        )));

        let out = output(&sink);
        assert!(out.contains("Unable to connect to the server: HTTP 502: bad gateway."));
    }

    #[test]
    fn interruption_closes_the_open_reply() {
        let sink = sink();
        sink.show_thinking();
        sink.interrupted();

        let out = output(&sink);
        let thinking = out.find("Thinking...").unwrap();
        let notice = out.find("Interrupted").unwrap();
        assert!(out[thinking..notice].contains('\n'), "reply line is closed first");
        assert!(out.ends_with("Interrupted\n"));
        assert!(!sink.screen.lock().reply_open);
    }

    #[test]
    fn connection_changes_are_reported_once() {
        let sink = sink();
        sink.connection_status(true);
        assert!(output(&sink).is_empty());

        sink.connection_status(false);
        sink.connection_status(false);
        sink.connection_status(true);

        let out = output(&sink);
        assert_eq!(out.matches("Server unreachable").count(), 1);
        assert_eq!(out.matches("Connected to server").count(), 1);
    }
}
