//! Client preferences.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Color theme for the front end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    /// Dark text on a light background.
    #[default]
    Light,
    /// Light text on a dark background.
    Dark,
}

impl Theme {
    /// Lower-case name as used in commands and the state file.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// Parse a theme name, case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }
}

/// User-editable preferences, persisted alongside the conversation ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL of the agent server, without a trailing slash.
    #[serde(default = "Settings::default_server_url")]
    pub server_url: String,

    /// Agent application name on the server.
    #[serde(default = "Settings::default_app_name")]
    pub app_name: String,

    /// Front-end color theme.
    #[serde(default)]
    pub theme: Theme,
}

impl Settings {
    fn default_server_url() -> String {
        "http://localhost:8000".to_string()
    }

    fn default_app_name() -> String {
        "mateus_rag".to_string()
    }

    /// Set the server URL after validating it.
    ///
    /// Blank input restores the default. A trailing `/` is dropped so path
    /// joining stays predictable.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidUrl` if the input is not an absolute
    /// `http` or `https` URL.
    pub fn set_server_url(&mut self, input: &str) -> Result<()> {
        let input = input.trim();
        if input.is_empty() {
            self.server_url = Self::default_server_url();
            return Ok(());
        }

        let parsed = url::Url::parse(input).map_err(|e| CoreError::InvalidUrl {
            url: input.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CoreError::InvalidUrl {
                url: input.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        self.server_url = input.trim_end_matches('/').to_string();
        Ok(())
    }

    /// Set the app name; blank input restores the default.
    pub fn set_app_name(&mut self, input: &str) {
        let input = input.trim();
        self.app_name = if input.is_empty() {
            Self::default_app_name()
        } else {
            input.to_string()
        };
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: Self::default_server_url(),
            app_name: Self::default_app_name(),
            theme: Theme::default(),
        }
    }
}
