//! Persisted client state.
//!
//! The user id, current session id and preferences survive restarts. They are
//! read once at startup and written whenever one of them changes.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::ids::{SessionId, UserId};
use crate::settings::Settings;

/// Everything the client keeps between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Stable user id for this profile.
    #[serde(default = "UserId::generate")]
    pub user_id: UserId,

    /// Current conversation session id.
    #[serde(default = "SessionId::generate")]
    pub session_id: SessionId,

    /// Client preferences.
    #[serde(default)]
    pub settings: Settings,
}

impl PersistedState {
    /// Fresh state with newly generated ids and default settings.
    #[must_use]
    pub fn fresh() -> Self {
        Self {
            user_id: UserId::generate(),
            session_id: SessionId::generate(),
            settings: Settings::default(),
        }
    }
}

/// Storage backend for [`PersistedState`].
pub trait StateStore: Send + Sync {
    /// Load the stored state, or `None` if nothing has been stored yet.
    ///
    /// # Errors
    ///
    /// Returns an error if stored state exists but cannot be read or parsed.
    fn load(&self) -> Result<Option<PersistedState>>;

    /// Replace the stored state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be written.
    fn save(&self, state: &PersistedState) -> Result<()>;
}

/// JSON file store.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Store state at an explicit path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store state at `<config dir>/parley/state.json`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NoConfigDir` if the platform has no config directory.
    pub fn in_config_dir() -> Result<Self> {
        let dir = dirs::config_dir().ok_or(CoreError::NoConfigDir)?;
        Ok(Self::new(dir.join("parley").join("state.json")))
    }

    /// Path of the state file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<Option<PersistedState>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CoreError::io(&self.path, e)),
        };
        let state = serde_json::from_str(&raw)?;
        Ok(Some(state))
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, json).map_err(|e| CoreError::io(&self.path, e))?;
        tracing::debug!(path = %self.path.display(), "Saved client state");
        Ok(())
    }
}

/// In-memory store, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<Option<PersistedState>>,
    saves: Mutex<usize>,
}

impl MemoryStateStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `state`.
    #[must_use]
    pub fn with_state(state: PersistedState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            saves: Mutex::new(0),
        }
    }

    /// Current stored state.
    #[must_use]
    pub fn snapshot(&self) -> Option<PersistedState> {
        self.state.lock().clone()
    }

    /// Number of `save` calls so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<PersistedState>> {
        Ok(self.state.lock().clone())
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        *self.state.lock() = Some(state.clone());
        *self.saves.lock() += 1;
        Ok(())
    }
}
