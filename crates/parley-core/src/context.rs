//! Conversation identity and the context that owns it.
//!
//! A [`ConversationContext`] is built once at startup from the persisted
//! store and handed to the dispatcher. Only two things mutate it: the
//! session manager adopting a server-assigned session id, and an explicit
//! "new session" request from the user. Every mutation is written back.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::ids::{SessionId, UserId};
use crate::settings::Settings;
use crate::store::{PersistedState, StateStore};

/// The (app, user, session) triple that keys a server-side conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationIdentity {
    /// Stable user id.
    pub user_id: UserId,
    /// Current session id.
    pub session_id: SessionId,
    /// Agent application name.
    pub app_name: String,
}

/// Identity, preferences and the store they are persisted to.
pub struct ConversationContext {
    state: PersistedState,
    store: Arc<dyn StateStore>,
}

impl ConversationContext {
    /// Load the context from `store`, generating and persisting fresh ids on
    /// first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read, or a fresh state cannot
    /// be written.
    pub fn load(store: Arc<dyn StateStore>) -> Result<Self> {
        let state = match store.load()? {
            Some(state) => state,
            None => {
                let state = PersistedState::fresh();
                store.save(&state)?;
                tracing::info!(
                    user_id = %state.user_id,
                    session_id = %state.session_id,
                    "Generated new client identity"
                );
                state
            }
        };
        Ok(Self { state, store })
    }

    /// Build a context from explicit state without reading the store.
    #[must_use]
    pub fn from_state(state: PersistedState, store: Arc<dyn StateStore>) -> Self {
        Self { state, store }
    }

    /// Snapshot of the current identity.
    #[must_use]
    pub fn identity(&self) -> ConversationIdentity {
        ConversationIdentity {
            user_id: self.state.user_id.clone(),
            session_id: self.state.session_id.clone(),
            app_name: self.state.settings.app_name.clone(),
        }
    }

    /// Current user id.
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.state.user_id
    }

    /// Current session id.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.state.session_id
    }

    /// Current preferences.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    /// Adopt a session id assigned by the server and persist it.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be written.
    pub fn replace_session_id(&mut self, session_id: SessionId) -> Result<()> {
        tracing::info!(
            old = %self.state.session_id,
            new = %session_id,
            "Replacing session id"
        );
        self.state.session_id = session_id;
        self.store.save(&self.state)
    }

    /// Start a new conversation with a freshly generated session id.
    ///
    /// The server-side session is created lazily on the next dispatch.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be written.
    pub fn new_session(&mut self) -> Result<&SessionId> {
        self.state.session_id = SessionId::generate();
        self.store.save(&self.state)?;
        Ok(&self.state.session_id)
    }

    /// Edit the preferences and persist them if the edit succeeds.
    ///
    /// # Errors
    ///
    /// Returns the edit's error (leaving the settings untouched), or an
    /// error if the state cannot be written.
    pub fn update_settings<F>(&mut self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Settings) -> Result<()>,
    {
        let mut settings = self.state.settings.clone();
        edit(&mut settings)?;
        if settings != self.state.settings {
            self.state.settings = settings;
            self.store.save(&self.state)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ConversationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationContext")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
