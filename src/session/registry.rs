//! Live session registry.
//!
//! Maps a conversation id to its active session's handle so a reconnect or
//! disconnect can find and cancel in-flight work. This is the only shared
//! structure in the subsystem; everything else is per-session. Sessions are
//! inserted on connect and must be removed on disconnect - there is no
//! ambient global map with untracked lifecycle.

use crate::error::{Result, SessionError};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle to one live session, held by the registry.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    /// Subject id the session writes field updates against.
    pub subject_id: String,

    /// Cancellation token for the session's turn and dispatch tasks.
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Creates a handle for a session.
    #[must_use]
    pub fn new(subject_id: &str, cancel: CancellationToken) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            cancel,
        }
    }

    /// Requests cancellation of the session's work.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Concurrency-safe map of conversation id to live session handle.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// Guarded id-to-handle map.
    inner: Mutex<HashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session under a conversation id.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyActive`] if the id is taken.
    pub fn insert(&self, id: &str, handle: SessionHandle) -> Result<()> {
        let mut map = self.lock();
        if map.contains_key(id) {
            return Err(SessionError::AlreadyActive { id: id.to_string() }.into());
        }
        debug!(session = id, "session registered");
        map.insert(id.to_string(), handle);
        Ok(())
    }

    /// Removes a session, returning its handle if it was registered.
    pub fn remove(&self, id: &str) -> Option<SessionHandle> {
        let removed = self.lock().remove(id);
        if removed.is_some() {
            debug!(session = id, "session removed");
        }
        removed
    }

    /// Cancels and removes a session.
    ///
    /// Returns `true` if a session was registered under the id. Other
    /// sessions are unaffected.
    pub fn cancel(&self, id: &str) -> bool {
        if let Some(handle) = self.remove(id) {
            handle.cancel();
            true
        } else {
            false
        }
    }

    /// Returns `true` if a session is registered under the id.
    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    /// Returns the number of live sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no sessions are live.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionHandle>> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
