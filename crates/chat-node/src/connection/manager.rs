//! Session manager
//!
//! Tracks every open session on this node, authenticated or not, using
//! DashMap for thread-safe access.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use uuid::Uuid;

use super::Session;

/// All sessions accepted by this node, keyed by session id
pub struct SessionManager {
    sessions: DashMap<Uuid, Arc<Session>>,
}

impl SessionManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Create a new session manager wrapped in Arc
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn add(&self, session: Arc<Session>) {
        let id = session.id();
        self.sessions.insert(id, session);
        tracing::debug!(session_id = %id, "Session added");
    }

    /// Remove a session. Returns it if it was present.
    pub fn remove(&self, session_id: Uuid) -> Option<Arc<Session>> {
        let removed = self.sessions.remove(&session_id).map(|(_, s)| s);
        if removed.is_some() {
            tracing::debug!(session_id = %session_id, "Session removed");
        }
        removed
    }

    pub fn get(&self, session_id: Uuid) -> Option<Arc<Session>> {
        self.sessions.get(&session_id).map(|r| r.clone())
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Logged-in sessions with no inbound traffic for at least `idle`
    pub fn idle_authenticated(&self, idle: Duration) -> Vec<Arc<Session>> {
        self.sessions
            .iter()
            .filter(|entry| {
                let session = entry.value();
                session.is_authenticated() && !session.is_closed() && session.idle_for() >= idle
            })
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Close every session. Entries are removed by each session's close handler.
    pub fn close_all(&self) {
        // Snapshot first; close handlers remove entries from the map
        let sessions: Vec<_> = self.sessions.iter().map(|e| e.value().clone()).collect();
        for session in sessions {
            session.close();
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.sessions.len())
            .finish()
    }
}
