//! Local presence registry - which session serves each logged-in user

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use chat_core::UserId;

use crate::connection::Session;

/// Map from user id to the session serving that user on this node
///
/// One mutex guards the map. It is never held while a session is
/// closed or written to.
#[derive(Default)]
pub struct PresenceRegistry {
    users: Mutex<HashMap<UserId, Arc<Session>>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `uid` to `session`. A different session previously bound to
    /// `uid` is closed and returned.
    pub fn map_user(&self, uid: UserId, session: Arc<Session>) -> Option<Arc<Session>> {
        let new_id = session.id();
        let previous = self.users.lock().insert(uid, session);

        match previous {
            Some(prev) if prev.id() != new_id => {
                tracing::info!(
                    user_id = uid,
                    old_session = %prev.id(),
                    new_session = %new_id,
                    "Evicting previous session"
                );
                prev.close();
                Some(prev)
            }
            _ => None,
        }
    }

    pub fn get_session(&self, uid: UserId) -> Option<Arc<Session>> {
        self.users.lock().get(&uid).cloned()
    }

    /// Remove the mapping for `uid`. Idempotent.
    pub fn remove_user(&self, uid: UserId) -> Option<Arc<Session>> {
        self.users.lock().remove(&uid)
    }

    /// Remove the mapping only if it still points at `session_id`
    pub fn remove_session(&self, uid: UserId, session_id: Uuid) -> bool {
        let mut users = self.users.lock();
        match users.get(&uid) {
            Some(current) if current.id() == session_id => {
                users.remove(&uid);
                true
            }
            _ => false,
        }
    }

    pub fn is_online(&self, uid: UserId) -> bool {
        self.users.lock().contains_key(&uid)
    }

    pub fn online_count(&self) -> usize {
        self.users.lock().len()
    }
}

impl std::fmt::Debug for PresenceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceRegistry")
            .field("online", &self.online_count())
            .finish()
    }
}
