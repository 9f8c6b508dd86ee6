//! Session storage trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::types::{ExecutionSession, NewSession, SessionError, SessionEvent};
use crate::metrics::SESSIONS_ACTIVE;

/// Holds live and recently completed sessions.
pub trait SessionStore: Send + Sync {
    /// Create and store a new session in the `Created` state.
    fn create(&self, new_session: NewSession) -> Arc<ExecutionSession>;

    /// Look up a session. Expired sessions are not found.
    fn get(&self, id: Uuid) -> Option<Arc<ExecutionSession>>;

    /// Append an event to a stored session.
    fn append(&self, id: Uuid, event: SessionEvent) -> Result<usize, SessionError> {
        self.get(id).ok_or(SessionError::NotFound(id))?.append(event)
    }

    /// Remove a session immediately. Returns whether it was present.
    fn expire(&self, id: Uuid) -> bool;

    /// Remove every session completed longer than `grace` before `now`.
    /// Returns the number removed.
    fn sweep(&self, grace: Duration, now: DateTime<Utc>) -> usize;

    /// Number of sessions currently held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Session store backed by a `HashMap` behind a lock.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<ExecutionSession>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self, new_session: NewSession) -> Arc<ExecutionSession> {
        let session = Arc::new(ExecutionSession::new(new_session));
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        sessions.insert(session.id(), Arc::clone(&session));
        SESSIONS_ACTIVE.set(sessions.len() as i64);
        debug!(session_id = %session.id(), "Session created");
        session
    }

    fn get(&self, id: Uuid) -> Option<Arc<ExecutionSession>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    fn expire(&self, id: Uuid) -> bool {
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let removed = sessions.remove(&id).is_some();
        SESSIONS_ACTIVE.set(sessions.len() as i64);
        removed
    }

    fn sweep(&self, grace: Duration, now: DateTime<Utc>) -> usize {
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|id, session| {
            let expired = session.completed_at().is_some_and(|completed_at| {
                now.signed_duration_since(completed_at)
                    .to_std()
                    .is_ok_and(|age| age >= grace)
            });
            if expired {
                debug!(session_id = %id, "Session expired");
            }
            !expired
        });
        SESSIONS_ACTIVE.set(sessions.len() as i64);
        before - sessions.len()
    }

    fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
