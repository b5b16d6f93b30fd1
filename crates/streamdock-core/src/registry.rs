//! The session registry.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{Error, Result, Session, SessionStatus};

/// Authoritative record of the sessions streamdock owns.
///
/// Every operation takes the same lock, so the registry can be shared
/// between the presentation loop and background tasks. Sessions keep their
/// insertion order.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: Vec<Session>,
    next_sequence: u64,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve the next sequence number.
    ///
    /// Numbers are handed out once per registry lifetime, even if the
    /// container that would have used one is never created.
    pub fn next_sequence(&self) -> u64 {
        let mut inner = self.lock();
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        sequence
    }

    /// Insert a session keyed by its container id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateId`] if the id is already registered.
    pub fn register(&self, session: Session) -> Result<()> {
        let mut inner = self.lock();
        if inner.sessions.iter().any(|s| s.id == session.id) {
            return Err(Error::DuplicateId(session.id));
        }
        inner.sessions.push(session);
        Ok(())
    }

    /// Remove a session, returning it if it was present.
    pub fn unregister(&self, id: &str) -> Option<Session> {
        let mut inner = self.lock();
        let index = inner.sessions.iter().position(|s| s.id == id)?;
        Some(inner.sessions.remove(index))
    }

    /// Snapshot of all sessions in insertion order.
    #[must_use]
    pub fn get_all(&self) -> Vec<Session> {
        self.lock().sessions.clone()
    }

    /// Look up a single session.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Session> {
        self.lock().sessions.iter().find(|s| s.id == id).cloned()
    }

    /// Set the runtime status of a session.
    ///
    /// Returns `true` if the stored status changed.
    pub fn update_status(&self, id: &str, status: SessionStatus) -> bool {
        let mut inner = self.lock();
        match inner.sessions.iter_mut().find(|s| s.id == id) {
            Some(session) if session.runtime_status != status => {
                session.runtime_status = status;
                true
            }
            _ => false,
        }
    }

    /// Container ids in insertion order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.lock().sessions.iter().map(|s| s.id.clone()).collect()
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Whether no sessions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().sessions.is_empty()
    }
}
