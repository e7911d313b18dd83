use super::model::{PreparationState, Session, SessionId};
use crate::error::{Result, SleuthError};
use crate::state::SessionsSnapshot;

/// In-memory collection of sessions plus the active session pointer.
///
/// `SessionStore` is a plain synchronous value: every method is a transform
/// of the previous state, so callers can serialize mutations simply by
/// owning the store behind a single lock. It never performs I/O; network
/// calls, history loading and persistence are driven by the application
/// layer around it.
///
/// Invariant: `active_id` is either `None` or the id of a session in the
/// collection.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    /// Sessions in insertion (display) order
    sessions: Vec<Session>,
    active_id: Option<SessionId>,
}

impl SessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store from a persisted snapshot.
    ///
    /// Every session gets `pending = false`, since no request can still be
    /// in flight after a restart. The active id is the persisted one if it
    /// still names a session, otherwise the first session, otherwise none.
    pub fn restore(snapshot: SessionsSnapshot) -> Self {
        let SessionsSnapshot {
            mut sessions,
            active_id,
        } = snapshot;

        for session in &mut sessions {
            session.pending = false;
        }

        let active_id = active_id
            .filter(|id| sessions.iter().any(|s| &s.id == id))
            .or_else(|| sessions.first().map(|s| s.id.clone()));

        Self {
            sessions,
            active_id,
        }
    }

    /// Captures the state that is persisted as the metadata record.
    pub fn snapshot(&self) -> SessionsSnapshot {
        SessionsSnapshot::new(self.sessions.clone(), self.active_id.clone())
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| &s.id == id)
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.get(id).is_some()
    }

    pub fn active_id(&self) -> Option<&SessionId> {
        self.active_id.as_ref()
    }

    /// Returns the active session, if any.
    pub fn active(&self) -> Option<&Session> {
        self.active_id.as_ref().and_then(|id| self.get(id))
    }

    /// Iterates over every session correlated with `tag`.
    pub fn sessions_with_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Session> {
        self.sessions.iter().filter(move |s| s.tag == tag)
    }

    /// Creates a session for `subject_address` and makes it active.
    ///
    /// The address is stored as typed (after trimming); its tag is derived
    /// from it. Sessions with equal tags are allowed to coexist.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the address is empty or whitespace.
    pub fn create_session(&mut self, subject_address: &str) -> Result<Session> {
        let subject_address = subject_address.trim();
        if subject_address.is_empty() {
            return Err(SleuthError::invalid_input("subject address must not be empty"));
        }

        let session = Session::new(subject_address);
        self.active_id = Some(session.id.clone());
        self.sessions.push(session.clone());
        Ok(session)
    }

    /// Switches the active pointer.
    ///
    /// Returns `false` (and changes nothing) if `id` is unknown.
    pub fn set_active(&mut self, id: &SessionId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.active_id = Some(id.clone());
        true
    }

    /// Removes a session and returns it.
    ///
    /// If the removed session was active, the first remaining session in
    /// display order becomes active, or none if the collection is empty.
    pub fn delete_session(&mut self, id: &SessionId) -> Option<Session> {
        let index = self.sessions.iter().position(|s| &s.id == id)?;
        let removed = self.sessions.remove(index);

        if self.active_id.as_ref() == Some(id) {
            self.active_id = self.sessions.first().map(|s| s.id.clone());
        }

        Some(removed)
    }

    /// Applies a preparation status to every session whose tag matches.
    ///
    /// Sessions already in a terminal state are left untouched, so a status
    /// only ever moves `preparing -> done` or `preparing -> error`.
    ///
    /// Returns the ids of the sessions that were updated.
    pub fn update_status(
        &mut self,
        tag: &str,
        state: PreparationState,
        message: Option<String>,
    ) -> Vec<SessionId> {
        let mut updated = Vec::new();
        for session in self.sessions.iter_mut().filter(|s| s.tag == tag) {
            if !session.status.can_transition_to(state) {
                continue;
            }
            session.status = state;
            session.status_message = message.clone();
            updated.push(session.id.clone());
        }
        updated
    }

    /// Sets the in-flight flag of one session.
    ///
    /// Returns `false` if the session does not exist.
    pub fn set_pending(&mut self, id: &SessionId, pending: bool) -> bool {
        match self.sessions.iter_mut().find(|s| &s.id == id) {
            Some(session) => {
                session.pending = pending;
                true
            }
            None => false,
        }
    }
}
