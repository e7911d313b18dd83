//! Persisted client state.

use serde::{Deserialize, Serialize};

use crate::session::{Session, SessionId};

/// The metadata record written as one unit: the whole session collection
/// plus the active session pointer.
///
/// Message histories are stored separately, one record per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionsSnapshot {
    #[serde(default)]
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub active_id: Option<SessionId>,
}

impl SessionsSnapshot {
    pub fn new(sessions: Vec<Session>, active_id: Option<SessionId>) -> Self {
        Self {
            sessions,
            active_id,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
