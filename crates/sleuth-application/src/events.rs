//! Change notifications broadcast by the investigation service.

use sleuth_core::session::{Message, PreparationState, Session, SessionId};

/// Capacity of the event channel. Slow receivers observe `Lagged`.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SessionCreated {
        session: Session,
    },
    SessionDeleted {
        session_id: SessionId,
    },
    ActiveChanged {
        session_id: Option<SessionId>,
    },
    StatusChanged {
        session_id: SessionId,
        state: PreparationState,
        message: Option<String>,
    },
    PendingChanged {
        session_id: SessionId,
        pending: bool,
    },
    MessageAppended {
        session_id: SessionId,
        message: Message,
    },
    /// A mutation was applied in memory but could not be written to storage
    PersistenceFailed {
        message: String,
    },
}

impl SessionEvent {
    /// Session the event refers to, if it refers to exactly one.
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            SessionEvent::SessionCreated { session } => Some(&session.id),
            SessionEvent::SessionDeleted { session_id }
            | SessionEvent::StatusChanged { session_id, .. }
            | SessionEvent::PendingChanged { session_id, .. }
            | SessionEvent::MessageAppended { session_id, .. } => Some(session_id),
            SessionEvent::ActiveChanged { session_id } => session_id.as_ref(),
            SessionEvent::PersistenceFailed { .. } => None,
        }
    }
}
