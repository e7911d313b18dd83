//! Session domain model.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::tag::sanitize_tag;

/// Longest id accepted from persisted state.
const MAX_ID_LEN: usize = 64;

/// Opaque, never-reused identifier of a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id can be embedded in a storage key.
    ///
    /// Generated ids always are; ids read back from disk may not be.
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= MAX_ID_LEN
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Backend preparation state of a session.
///
/// `Preparing` is the initial state; `Done` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PreparationState {
    #[default]
    Preparing,
    Done,
    Error,
}

impl PreparationState {
    /// Returns true once no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// Only `preparing -> preparing`, `preparing -> done` and
    /// `preparing -> error` are accepted.
    pub fn can_transition_to(self, next: PreparationState) -> bool {
        match (self, next) {
            (Self::Preparing, _) => true,
            (Self::Done | Self::Error, _) => false,
        }
    }
}

impl fmt::Display for PreparationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Preparing => "preparing",
            Self::Done => "done",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// One user-initiated investigation bound to a subject address.
///
/// The record holds metadata only; the message history of a session lives
/// in the message ledger, addressed by [`Session::id`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    /// Raw address as typed by the user
    pub subject_address: String,
    /// Backend correlation key, always `sanitize_tag(subject_address)`
    pub tag: String,
    pub status: PreparationState,
    /// Advisory progress or error text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    /// True while a chat request is in flight
    #[serde(default)]
    pub pending: bool,
    /// Creation timestamp (RFC 3339)
    #[serde(default)]
    pub created_at: String,
}

impl Session {
    /// Builds a new session in the `preparing` state.
    ///
    /// The caller is responsible for validating `subject_address`.
    pub fn new(subject_address: impl Into<String>) -> Self {
        let subject_address = subject_address.into();
        let tag = sanitize_tag(&subject_address);
        Self {
            id: SessionId::generate(),
            subject_address,
            tag,
            status: PreparationState::Preparing,
            status_message: None,
            pending: false,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Chat is only allowed once preparation has finished successfully.
    pub fn is_ready(&self) -> bool {
        self.status == PreparationState::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_well_formed() {
        assert!(SessionId::generate().is_well_formed());
        assert!(SessionId::from("s_1-a").is_well_formed());
        assert!(!SessionId::from("").is_well_formed());
        assert!(!SessionId::from("a b").is_well_formed());
        assert!(!SessionId::from("../etc").is_well_formed());
        assert!(!SessionId::from("x".repeat(65)).is_well_formed());
    }

    #[test]
    fn test_new_session_defaults() {
        let session = Session::new("0xABC");
        assert_eq!(session.tag, "0xabc");
        assert_eq!(session.status, PreparationState::Preparing);
        assert!(!session.pending);
        assert!(session.status_message.is_none());
        assert!(!session.is_ready());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Session::new("same");
        let b = Session::new("same");
        assert_ne!(a.id, b.id);
        assert_eq!(a.tag, b.tag);
    }

    #[test]
    fn test_transitions() {
        use PreparationState::*;
        assert!(Preparing.can_transition_to(Preparing));
        assert!(Preparing.can_transition_to(Done));
        assert!(Preparing.can_transition_to(Error));
        assert!(!Done.can_transition_to(Preparing));
        assert!(!Done.can_transition_to(Error));
        assert!(!Error.can_transition_to(Done));
    }

    #[test]
    fn test_serialized_shape() {
        let mut session = Session::new("addr");
        session.status = PreparationState::Done;
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["subjectAddress"], "addr");
        assert_eq!(value["status"], "done");
        assert_eq!(value["id"], session.id.as_str());
        assert!(value.get("statusMessage").is_none());
    }
}
