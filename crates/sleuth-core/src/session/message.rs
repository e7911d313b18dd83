//! Conversation message types.
//!
//! Messages are immutable once appended to a session's history.

use serde::{Deserialize, Serialize};

/// Represents the role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message typed by the user.
    User,
    /// Answer (or failure notice) produced on behalf of the backend.
    Assistant,
}

/// A source document the backend used to produce an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Retrieved text the answer was grounded on.
    pub content: String,
    /// Optional locator (URL, transaction hash, document id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl Citation {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            reference: None,
        }
    }
}

/// A single message in a session's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    /// Present only on assistant messages that used retrieval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<Citation>>,
    /// Timestamp when the message was created (RFC 3339).
    #[serde(default)]
    pub timestamp: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::build(MessageRole::User, content.into(), None)
    }

    /// An assistant message without sources.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::build(MessageRole::Assistant, content.into(), None)
    }

    /// An assistant answer; an empty source list is stored as no citations.
    pub fn assistant_with_citations(content: impl Into<String>, citations: Vec<Citation>) -> Self {
        let citations = (!citations.is_empty()).then_some(citations);
        Self::build(MessageRole::Assistant, content.into(), citations)
    }

    fn build(role: MessageRole, content: String, citations: Option<Vec<Citation>>) -> Self {
        Self {
            role,
            content,
            citations,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Number of attached citations (zero when absent).
    pub fn citation_count(&self) -> usize {
        self.citations.as_ref().map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_citations_are_omitted() {
        let msg = Message::assistant_with_citations("answer", Vec::new());
        assert!(msg.citations.is_none());
        assert_eq!(msg.citation_count(), 0);

        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("citations").is_none());
        assert_eq!(json["role"], "assistant");
    }

    #[test]
    fn test_decodes_without_optional_fields() {
        let msg: Message = serde_json::from_str(r#"{"role":"user","content":"hi"}"#).unwrap();
        assert_eq!(msg.role, MessageRole::User);
        assert!(msg.citations.is_none());
        assert!(msg.timestamp.is_empty());
    }
}
