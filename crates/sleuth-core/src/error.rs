//! Error types for the Sleuth client.

use thiserror::Error;

/// A shared error type for the entire Sleuth client.
///
/// Variants follow the failure taxonomy of the session core: invalid user
/// input is rejected before any network call, network failures are
/// transient, and corrupt persisted state is treated as absence by callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SleuthError {
    /// User-supplied input was rejected (empty address, empty query, bad key)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A call to the analysis backend failed or returned an unusable response
    #[error("Network error: {message}")]
    Network {
        /// HTTP status code, when the server answered at all
        status: Option<u16>,
        message: String,
    },

    /// Persisted data exists but could not be decoded
    #[error("Corrupt persisted state at '{key}': {message}")]
    CorruptState { key: String, message: String },

    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SleuthError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates an InvalidInput error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Creates a Network error without an HTTP status
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            status: None,
            message: message.into(),
        }
    }

    /// Creates a Network error for a non-success HTTP response
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::Network {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Creates a CorruptState error
    pub fn corrupt_state(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptState {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is an InvalidInput error
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    /// Check if this is a Network error
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Check if this is a CorruptState error
    pub fn is_corrupt_state(&self) -> bool {
        matches!(self, Self::CorruptState { .. })
    }

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for failures that may succeed when the same call is
    /// issued again later.
    ///
    /// Connection failures and 5xx/429 responses are transient; 4xx
    /// responses (other than 429) describe a request the server will keep
    /// rejecting.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { status: None, .. } => true,
            Self::Network {
                status: Some(code), ..
            } => *code >= 500 || *code == 429,
            Self::Io { .. } => true,
            _ => false,
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for SleuthError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for SleuthError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for SleuthError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for SleuthError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, SleuthError>`.
pub type Result<T> = std::result::Result<T, SleuthError>;
