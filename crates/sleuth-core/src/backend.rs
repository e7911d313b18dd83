//! Analysis backend seam.
//!
//! The backend is stateless per call: it prepares an index for an address,
//! reports preparation progress by tag, and answers questions against a
//! prepared tag. Transport lives in the infrastructure crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::{Citation, PreparationState};

/// Preparation progress as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparationStatus {
    pub state: PreparationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PreparationStatus {
    pub fn new(state: PreparationState, message: Option<String>) -> Self {
        Self { state, message }
    }

    pub fn preparing() -> Self {
        Self::new(PreparationState::Preparing, None)
    }

    pub fn done() -> Self {
        Self::new(PreparationState::Done, None)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(PreparationState::Error, Some(message.into()))
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// An answer to a chat query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Answer {
    pub answer: String,
    /// Retrieved sources, in the order the backend returned them
    pub sources: Vec<Citation>,
}

/// Abstract client of the analysis backend.
///
/// Implementations must be cheap to share (`Arc<dyn AnalysisBackend>`);
/// every call is independent and may run concurrently with others.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Asks the backend to start preparing an index for `address`.
    async fn prepare(&self, address: &str) -> Result<PreparationStatus>;

    /// Polls the preparation state of `tag`.
    async fn prepare_status(&self, tag: &str) -> Result<PreparationStatus>;

    /// Asks a question against the prepared index of `tag`.
    async fn ask(&self, tag: &str, query: &str) -> Result<Answer>;
}
