//! Domain layer of the Sleuth investigation client.
//!
//! Holds the session model, the pure session store, and the traits the
//! application layer talks to storage and the analysis backend through.

pub mod backend;
pub mod config;
pub mod error;
pub mod session;
pub mod state;

// Re-export common error type
pub use error::{Result, SleuthError};
