//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: session record and preparation state machine
//! - `message`: conversation message types
//! - `tag`: backend correlation tag derivation
//! - `store`: in-memory session collection with the active pointer

mod message;
mod model;
mod store;
mod tag;

#[cfg(test)]
mod store_test;

pub use message::{Citation, Message, MessageRole};
pub use model::{PreparationState, Session, SessionId};
pub use store::SessionStore;
pub use tag::{UNKNOWN_TAG, sanitize_tag};
