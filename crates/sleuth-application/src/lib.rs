//! Application layer for SLEUTH.
//!
//! This crate wires the pure session model from `sleuth-core` to storage and
//! the analysis backend: hydration and guarded persistence, write-through
//! message histories, preparation polling, and the `InvestigationService`
//! front ends talk to.

pub mod events;
pub mod ledger;
pub mod persistence;
pub mod poller;
pub mod service;

pub use events::SessionEvent;
pub use ledger::MessageLedger;
pub use persistence::{Hydration, PersistOutcome, PersistenceGateway};
pub use poller::{PreparationPoller, StatusSink};
pub use service::{ASK_FAILURE_MESSAGE, InvestigationService, SendOutcome, SkipReason};
