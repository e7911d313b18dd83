//! Persisted state model and the storage seam it is written through.

pub mod model;
pub mod repository;

pub use model::SessionsSnapshot;
pub use repository::KeyValueStore;
