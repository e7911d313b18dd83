//! Key/value storage trait.

use async_trait::async_trait;

use crate::error::Result;

/// A flat, string-keyed storage space.
///
/// Values are opaque strings (the persistence layer stores JSON). Writes are
/// last-write-wins per key; there is no merge. Implementations decide where
/// the bytes live (files, memory).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(value))`: Key present
    /// - `Ok(None)`: Key absent
    /// - `Err(_)`: The storage itself could not be read
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}
