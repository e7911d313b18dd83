//! Per-session message history.

use crate::persistence::PersistenceGateway;
use sleuth_core::error::Result;
use sleuth_core::session::{Message, SessionId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Message histories keyed by session id, with write-through persistence.
///
/// Histories are loaded lazily: the first access to a session reads its
/// record through the [`PersistenceGateway`] and caches it. Every append
/// rewrites the whole persisted sequence.
pub struct MessageLedger {
    persistence: Arc<PersistenceGateway>,
    histories: Mutex<HashMap<SessionId, Vec<Message>>>,
}

impl MessageLedger {
    pub fn new(persistence: Arc<PersistenceGateway>) -> Self {
        Self {
            persistence,
            histories: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the history of a session, reading storage on first access.
    pub async fn load(&self, session_id: &SessionId) -> Result<Vec<Message>> {
        let mut histories = self.histories.lock().await;
        if let Some(messages) = histories.get(session_id) {
            return Ok(messages.clone());
        }

        let messages = self.persistence.load_messages(session_id).await?;
        histories.insert(session_id.clone(), messages.clone());
        Ok(messages)
    }

    /// Caches a history that was already read during hydration.
    pub async fn seed(&self, session_id: &SessionId, messages: Vec<Message>) {
        self.histories
            .lock()
            .await
            .insert(session_id.clone(), messages);
    }

    /// Starts an empty history for a freshly created session.
    pub async fn initialize(&self, session_id: &SessionId) -> Result<()> {
        let mut histories = self.histories.lock().await;
        histories.insert(session_id.clone(), Vec::new());
        self.persistence.save_messages(session_id, &[]).await
    }

    /// Appends a message and persists the full sequence.
    ///
    /// The in-memory history keeps the message even if the write fails.
    pub async fn append(&self, session_id: &SessionId, message: Message) -> Result<()> {
        let mut histories = self.histories.lock().await;
        if !histories.contains_key(session_id) {
            let persisted = self.persistence.load_messages(session_id).await?;
            histories.insert(session_id.clone(), persisted);
        }

        let messages = histories.entry(session_id.clone()).or_default();
        messages.push(message);
        self.persistence.save_messages(session_id, messages).await
    }

    /// Drops the cached and persisted history of a session.
    pub async fn purge(&self, session_id: &SessionId) -> Result<()> {
        self.histories.lock().await.remove(session_id);
        self.persistence.purge_messages(session_id).await
    }

    pub async fn is_loaded(&self, session_id: &SessionId) -> bool {
        self.histories.lock().await.contains_key(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::messages_key;
    use sleuth_core::state::KeyValueStore;
    use sleuth_infrastructure::MemoryKeyValueStore;

    fn ledger_over(storage: &MemoryKeyValueStore) -> MessageLedger {
        MessageLedger::new(Arc::new(PersistenceGateway::new(Arc::new(
            storage.clone(),
        ))))
    }

    #[tokio::test]
    async fn test_append_writes_through() {
        let storage = MemoryKeyValueStore::new();
        let ledger = ledger_over(&storage);
        let id = SessionId::from("s-1");

        ledger.initialize(&id).await.unwrap();
        ledger.append(&id, Message::user("balance?")).await.unwrap();
        ledger
            .append(&id, Message::assistant("42 ETH"))
            .await
            .unwrap();

        let raw = storage.get(&messages_key(&id)).await.unwrap().unwrap();
        let persisted: Vec<Message> = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted.len(), 2);
        assert_eq!(persisted[0].content, "balance?");
        assert_eq!(persisted[1].content, "42 ETH");
    }

    #[tokio::test]
    async fn test_load_reads_persisted_history_once() {
        let storage = MemoryKeyValueStore::new();
        let id = SessionId::from("s-1");
        storage
            .set(
                &messages_key(&id),
                &serde_json::to_string(&[Message::user("earlier")]).unwrap(),
            )
            .await
            .unwrap();

        let ledger = ledger_over(&storage);
        assert!(!ledger.is_loaded(&id).await);
        assert_eq!(ledger.load(&id).await.unwrap().len(), 1);
        assert!(ledger.is_loaded(&id).await);

        // Later storage changes are not re-read; the cache is authoritative.
        storage.remove(&messages_key(&id)).await.unwrap();
        assert_eq!(ledger.load(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_append_to_unloaded_session_keeps_earlier_messages() {
        let storage = MemoryKeyValueStore::new();
        let id = SessionId::from("s-1");
        storage
            .set(
                &messages_key(&id),
                &serde_json::to_string(&[Message::user("earlier")]).unwrap(),
            )
            .await
            .unwrap();

        let ledger = ledger_over(&storage);
        ledger.append(&id, Message::user("later")).await.unwrap();

        let history = ledger.load(&id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "earlier");
        assert_eq!(history[1].content, "later");
    }

    #[tokio::test]
    async fn test_corrupt_history_loads_as_empty() {
        let storage = MemoryKeyValueStore::new();
        let id = SessionId::from("s-1");
        storage
            .set(&messages_key(&id), "definitely not json")
            .await
            .unwrap();

        let ledger = ledger_over(&storage);
        assert!(ledger.load(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_purge_removes_cache_and_record() {
        let storage = MemoryKeyValueStore::new();
        let ledger = ledger_over(&storage);
        let id = SessionId::from("s-1");

        ledger.append(&id, Message::user("q")).await.unwrap();
        ledger.purge(&id).await.unwrap();

        assert!(!ledger.is_loaded(&id).await);
        assert!(!storage.contains_key(&messages_key(&id)).await);
        assert!(ledger.load(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_histories_are_independent() {
        let storage = MemoryKeyValueStore::new();
        let ledger = ledger_over(&storage);
        let a = SessionId::from("a");
        let b = SessionId::from("b");

        ledger.append(&a, Message::user("for a")).await.unwrap();
        ledger.append(&b, Message::user("for b")).await.unwrap();
        ledger.purge(&a).await.unwrap();

        let history = ledger.load(&b).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "for b");
    }
}
