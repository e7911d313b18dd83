//! Persistence gateway.
//!
//! Two independent namespaces share one key/value space:
//!
//! - **metadata**: the whole session collection plus the active id, stored
//!   as one record under [`METADATA_KEY`];
//! - **message history**: one record per session under
//!   [`messages_key`].
//!
//! Metadata writes are guarded: nothing is written before hydration has
//! completed, and an empty collection never overwrites a non-empty
//! last-known-good snapshot unless the caller clears it deliberately with
//! [`PersistenceGateway::persist_cleared`]. History writes are write-through
//! and not subject to those guards.

use serde::de::DeserializeOwned;
use sleuth_core::error::{Result, SleuthError};
use sleuth_core::session::{Message, SessionId, SessionStore};
use sleuth_core::state::{KeyValueStore, SessionsSnapshot};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// Key of the metadata record.
pub const METADATA_KEY: &str = "sessions";

const MESSAGES_KEY_PREFIX: &str = "messages.";

/// Key of the history record of one session.
pub fn messages_key(session_id: &SessionId) -> String {
    format!("{MESSAGES_KEY_PREFIX}{session_id}")
}

/// What a metadata write attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Written,
    /// Hydration has not completed yet
    SkippedBeforeHydration,
    /// The collection is empty but durable state is not
    SkippedEmptyOverwrite,
}

/// State reconstructed at startup.
#[derive(Debug)]
pub struct Hydration {
    pub store: SessionStore,
    /// History of the active session, empty if there is none
    pub active_history: Vec<Message>,
}

/// Sole writer of the persistent key/value space.
pub struct PersistenceGateway {
    storage: Arc<dyn KeyValueStore>,
    /// Initialized false, set true exactly once by [`Self::hydrate`]
    hydrated: AtomicBool,
    /// Most recent metadata hydrated from or written to storage; held for
    /// the whole of [`Self::hydrate`]
    last_known_good: Mutex<SessionsSnapshot>,
}

impl PersistenceGateway {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            hydrated: AtomicBool::new(false),
            last_known_good: Mutex::new(SessionsSnapshot::default()),
        }
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated.load(Ordering::Acquire)
    }

    /// Rebuilds the session store and the active history from storage.
    ///
    /// Steps:
    /// 1. Read metadata; absent or malformed means an empty collection, and
    ///    sessions whose id cannot name a history record are dropped
    /// 2. Force `pending = false` on every session
    /// 3. Resolve the active id (persisted, else first, else none)
    /// 4. Load the active session's history
    /// 5. Mark hydration complete
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read at all, or if hydration
    /// already ran on this gateway.
    pub async fn hydrate(&self) -> Result<Hydration> {
        let mut last_known_good = self.last_known_good.lock().await;
        if self.is_hydrated() {
            return Err(SleuthError::internal("persistence already hydrated"));
        }

        let snapshot = self.read_metadata().await?;
        let store = SessionStore::restore(snapshot);

        let active_history = match store.active_id() {
            Some(id) => self.load_messages(id).await?,
            None => Vec::new(),
        };

        *last_known_good = store.snapshot();
        self.hydrated.store(true, Ordering::Release);

        tracing::info!(
            sessions = store.len(),
            active = ?store.active_id().map(|id| id.as_str()),
            "[PersistenceGateway] Hydration complete"
        );

        Ok(Hydration {
            store,
            active_history,
        })
    }

    /// Reads and decodes one record.
    ///
    /// A record that exists but does not decode is reported as
    /// `CorruptState`; storage failures are passed through.
    async fn read_record<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.storage.get(key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| SleuthError::corrupt_state(key, e.to_string()))
    }

    async fn read_metadata(&self) -> Result<SessionsSnapshot> {
        let mut snapshot = match self.read_record::<SessionsSnapshot>(METADATA_KEY).await {
            Ok(snapshot) => snapshot.unwrap_or_default(),
            Err(e) if e.is_corrupt_state() => {
                tracing::warn!(error = %e, "[PersistenceGateway] Ignoring corrupt metadata");
                return Ok(SessionsSnapshot::default());
            }
            Err(e) => return Err(e),
        };

        snapshot.sessions.retain(|session| {
            let keep = session.id.is_well_formed();
            if !keep {
                tracing::warn!(
                    session_id = %session.id,
                    "[PersistenceGateway] Dropping session with malformed id"
                );
            }
            keep
        });
        Ok(snapshot)
    }

    /// Writes the metadata record, subject to the hydration and
    /// empty-overwrite guards.
    pub async fn persist_metadata(&self, snapshot: &SessionsSnapshot) -> Result<PersistOutcome> {
        if !self.is_hydrated() {
            tracing::debug!("[PersistenceGateway] Skipping metadata write before hydration");
            return Ok(PersistOutcome::SkippedBeforeHydration);
        }

        let mut last_known_good = self.last_known_good.lock().await;
        if snapshot.is_empty() && !last_known_good.is_empty() {
            tracing::warn!(
                durable_sessions = last_known_good.sessions.len(),
                "[PersistenceGateway] Refusing to overwrite sessions with an empty collection"
            );
            return Ok(PersistOutcome::SkippedEmptyOverwrite);
        }

        self.write_metadata(snapshot).await?;
        *last_known_good = snapshot.clone();
        Ok(PersistOutcome::Written)
    }

    /// Writes an empty collection after the user deleted the last session.
    ///
    /// This is the only path that may replace a non-empty durable collection
    /// with an empty one.
    pub async fn persist_cleared(&self) -> Result<PersistOutcome> {
        if !self.is_hydrated() {
            return Ok(PersistOutcome::SkippedBeforeHydration);
        }

        let mut last_known_good = self.last_known_good.lock().await;
        let cleared = SessionsSnapshot::default();
        self.write_metadata(&cleared).await?;
        *last_known_good = cleared;
        Ok(PersistOutcome::Written)
    }

    async fn write_metadata(&self, snapshot: &SessionsSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;
        self.storage.set(METADATA_KEY, &json).await
    }

    /// Reads the persisted history of a session.
    ///
    /// Absent or malformed records read as an empty history.
    pub async fn load_messages(&self, session_id: &SessionId) -> Result<Vec<Message>> {
        match self.read_record::<Vec<Message>>(&messages_key(session_id)).await {
            Ok(messages) => Ok(messages.unwrap_or_default()),
            Err(e) if e.is_corrupt_state() => {
                tracing::warn!(error = %e, "[PersistenceGateway] Ignoring corrupt history");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Replaces the persisted history of a session.
    pub async fn save_messages(&self, session_id: &SessionId, messages: &[Message]) -> Result<()> {
        let json = serde_json::to_string(messages)?;
        self.storage.set(&messages_key(session_id), &json).await
    }

    /// Deletes the persisted history of a session.
    pub async fn purge_messages(&self, session_id: &SessionId) -> Result<()> {
        self.storage.remove(&messages_key(session_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sleuth_core::session::PreparationState;
    use sleuth_infrastructure::MemoryKeyValueStore;

    fn gateway_over(storage: &MemoryKeyValueStore) -> PersistenceGateway {
        PersistenceGateway::new(Arc::new(storage.clone()))
    }

    async fn stored_snapshot(storage: &MemoryKeyValueStore) -> Option<SessionsSnapshot> {
        let raw = storage.get(METADATA_KEY).await.unwrap()?;
        Some(serde_json::from_str(&raw).unwrap())
    }

    #[tokio::test]
    async fn test_hydrate_empty_storage() {
        let storage = MemoryKeyValueStore::new();
        let gateway = gateway_over(&storage);

        let hydration = gateway.hydrate().await.unwrap();
        assert!(hydration.store.is_empty());
        assert!(hydration.store.active_id().is_none());
        assert!(hydration.active_history.is_empty());
        assert!(gateway.is_hydrated());
    }

    #[tokio::test]
    async fn test_hydrate_twice_is_rejected() {
        let gateway = gateway_over(&MemoryKeyValueStore::new());
        gateway.hydrate().await.unwrap();
        assert!(gateway.hydrate().await.is_err());
    }

    #[tokio::test]
    async fn test_corrupt_metadata_reads_as_empty() {
        let storage = MemoryKeyValueStore::new();
        storage.set(METADATA_KEY, "{not json").await.unwrap();

        let gateway = gateway_over(&storage);
        let err = gateway
            .read_record::<SessionsSnapshot>(METADATA_KEY)
            .await
            .unwrap_err();
        assert!(err.is_corrupt_state());

        let hydration = gateway.hydrate().await.unwrap();
        assert!(hydration.store.is_empty());
    }

    #[tokio::test]
    async fn test_sessions_with_malformed_ids_are_dropped() {
        let storage = MemoryKeyValueStore::new();
        let mut store = SessionStore::new();
        let kept = store.create_session("0xAAA").unwrap();
        let mut snapshot = store.snapshot();
        let mut broken = kept.clone();
        broken.id = SessionId::from("a b/../c");
        snapshot.sessions.insert(0, broken.clone());
        snapshot.active_id = Some(broken.id.clone());
        storage
            .set(METADATA_KEY, &serde_json::to_string(&snapshot).unwrap())
            .await
            .unwrap();

        let hydration = gateway_over(&storage).hydrate().await.unwrap();
        assert_eq!(hydration.store.len(), 1);
        assert!(!hydration.store.contains(&broken.id));
        assert_eq!(hydration.store.active_id(), Some(&kept.id));
    }

    #[tokio::test]
    async fn test_concurrent_hydrate_runs_once() {
        let gateway = gateway_over(&MemoryKeyValueStore::new());
        let (first, second) = tokio::join!(gateway.hydrate(), gateway.hydrate());
        assert_ne!(first.is_ok(), second.is_ok());
        assert!(gateway.is_hydrated());
    }

    #[tokio::test]
    async fn test_hydrate_resets_pending_and_loads_active_history() {
        let storage = MemoryKeyValueStore::new();
        let mut store = SessionStore::new();
        let a = store.create_session("0xAAA").unwrap();
        let b = store.create_session("0xBBB").unwrap();
        store.set_pending(&a.id, true);
        store.set_pending(&b.id, true);
        store.set_active(&a.id);
        storage
            .set(METADATA_KEY, &serde_json::to_string(&store.snapshot()).unwrap())
            .await
            .unwrap();
        storage
            .set(
                &messages_key(&a.id),
                &serde_json::to_string(&[Message::user("hello")]).unwrap(),
            )
            .await
            .unwrap();

        let hydration = gateway_over(&storage).hydrate().await.unwrap();
        assert_eq!(hydration.store.len(), 2);
        assert!(hydration.store.sessions().iter().all(|s| !s.pending));
        assert_eq!(hydration.store.active_id(), Some(&a.id));
        assert_eq!(hydration.active_history.len(), 1);
        assert_eq!(hydration.active_history[0].content, "hello");
    }

    #[tokio::test]
    async fn test_no_metadata_write_before_hydration() {
        let storage = MemoryKeyValueStore::new();
        let gateway = gateway_over(&storage);

        let mut store = SessionStore::new();
        store.create_session("0xAAA").unwrap();

        let outcome = gateway.persist_metadata(&store.snapshot()).await.unwrap();
        assert_eq!(outcome, PersistOutcome::SkippedBeforeHydration);
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_empty_collection_never_clobbers_durable_sessions() {
        let storage = MemoryKeyValueStore::new();
        let mut store = SessionStore::new();
        let a = store.create_session("0xAAA").unwrap();
        storage
            .set(METADATA_KEY, &serde_json::to_string(&store.snapshot()).unwrap())
            .await
            .unwrap();

        let gateway = gateway_over(&storage);
        gateway.hydrate().await.unwrap();

        let outcome = gateway
            .persist_metadata(&SessionsSnapshot::default())
            .await
            .unwrap();
        assert_eq!(outcome, PersistOutcome::SkippedEmptyOverwrite);

        let durable = stored_snapshot(&storage).await.unwrap();
        assert_eq!(durable.sessions.len(), 1);
        assert_eq!(durable.sessions[0].id, a.id);
    }

    #[tokio::test]
    async fn test_persist_cleared_writes_empty_collection() {
        let storage = MemoryKeyValueStore::new();
        let mut store = SessionStore::new();
        store.create_session("0xAAA").unwrap();
        storage
            .set(METADATA_KEY, &serde_json::to_string(&store.snapshot()).unwrap())
            .await
            .unwrap();

        let gateway = gateway_over(&storage);
        gateway.hydrate().await.unwrap();
        assert_eq!(gateway.persist_cleared().await.unwrap(), PersistOutcome::Written);
        assert!(stored_snapshot(&storage).await.unwrap().is_empty());

        // After a deliberate clear, an empty collection is the durable state.
        let outcome = gateway
            .persist_metadata(&SessionsSnapshot::default())
            .await
            .unwrap();
        assert_eq!(outcome, PersistOutcome::Written);
    }

    #[tokio::test]
    async fn test_metadata_write_tracks_latest_snapshot() {
        let storage = MemoryKeyValueStore::new();
        let gateway = gateway_over(&storage);
        gateway.hydrate().await.unwrap();

        let mut store = SessionStore::new();
        let session = store.create_session("0xAAA").unwrap();
        store.update_status(&session.tag, PreparationState::Done, None);
        assert_eq!(
            gateway.persist_metadata(&store.snapshot()).await.unwrap(),
            PersistOutcome::Written
        );

        let durable = stored_snapshot(&storage).await.unwrap();
        assert_eq!(durable, store.snapshot());

        let outcome = gateway
            .persist_metadata(&SessionsSnapshot::default())
            .await
            .unwrap();
        assert_eq!(outcome, PersistOutcome::SkippedEmptyOverwrite);
    }

    #[tokio::test]
    async fn test_history_round_trip_and_corruption() {
        let storage = MemoryKeyValueStore::new();
        let gateway = gateway_over(&storage);
        let id = SessionId::from("s-1");

        assert!(gateway.load_messages(&id).await.unwrap().is_empty());

        let messages = vec![Message::user("q"), Message::assistant("a")];
        gateway.save_messages(&id, &messages).await.unwrap();
        assert_eq!(gateway.load_messages(&id).await.unwrap(), messages);

        storage.set(&messages_key(&id), "[{\"role\":").await.unwrap();
        assert!(gateway.load_messages(&id).await.unwrap().is_empty());

        gateway.purge_messages(&id).await.unwrap();
        assert!(!storage.contains_key(&messages_key(&id)).await);
    }

    struct UnreadableStore;

    #[async_trait]
    impl KeyValueStore for UnreadableStore {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(SleuthError::io("disk unavailable"))
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(SleuthError::io("disk unavailable"))
        }

        async fn remove(&self, _key: &str) -> Result<()> {
            Err(SleuthError::io("disk unavailable"))
        }
    }

    #[tokio::test]
    async fn test_unreadable_storage_fails_hydration_without_marking_it_done() {
        let gateway = PersistenceGateway::new(Arc::new(UnreadableStore));
        assert!(gateway.hydrate().await.is_err());
        assert!(!gateway.is_hydrated());
    }
}
