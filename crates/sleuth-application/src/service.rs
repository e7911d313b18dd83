//! Investigation service.
//!
//! `InvestigationService` composes the session store, the message ledger,
//! the persistence gateway, the preparation poller and the analysis backend
//! into the operations a front end calls.
//!
//! # Locking
//!
//! All mutations of the session collection happen under one
//! `tokio::sync::Mutex<SessionStore>`. The guard is held across storage
//! writes, so metadata snapshots reach storage in mutation order, but never
//! across a backend call.

use crate::events::{EVENT_CHANNEL_CAPACITY, SessionEvent};
use crate::ledger::MessageLedger;
use crate::persistence::{PersistOutcome, PersistenceGateway};
use crate::poller::{PreparationPoller, StatusSink};
use async_trait::async_trait;
use sleuth_core::backend::{AnalysisBackend, PreparationStatus};
use sleuth_core::error::{Result, SleuthError};
use sleuth_core::session::{Message, PreparationState, Session, SessionId, SessionStore};
use sleuth_core::state::KeyValueStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};

/// Assistant reply recorded when a chat request fails.
pub const ASK_FAILURE_MESSAGE: &str =
    "Sorry, the analysis backend could not answer this question. Please try again.";

/// Result of [`InvestigationService::send_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The backend answered; the reply has been recorded
    Answered(Message),
    /// The request failed; a failure reply has been recorded
    Failed { reply: Message, error: SleuthError },
    /// Nothing was sent
    Skipped(SkipReason),
    /// The session was deleted while the request was in flight
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotReady(PreparationState),
    AlreadyPending,
}

/// Multi-session investigation client.
///
/// Cloning is cheap and every clone drives the same state.
#[derive(Clone)]
pub struct InvestigationService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    sessions: Mutex<SessionStore>,
    ledger: MessageLedger,
    persistence: Arc<PersistenceGateway>,
    backend: Arc<dyn AnalysisBackend>,
    poller: PreparationPoller,
    events: broadcast::Sender<SessionEvent>,
}

impl InvestigationService {
    /// Hydrates state from `storage` and starts the service.
    ///
    /// If the restored active session is still preparing, polling for its
    /// tag resumes immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub async fn open(
        storage: Arc<dyn KeyValueStore>,
        backend: Arc<dyn AnalysisBackend>,
        poll_interval: Duration,
    ) -> Result<Self> {
        let persistence = Arc::new(PersistenceGateway::new(storage));
        let hydration = persistence.hydrate().await?;

        let ledger = MessageLedger::new(Arc::clone(&persistence));
        let mut resume_tag = None;
        if let Some(active) = hydration.store.active() {
            ledger
                .seed(&active.id, hydration.active_history.clone())
                .await;
            if active.status == PreparationState::Preparing {
                resume_tag = Some(active.tag.clone());
            }
        }

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let inner = Arc::new(ServiceInner {
            sessions: Mutex::new(hydration.store),
            ledger,
            persistence,
            poller: PreparationPoller::new(Arc::clone(&backend), poll_interval),
            backend,
            events,
        });

        if let Some(tag) = resume_tag {
            tracing::info!(tag = %tag, "[InvestigationService] Resuming preparation polling");
            inner.poller.subscribe(&tag, inner.clone());
        }

        Ok(Self { inner })
    }

    /// Receives every change applied from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_hydrated(&self) -> bool {
        self.inner.persistence.is_hydrated()
    }

    /// Sessions in display order.
    pub async fn sessions(&self) -> Vec<Session> {
        self.inner.sessions.lock().await.sessions().to_vec()
    }

    pub async fn session(&self, id: &SessionId) -> Option<Session> {
        self.inner.sessions.lock().await.get(id).cloned()
    }

    pub async fn active_session(&self) -> Option<Session> {
        self.inner.sessions.lock().await.active().cloned()
    }

    /// Message history of a session.
    pub async fn history(&self, id: &SessionId) -> Result<Vec<Message>> {
        self.inner.ledger.load(id).await
    }

    /// Tag currently being polled, if any.
    pub fn polling_tag(&self) -> Option<String> {
        self.inner.poller.active_tag()
    }

    /// Creates a session for `subject_address`, makes it active and starts
    /// preparing it in the background.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the address is empty or whitespace.
    pub async fn create_session(&self, subject_address: &str) -> Result<Session> {
        let inner = &self.inner;
        let session = {
            let mut store = inner.sessions.lock().await;
            let session = store.create_session(subject_address)?;
            inner.persist_locked(&store).await;
            if let Err(e) = inner.ledger.initialize(&session.id).await {
                inner.report_storage_failure("initialize history", &e);
            }
            session
        };

        tracing::info!(
            session_id = %session.id,
            tag = %session.tag,
            "[InvestigationService] Created session"
        );
        inner.emit(SessionEvent::SessionCreated {
            session: session.clone(),
        });
        inner.emit(SessionEvent::ActiveChanged {
            session_id: Some(session.id.clone()),
        });

        tokio::spawn(ServiceInner::run_prepare(
            Arc::clone(inner),
            session.subject_address.clone(),
            session.tag.clone(),
        ));

        Ok(session)
    }

    /// Switches the active session.
    ///
    /// Returns `false` if `id` is unknown. The session's history is loaded
    /// and, if it is still preparing, polling for its tag resumes.
    pub async fn set_active(&self, id: &SessionId) -> Result<bool> {
        let inner = &self.inner;
        let session = {
            let mut store = inner.sessions.lock().await;
            if !store.set_active(id) {
                return Ok(false);
            }
            inner.persist_locked(&store).await;
            store.get(id).cloned()
        };

        inner.emit(SessionEvent::ActiveChanged {
            session_id: Some(id.clone()),
        });

        inner.ledger.load(id).await?;
        if let Some(session) = session {
            self.resume_polling(&session);
        }
        Ok(true)
    }

    /// Deletes a session and its history.
    ///
    /// Returns the removed session, or `None` if `id` is unknown.
    pub async fn delete_session(&self, id: &SessionId) -> Result<Option<Session>> {
        let inner = &self.inner;
        let (removed, active_changed, new_active, tag_still_used) = {
            let mut store = inner.sessions.lock().await;
            let was_active = store.active_id() == Some(id);
            let Some(removed) = store.delete_session(id) else {
                return Ok(None);
            };

            if store.is_empty() {
                if let Err(e) = inner.persistence.persist_cleared().await {
                    inner.report_storage_failure("clear sessions", &e);
                }
            } else {
                inner.persist_locked(&store).await;
            }

            if let Err(e) = inner.ledger.purge(id).await {
                inner.report_storage_failure("purge history", &e);
            }

            let tag_still_used = store.sessions_with_tag(&removed.tag).next().is_some();
            (removed, was_active, store.active().cloned(), tag_still_used)
        };

        tracing::info!(
            session_id = %removed.id,
            tag = %removed.tag,
            "[InvestigationService] Deleted session"
        );

        if !tag_still_used && inner.poller.active_tag().as_deref() == Some(removed.tag.as_str()) {
            inner.poller.cancel();
        }

        inner.emit(SessionEvent::SessionDeleted {
            session_id: removed.id.clone(),
        });
        if active_changed {
            inner.emit(SessionEvent::ActiveChanged {
                session_id: new_active.as_ref().map(|s| s.id.clone()),
            });
            if let Some(session) = &new_active {
                inner.ledger.load(&session.id).await?;
                self.resume_polling(session);
            }
        }

        Ok(Some(removed))
    }

    /// Sends a question to the backend on behalf of a session.
    ///
    /// The user message is recorded before the request is issued and is
    /// never rolled back. A failed request is recorded as an assistant
    /// message starting with [`ASK_FAILURE_MESSAGE`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty query and `NotFound` for an
    /// unknown session.
    pub async fn send_message(&self, id: &SessionId, query: &str) -> Result<SendOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SleuthError::invalid_input("query must not be empty"));
        }

        let inner = &self.inner;
        let user_message = Message::user(query);
        let tag = {
            let mut store = inner.sessions.lock().await;
            let session = store
                .get(id)
                .ok_or_else(|| SleuthError::not_found("session", id.as_str()))?;
            if session.pending {
                return Ok(SendOutcome::Skipped(SkipReason::AlreadyPending));
            }
            if !session.is_ready() {
                return Ok(SendOutcome::Skipped(SkipReason::NotReady(session.status)));
            }
            let tag = session.tag.clone();

            if let Err(e) = inner.ledger.append(id, user_message.clone()).await {
                inner.report_storage_failure("append message", &e);
            }
            store.set_pending(id, true);
            inner.persist_locked(&store).await;
            tag
        };

        inner.emit(SessionEvent::MessageAppended {
            session_id: id.clone(),
            message: user_message,
        });
        inner.emit(SessionEvent::PendingChanged {
            session_id: id.clone(),
            pending: true,
        });

        tracing::debug!(session_id = %id, tag = %tag, "[InvestigationService] Asking backend");
        let answer = inner.backend.ask(&tag, query).await;

        let mut store = inner.sessions.lock().await;
        if !store.contains(id) {
            tracing::info!(
                session_id = %id,
                "[InvestigationService] Session deleted while request was in flight, discarding response"
            );
            return Ok(SendOutcome::Discarded);
        }

        let (reply, outcome) = match answer {
            Ok(answer) => {
                let reply = Message::assistant_with_citations(answer.answer, answer.sources);
                (reply.clone(), SendOutcome::Answered(reply))
            }
            Err(error) => {
                tracing::warn!(session_id = %id, error = %error, "[InvestigationService] Chat request failed");
                let reply = Message::assistant(format!("{ASK_FAILURE_MESSAGE} ({error})"));
                (reply.clone(), SendOutcome::Failed { reply, error })
            }
        };

        if let Err(e) = inner.ledger.append(id, reply.clone()).await {
            inner.report_storage_failure("append message", &e);
        }
        store.set_pending(id, false);
        inner.persist_locked(&store).await;
        drop(store);

        inner.emit(SessionEvent::MessageAppended {
            session_id: id.clone(),
            message: reply,
        });
        inner.emit(SessionEvent::PendingChanged {
            session_id: id.clone(),
            pending: false,
        });

        Ok(outcome)
    }

    /// Stops background polling.
    pub fn shutdown(&self) {
        self.inner.poller.cancel();
    }

    fn resume_polling(&self, session: &Session) {
        if session.status == PreparationState::Preparing {
            self.inner
                .poller
                .subscribe(&session.tag, self.inner.clone());
        }
    }
}

impl ServiceInner {
    async fn run_prepare(inner: Arc<Self>, subject_address: String, tag: String) {
        let status = match inner.backend.prepare(&subject_address).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(tag = %tag, error = %e, "[InvestigationService] Preparation request failed");
                PreparationStatus::error(format!("Preparation failed: {e}"))
            }
        };

        let terminal = status.is_terminal();
        inner.apply_status(&tag, status).await;
        if terminal {
            return;
        }

        let still_active = inner
            .sessions
            .lock()
            .await
            .active()
            .is_some_and(|s| s.tag == tag);
        if still_active {
            inner.poller.subscribe(&tag, inner.clone());
        }
    }

    async fn persist_locked(&self, store: &SessionStore) {
        match self.persistence.persist_metadata(&store.snapshot()).await {
            Ok(PersistOutcome::Written) => {}
            Ok(outcome) => {
                tracing::debug!(?outcome, "[InvestigationService] Metadata write skipped");
            }
            Err(e) => self.report_storage_failure("persist sessions", &e),
        }
    }

    fn report_storage_failure(&self, operation: &str, error: &SleuthError) {
        tracing::error!(operation, error = %error, "[InvestigationService] Storage write failed");
        self.emit(SessionEvent::PersistenceFailed {
            message: format!("{operation}: {error}"),
        });
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is not an error.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl StatusSink for ServiceInner {
    async fn apply_status(&self, tag: &str, status: PreparationStatus) {
        let updated = {
            let mut store = self.sessions.lock().await;
            let updated = store.update_status(tag, status.state, status.message.clone());
            if !updated.is_empty() {
                self.persist_locked(&store).await;
            }
            updated
        };

        for session_id in updated {
            tracing::info!(
                session_id = %session_id,
                tag,
                state = %status.state,
                "[InvestigationService] Status changed"
            );
            self.emit(SessionEvent::StatusChanged {
                session_id,
                state: status.state,
                message: status.message.clone(),
            });
        }
    }
}
