//! Preparation status polling.
//!
//! A [`PreparationPoller`] owns at most one live subscription. Subscribing
//! to a tag supersedes whatever was being polled before; the subscription
//! ends on its own once the backend reports a terminal state.

use async_trait::async_trait;
use sleuth_core::backend::{AnalysisBackend, PreparationStatus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Receiver of status observations produced by the poller.
#[async_trait]
pub trait StatusSink: Send + Sync + 'static {
    async fn apply_status(&self, tag: &str, status: PreparationStatus);
}

struct Subscription {
    tag: String,
    token: CancellationToken,
    generation: u64,
}

pub struct PreparationPoller {
    backend: Arc<dyn AnalysisBackend>,
    interval: Duration,
    current: Arc<Mutex<Option<Subscription>>>,
    generations: AtomicU64,
}

impl PreparationPoller {
    pub fn new(backend: Arc<dyn AnalysisBackend>, interval: Duration) -> Self {
        Self {
            backend,
            interval,
            current: Arc::new(Mutex::new(None)),
            generations: AtomicU64::new(0),
        }
    }

    /// Tag of the live subscription, if any.
    pub fn active_tag(&self) -> Option<String> {
        lock(&self.current).as_ref().map(|s| s.tag.clone())
    }

    /// Starts polling `tag`, cancelling the previous subscription.
    ///
    /// The first status request is issued immediately, then one per
    /// interval. The sink is held weakly; polling stops once it is gone.
    pub fn subscribe(&self, tag: &str, sink: Arc<dyn StatusSink>) {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();

        let previous = lock(&self.current).replace(Subscription {
            tag: tag.to_string(),
            token: token.clone(),
            generation,
        });
        if let Some(previous) = previous {
            tracing::debug!(tag = %previous.tag, "[Poller] Superseding subscription");
            previous.token.cancel();
        }

        tracing::info!(tag, interval_ms = self.interval.as_millis() as u64, "[Poller] Subscribed");

        let task = PollTask {
            backend: Arc::clone(&self.backend),
            tag: tag.to_string(),
            interval: self.interval,
            token,
            sink: Arc::downgrade(&sink),
            current: Arc::clone(&self.current),
            generation,
        };
        tokio::spawn(task.run());
    }

    /// Cancels the live subscription, if any.
    pub fn cancel(&self) {
        if let Some(subscription) = lock(&self.current).take() {
            tracing::debug!(tag = %subscription.tag, "[Poller] Cancelled");
            subscription.token.cancel();
        }
    }
}

impl Drop for PreparationPoller {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock(slot: &Mutex<Option<Subscription>>) -> MutexGuard<'_, Option<Subscription>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

struct PollTask {
    backend: Arc<dyn AnalysisBackend>,
    tag: String,
    interval: Duration,
    token: CancellationToken,
    sink: Weak<dyn StatusSink>,
    current: Arc<Mutex<Option<Subscription>>>,
    generation: u64,
}

impl PollTask {
    async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.token.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                _ = self.token.cancelled() => return,
                result = self.backend.prepare_status(&self.tag) => result,
            };

            let status = match result {
                Ok(status) => status,
                Err(e) => {
                    tracing::warn!(
                        tag = %self.tag,
                        error = %e,
                        transient = e.is_transient(),
                        "[Poller] Status request failed, retrying next tick"
                    );
                    continue;
                }
            };

            let Some(sink) = self.sink.upgrade() else {
                tracing::debug!(tag = %self.tag, "[Poller] Sink dropped, stopping");
                break;
            };

            let terminal = status.is_terminal();
            tracing::debug!(tag = %self.tag, state = %status.state, "[Poller] Status observed");
            sink.apply_status(&self.tag, status).await;

            if terminal {
                tracing::info!(tag = %self.tag, "[Poller] Terminal state reached");
                break;
            }
        }

        let mut current = lock(&self.current);
        if current.as_ref().map(|s| s.generation) == Some(self.generation) {
            *current = None;
        }
    }
}
