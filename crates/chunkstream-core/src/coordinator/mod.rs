//! Priority-scheduled concurrent chunk downloads.
//!
//! `DownloadCoordinator` owns a `PriorityScheduler` and the table of
//! in-flight fetches. Whenever a slot is free and work is queued it pops a key
//! (probabilistic level selection), registers a cancellation token and spawns
//! the fetch on the Tokio runtime. Every terminal outcome frees the slot and
//! re-runs admission before the outcome is announced, so the concurrency
//! budget stays saturated while work is available.
//!
//! Per key: `Queued -> InFlight -> {Succeeded | Failed | Aborted}`. Nothing is
//! retried; a key comes back only through a new `add`.
//!
//! All scheduler and in-flight state sits behind one mutex. Events are
//! emitted after that lock is released, so handlers may call back into the
//! coordinator. Every state change that emits holds a reentrant emission
//! guard from the mutation through its events, so subscribers on any thread
//! see `added` before `downloading` before the terminal event of a key.
//!
//! Fetch and decode run in their own task; a panic there is reported as a
//! `failed` event and the slot is released like any other outcome.

mod pending;

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::config::{CoordinatorConfig, TransportSettings};
use crate::error::ConfigError;
use crate::events::{DownloadEvent, EventBus, EventKind, HandlerId};
use crate::fetch::{Decoder, FetchError, Fetcher};
use crate::queue::PriorityScheduler;

use pending::{PendingSet, Ticket};

/// Where a key currently is. Keys that finished (or were never added) have no state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Queued { priority: usize },
    InFlight,
}

struct SchedulerState {
    scheduler: PriorityScheduler,
    pending: PendingSet,
}

struct Inner<D: Decoder> {
    // Lock order: `emitting` before `state`.
    emitting: ReentrantMutex<()>,
    state: Mutex<SchedulerState>,
    events: EventBus<DownloadEvent<D::Payload>>,
    fetcher: Arc<dyn Fetcher>,
    decoder: D,
    transport: TransportSettings,
    concurrency_budget: usize,
    runtime: Handle,
}

/// Cheaply cloneable handle; clones share the same queue and in-flight table.
pub struct DownloadCoordinator<D: Decoder> {
    inner: Arc<Inner<D>>,
}

impl<D: Decoder> Clone for DownloadCoordinator<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: Decoder> DownloadCoordinator<D> {
    /// Build a coordinator that spawns fetches on the current Tokio runtime.
    pub fn new(
        cfg: &CoordinatorConfig,
        fetcher: Arc<dyn Fetcher>,
        decoder: D,
    ) -> Result<Self, ConfigError> {
        let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;
        Self::with_runtime(cfg, fetcher, decoder, runtime)
    }

    /// Build a coordinator that spawns fetches on `runtime`.
    pub fn with_runtime(
        cfg: &CoordinatorConfig,
        fetcher: Arc<dyn Fetcher>,
        decoder: D,
        runtime: Handle,
    ) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let scheduler = match cfg.seed {
            Some(seed) => PriorityScheduler::with_seed(cfg.priority_levels, seed)?,
            None => PriorityScheduler::new(cfg.priority_levels)?,
        };
        Ok(Self {
            inner: Arc::new(Inner {
                emitting: ReentrantMutex::new(()),
                state: Mutex::new(SchedulerState {
                    scheduler,
                    pending: PendingSet::new(),
                }),
                events: EventBus::new(),
                fetcher,
                decoder,
                transport: cfg.transport.clone(),
                concurrency_budget: cfg.concurrency_budget,
                runtime,
            }),
        })
    }

    /// Subscribe to one kind of download event.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&DownloadEvent<D::Payload>) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, handler)
    }

    pub fn off(&self, id: HandlerId) -> bool {
        self.inner.events.off(id)
    }

    pub fn events(&self) -> &EventBus<DownloadEvent<D::Payload>> {
        &self.inner.events
    }

    /// Queue `key` at `priority` (0 = highest) and admit work if a slot is free.
    ///
    /// Returns false, without emitting anything, when the key is already
    /// queued at an equal or better priority or is currently in flight.
    pub fn add(&self, key: &str, priority: usize) -> bool {
        let _emitting = self.inner.emitting.lock();
        let queued_at = {
            let mut state = self.inner.state.lock();
            if state.pending.contains(key) {
                tracing::debug!(key, "add ignored, key already in flight");
                return false;
            }
            if !state.scheduler.add(key, priority) {
                return false;
            }
            state.scheduler.get_priority(key).unwrap_or(priority)
        };
        self.inner.events.emit(&DownloadEvent::Added {
            key: key.to_string(),
            priority: queued_at,
        });
        self.try_admit();
        true
    }

    /// Take a queued key out of the queue. In-flight fetches are not affected.
    pub fn remove(&self, key: &str) -> bool {
        let _emitting = self.inner.emitting.lock();
        let removed = self.inner.state.lock().scheduler.remove(key);
        match removed {
            Some(key) => {
                self.inner.events.emit(&DownloadEvent::Removed { key });
                true
            }
            None => false,
        }
    }

    /// Signal cancellation of an in-flight fetch. The `aborted` event follows
    /// once the fetch actually stops.
    pub fn abort(&self, key: &str) -> bool {
        self.inner.state.lock().pending.abort(key)
    }

    /// Signal cancellation of every in-flight fetch; returns how many were signalled.
    pub fn abort_all(&self) -> usize {
        self.inner.state.lock().pending.abort_all()
    }

    /// Clear the queue and forget in-flight fetches without cancelling them.
    ///
    /// Fetches already running still complete and announce their outcome.
    pub fn reset(&self) {
        let _emitting = self.inner.emitting.lock();
        {
            let mut state = self.inner.state.lock();
            state.scheduler.reset();
            state.pending.clear();
        }
        self.inner.events.emit(&DownloadEvent::Reset);
    }

    pub fn get_priority(&self, key: &str) -> Option<usize> {
        self.inner.state.lock().scheduler.get_priority(key)
    }

    /// Whether `key` is queued (at `priority`, or at any level when `None`).
    pub fn has(&self, key: &str, priority: Option<usize>) -> bool {
        self.inner.state.lock().scheduler.has(key, priority)
    }

    /// True when nothing is queued (in-flight fetches do not count).
    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().scheduler.is_empty()
    }

    /// Number of queued keys.
    pub fn size(&self) -> usize {
        self.inner.state.lock().scheduler.size(None)
    }

    pub fn size_per_priority(&self) -> Vec<usize> {
        self.inner.state.lock().scheduler.size_per_level()
    }

    pub fn state(&self, key: &str) -> Option<DownloadState> {
        let state = self.inner.state.lock();
        if state.pending.contains(key) {
            return Some(DownloadState::InFlight);
        }
        state
            .scheduler
            .get_priority(key)
            .map(|priority| DownloadState::Queued { priority })
    }

    /// Number of fetches currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    pub fn in_flight_keys(&self) -> Vec<String> {
        self.inner
            .state
            .lock()
            .pending
            .keys()
            .map(str::to_string)
            .collect()
    }

    /// True when nothing is queued and nothing is in flight.
    pub fn is_idle(&self) -> bool {
        let state = self.inner.state.lock();
        state.scheduler.is_empty() && state.pending.is_empty()
    }

    pub fn concurrency_budget(&self) -> usize {
        self.inner.concurrency_budget
    }

    pub fn priority_levels(&self) -> usize {
        self.inner.state.lock().scheduler.levels()
    }

    /// Pop and start fetches while slots are free and work is queued.
    fn try_admit(&self) {
        let _emitting = self.inner.emitting.lock();
        let admitted: Vec<(String, Ticket, CancellationToken)> = {
            let mut state = self.inner.state.lock();
            let mut admitted = Vec::new();
            while state.pending.len() < self.inner.concurrency_budget {
                let Some(key) = state.scheduler.pop() else {
                    break;
                };
                let (ticket, token) = state.pending.register(&key);
                admitted.push((key, ticket, token));
            }
            admitted
        };

        for (key, ticket, token) in admitted {
            tracing::debug!(key = %key, "download admitted");
            self.inner
                .events
                .emit(&DownloadEvent::Downloading { key: key.clone() });
            let this = self.clone();
            self.inner.runtime.spawn(this.run_fetch(key, ticket, token));
        }
    }

    async fn run_fetch(self, key: String, ticket: Ticket, token: CancellationToken) {
        let worker = self.clone();
        let task_key = key.clone();
        let joined = self
            .inner
            .runtime
            .spawn(async move { worker.fetch_and_decode(&task_key, token).await })
            .await;
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => {
                tracing::error!(key = %key, "fetch task panicked");
                Err(FetchError::Panicked)
            }
            Err(_) => Err(FetchError::Cancelled),
        };
        self.finish(key, ticket, outcome);
    }

    async fn fetch_and_decode(
        &self,
        key: &str,
        token: CancellationToken,
    ) -> Result<D::Payload, FetchError> {
        let bytes = self
            .inner
            .fetcher
            .fetch(key, &self.inner.transport, token)
            .await?;
        Ok(self.inner.decoder.decode(key, bytes)?)
    }

    /// Release the slot, refill, then announce the outcome.
    fn finish(&self, key: String, ticket: Ticket, outcome: Result<D::Payload, FetchError>) {
        let _emitting = self.inner.emitting.lock();
        let tracked = self.inner.state.lock().pending.complete(&key, ticket);
        if !tracked {
            tracing::debug!(key = %key, "completion for a key no longer tracked");
        }
        self.try_admit();

        let event = match outcome {
            Ok(payload) => {
                tracing::debug!(key = %key, "download succeeded");
                DownloadEvent::Success {
                    key,
                    payload: Arc::new(payload),
                }
            }
            Err(FetchError::Cancelled) => {
                tracing::debug!(key = %key, "download aborted");
                DownloadEvent::Aborted { key }
            }
            Err(error) => {
                tracing::warn!(key = %key, error = %error, "download failed");
                DownloadEvent::Failed { key, error }
            }
        };
        self.inner.events.emit(&event);
    }
}

impl<D: Decoder> fmt::Debug for DownloadCoordinator<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("DownloadCoordinator")
            .field("queued", &state.scheduler.size_per_level())
            .field("in_flight", &state.pending.len())
            .field("concurrency_budget", &self.inner.concurrency_budget)
            .finish()
    }
}
