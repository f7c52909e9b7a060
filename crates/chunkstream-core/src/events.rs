//! Download lifecycle events and a synchronous publish/subscribe bus.
//!
//! Handlers are registered per event kind and invoked synchronously, in
//! registration order, on the thread that emits. There is no queueing and no
//! async dispatch. Emitting a kind nobody listens to logs a warning and is
//! otherwise a no-op, so the core stays usable without wiring every event.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::fetch::FetchError;

/// An event that can be routed by kind.
pub trait Event {
    type Kind: Copy + Eq + Hash + fmt::Debug;

    fn kind(&self) -> Self::Kind;
}

/// Kinds of events emitted by the download coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Added,
    Removed,
    Reset,
    Downloading,
    Success,
    Failed,
    Aborted,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::Added,
        EventKind::Removed,
        EventKind::Reset,
        EventKind::Downloading,
        EventKind::Success,
        EventKind::Failed,
        EventKind::Aborted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Added => "added",
            EventKind::Removed => "removed",
            EventKind::Reset => "reseted",
            EventKind::Downloading => "downloading",
            EventKind::Success => "success",
            EventKind::Failed => "failed",
            EventKind::Aborted => "aborted",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle transition of a chunk key. `P` is the decoded payload type.
#[derive(Debug)]
pub enum DownloadEvent<P> {
    /// Key was queued, or moved to a better priority.
    Added { key: String, priority: usize },
    /// Key was taken out of the queue before being downloaded.
    Removed { key: String },
    /// Queue and in-flight table were cleared.
    Reset,
    /// Key was admitted and its fetch started.
    Downloading { key: String },
    /// Fetch and decode succeeded.
    Success { key: String, payload: Arc<P> },
    /// Fetch returned a non-success response or decoding failed. Not retried.
    Failed { key: String, error: FetchError },
    /// Fetch was cancelled through `abort` / `abort_all`.
    Aborted { key: String },
}

impl<P> DownloadEvent<P> {
    /// Key the event refers to (`None` for `Reset`).
    pub fn key(&self) -> Option<&str> {
        match self {
            DownloadEvent::Added { key, .. }
            | DownloadEvent::Removed { key }
            | DownloadEvent::Downloading { key }
            | DownloadEvent::Success { key, .. }
            | DownloadEvent::Failed { key, .. }
            | DownloadEvent::Aborted { key } => Some(key),
            DownloadEvent::Reset => None,
        }
    }
}

impl<P> Event for DownloadEvent<P> {
    type Kind = EventKind;

    fn kind(&self) -> EventKind {
        match self {
            DownloadEvent::Added { .. } => EventKind::Added,
            DownloadEvent::Removed { .. } => EventKind::Removed,
            DownloadEvent::Reset => EventKind::Reset,
            DownloadEvent::Downloading { .. } => EventKind::Downloading,
            DownloadEvent::Success { .. } => EventKind::Success,
            DownloadEvent::Failed { .. } => EventKind::Failed,
            DownloadEvent::Aborted { .. } => EventKind::Aborted,
        }
    }
}

/// Handle returned by [`EventBus::on`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Registration table keyed by event kind; each entry an ordered handler list.
pub struct EventBus<E: Event> {
    handlers: RwLock<HashMap<E::Kind, Vec<(HandlerId, Handler<E>)>>>,
    next_id: AtomicU64,
}

impl<E: Event> EventBus<E> {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register `handler` for `kind`. Handlers for the same kind run in registration order.
    pub fn on<F>(&self, kind: E::Kind, handler: F) -> HandlerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Unregister a handler. Returns false if it was not registered.
    pub fn off(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        for list in handlers.values_mut() {
            if let Some(index) = list.iter().position(|(h, _)| *h == id) {
                list.remove(index);
                return true;
            }
        }
        false
    }

    pub fn handler_count(&self, kind: E::Kind) -> usize {
        self.handlers.read().get(&kind).map_or(0, Vec::len)
    }

    /// Invoke every handler registered for the event's kind; returns how many ran.
    ///
    /// The handler list is snapshotted first, so handlers may register or
    /// unregister others without deadlocking.
    pub fn emit(&self, event: &E) -> usize {
        let kind = event.kind();
        let snapshot: Vec<Handler<E>> = match self.handlers.read().get(&kind) {
            Some(list) => list.iter().map(|(_, h)| Arc::clone(h)).collect(),
            None => Vec::new(),
        };
        if snapshot.is_empty() {
            tracing::warn!(?kind, "no handler registered for event");
            return 0;
        }
        for handler in &snapshot {
            handler(event);
        }
        snapshot.len()
    }
}

impl<E: Event> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read();
        let counts: HashMap<_, _> = handlers.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("EventBus").field("handlers", &counts).finish()
    }
}
