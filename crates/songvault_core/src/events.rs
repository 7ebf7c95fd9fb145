//! Event bus for observing cache operations.
//!
//! The bus broadcasts lifecycle, error, and performance events to
//! registered listeners. Delivery is synchronous and fire-and-forget within
//! the emitting operation's completion path:
//! - Listeners for a kind run in registration order
//! - A panicking listener is isolated and later listeners still run
//! - Events are never persisted and never cross processes
//!
//! # Usage
//!
//! ```rust,ignore
//! let bus = EventBus::new();
//! let handle = bus.subscribe(EventKind::DataChanged, |event| {
//!     println!("changed: {event:?}");
//! });
//!
//! bus.emit(&StorageEvent::CleanupStarted);
//! bus.unsubscribe(&handle);
//! ```

use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// The kind of change that produced a `DataChanged` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    /// A song was inserted (no previous version existed).
    Create,
    /// A song was overwritten (previous version existed).
    Update,
    /// A song was deleted.
    Delete,
}

/// Event kinds, used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A song was created, updated, or deleted.
    DataChanged,
    /// Storage usage crossed a warning threshold.
    QuotaWarning,
    /// A sync cycle started.
    SyncStarted,
    /// A sync cycle completed.
    SyncCompleted,
    /// An operation failed.
    Error,
    /// A batch operation started.
    BatchOperationStarted,
    /// A batch operation completed.
    BatchOperationCompleted,
    /// An eviction or cleanup pass started.
    CleanupStarted,
    /// An eviction or cleanup pass completed.
    CleanupCompleted,
    /// An operation exceeded the slow-operation threshold.
    SlowOperation,
}

/// A single cache event.
///
/// Events are ephemeral: they are delivered to currently-registered
/// listeners and then dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageEvent {
    /// A song changed.
    DataChanged {
        /// What happened to the song.
        operation: ChangeOp,
        /// The affected song id.
        id: String,
    },
    /// Storage usage crossed a warning threshold.
    QuotaWarning {
        /// Bytes (or records, for count limits) in use.
        usage: u64,
        /// The limit being approached.
        quota: u64,
        /// Usage as a percentage of the limit.
        percent_used: f64,
    },
    /// A sync cycle started.
    SyncStarted,
    /// A sync cycle completed.
    SyncCompleted {
        /// Number of songs reconciled from the remote source.
        items_synced: usize,
    },
    /// An operation failed.
    Error {
        /// The operation name.
        operation: String,
        /// The failure message.
        message: String,
    },
    /// A batch operation is about to run.
    BatchOperationStarted {
        /// The operation name.
        operation: String,
        /// Number of items in the batch.
        item_count: usize,
    },
    /// A batch operation finished.
    BatchOperationCompleted {
        /// The operation name.
        operation: String,
        /// Items that persisted successfully.
        succeeded: usize,
        /// Items that failed validation or persistence.
        failed: usize,
    },
    /// An eviction or cleanup pass started.
    CleanupStarted,
    /// An eviction or cleanup pass finished.
    CleanupCompleted {
        /// Songs removed by the pass.
        items_deleted: usize,
        /// Bytes reclaimed by the pass.
        bytes_freed: u64,
    },
    /// An operation exceeded the slow-operation threshold.
    SlowOperation {
        /// The operation name.
        operation: String,
        /// Measured wall-clock duration.
        duration: Duration,
    },
}

impl StorageEvent {
    /// Returns the kind tag for this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::DataChanged { .. } => EventKind::DataChanged,
            Self::QuotaWarning { .. } => EventKind::QuotaWarning,
            Self::SyncStarted => EventKind::SyncStarted,
            Self::SyncCompleted { .. } => EventKind::SyncCompleted,
            Self::Error { .. } => EventKind::Error,
            Self::BatchOperationStarted { .. } => EventKind::BatchOperationStarted,
            Self::BatchOperationCompleted { .. } => EventKind::BatchOperationCompleted,
            Self::CleanupStarted => EventKind::CleanupStarted,
            Self::CleanupCompleted { .. } => EventKind::CleanupCompleted,
            Self::SlowOperation { .. } => EventKind::SlowOperation,
        }
    }
}

/// A registered listener callback.
type Listener = Box<dyn Fn(&StorageEvent) + Send + Sync>;

/// A disposable handle identifying one registration.
///
/// Removal goes through the handle rather than closure identity, so a
/// listener registered twice yields two independently removable
/// registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerHandle {
    kind: EventKind,
    id: u64,
}

impl ListenerHandle {
    /// Returns the event kind this handle is registered for.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

/// In-process publish/subscribe registry keyed by event kind.
pub struct EventBus {
    listeners: RwLock<HashMap<EventKind, Vec<(u64, Listener)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a listener for one event kind.
    ///
    /// Returns a handle that removes exactly this registration.
    pub fn subscribe<F>(&self, kind: EventKind, listener: F) -> ListenerHandle
    where
        F: Fn(&StorageEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .write()
            .entry(kind)
            .or_default()
            .push((id, Box::new(listener)));
        ListenerHandle { kind, id }
    }

    /// Removes the registration identified by `handle`.
    ///
    /// Returns `true` if the registration was still present.
    pub fn unsubscribe(&self, handle: &ListenerHandle) -> bool {
        let mut listeners = self.listeners.write();
        let Some(entries) = listeners.get_mut(&handle.kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(id, _)| *id != handle.id);
        entries.len() != before
    }

    /// Delivers an event to every listener registered for its kind.
    ///
    /// Listeners run in registration order. A panicking listener is
    /// swallowed so delivery continues and the emitting operation's result
    /// is unaffected.
    pub fn emit(&self, event: &StorageEvent) {
        let listeners = self.listeners.read();
        let Some(entries) = listeners.get(&event.kind()) else {
            return;
        };
        for (id, listener) in entries {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::warn!(listener = id, kind = ?event.kind(), "event listener panicked");
            }
        }
    }

    /// Returns the number of registrations for one kind.
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .read()
            .get(&kind)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Returns the total number of registrations across all kinds.
    #[must_use]
    pub fn total_listeners(&self) -> usize {
        self.listeners.read().values().map(Vec::len).sum()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("total_listeners", &self.total_listeners())
            .finish_non_exhaustive()
    }
}
