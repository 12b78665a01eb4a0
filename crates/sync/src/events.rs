//! User-facing synchronization notifications.
//!
//! Failures that roll back optimistic state are never silently swallowed: a
//! silent revert would look like a UI bug. The view layer subscribes to the
//! [`EventBus`] and renders each event as a dismissable notification.
//!
//! Stale-session responses are the one deliberate exception: they are
//! discarded inside the engine with no user-visible effect.

use tokio::sync::broadcast;

/// Notifications published to the view layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A write-back failed at the transport level; the optimistic state was
    /// rolled back.
    WriteBackFailed {
        /// Human-readable description for the notification.
        detail: String,
    },

    /// The server rejected the payload (stock conflict, product removed from
    /// catalog); the optimistic state was rolled back.
    ValidationRejected {
        /// Human-readable description for the notification.
        detail: String,
    },

    /// The session expired mid-mutation; the user must log in again.
    SessionExpired,
}

/// Broadcast channel capacity. Events are transient UI notifications; a
/// subscriber that lags this far behind has abandoned its receiver.
const EVENT_CAPACITY: usize = 32;

/// Fan-out channel for [`SyncEvent`]s, shared by the cart and likes engines.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    /// Create a new bus.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    /// Subscribe to events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: SyncEvent) {
        // Err means no subscribers; nothing to deliver to.
        if self.tx.send(event.clone()).is_err() {
            tracing::debug!(?event, "Sync event published with no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
