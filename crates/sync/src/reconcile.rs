//! The reconciliation / rollback controller.
//!
//! Every write-back — the debounced cart replacement and each per-id like
//! toggle — resolves through [`Reconciler::resolve`] so rollback semantics are
//! uniform across both engines instead of re-implemented per feature.
//!
//! Resolution rules, in order:
//!
//! 1. A response issued under an earlier session epoch is stale: the model it
//!    was built from no longer exists. Discarded silently.
//! 2. A success confirms the optimistic state; no model mutation is needed.
//! 3. A failure rolls the model back to its pre-mutation snapshot and
//!    publishes a user-facing event - unless the user has mutated again since
//!    the request was issued, in which case the rollback is skipped (it would
//!    clobber the newer state) and the newer pending write-back carries the
//!    current model instead.

use crate::backend::RemoteError;
use crate::events::{EventBus, SyncEvent};

/// How a finished write-back was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteBackOutcome {
    /// The server accepted the payload; optimistic state already matches.
    Confirmed,
    /// The payload was rejected and the pre-mutation snapshot was restored.
    RolledBack,
    /// The payload failed, but newer local mutations exist; no rollback, the
    /// next write-back supersedes this one.
    Superseded,
    /// The response crossed a session boundary and was discarded.
    Stale,
}

/// The user-facing event for a failed write-back.
pub(crate) fn event_for_failure(err: &RemoteError) -> SyncEvent {
    match err {
        RemoteError::Network(detail) => SyncEvent::WriteBackFailed {
            detail: detail.clone(),
        },
        RemoteError::Validation(detail) => SyncEvent::ValidationRejected {
            detail: detail.clone(),
        },
        RemoteError::Unauthorized => SyncEvent::SessionExpired,
    }
}

/// Shared rollback controller for the cart and likes engines.
#[derive(Debug, Clone)]
pub struct Reconciler {
    events: EventBus,
}

impl Reconciler {
    /// Create a controller publishing to `events`.
    #[must_use]
    pub const fn new(events: EventBus) -> Self {
        Self { events }
    }

    /// The event bus this controller publishes to.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Resolve a finished write-back.
    ///
    /// `issued_epoch` is the session epoch the request was issued under,
    /// `current_epoch` the engine's epoch now; a mismatch means the response
    /// crossed a session boundary. `remutated` is whether the user mutated
    /// the model again after the request was issued. `revert` is applied only
    /// when the outcome is [`WriteBackOutcome::RolledBack`]; the caller
    /// re-emits state to subscribers afterwards.
    pub(crate) fn resolve<F: FnOnce()>(
        &self,
        context: &'static str,
        issued_epoch: u64,
        current_epoch: u64,
        remutated: bool,
        result: &Result<(), RemoteError>,
        revert: F,
    ) -> WriteBackOutcome {
        if issued_epoch != current_epoch {
            tracing::debug!(
                context,
                issued_epoch,
                current_epoch,
                "Discarding response from a previous session"
            );
            return WriteBackOutcome::Stale;
        }

        match result {
            Ok(()) => WriteBackOutcome::Confirmed,
            Err(e) if remutated => {
                // The model moved on while this request was in flight; the
                // write-back scheduled by that newer mutation will surface
                // its own success or failure.
                tracing::warn!(context, error = %e, "Write-back failed but was superseded");
                WriteBackOutcome::Superseded
            }
            Err(e) => {
                tracing::warn!(context, error = %e, "Write-back failed, rolling back");
                revert();
                self.events.publish(event_for_failure(e));
                WriteBackOutcome::RolledBack
            }
        }
    }
}
