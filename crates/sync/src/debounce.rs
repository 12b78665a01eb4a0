//! Debounced write-back bookkeeping.
//!
//! Rapid +/- clicks must not cost one network round-trip each. Every cart
//! mutation (re)arms the scheduler: a generation counter is bumped and a
//! sleeper task for that generation is spawned by the engine. A sleeper that
//! wakes to find itself superseded returns without sending, so only the
//! most-recently-scheduled full model is ever transmitted.
//!
//! The [`PendingWriteBack`] descriptor exists only between the first mutation
//! of a quiet-period window and its eventual confirmation or rollback; it is
//! never persisted.

use clementine_core::CartModel;
use tokio::task::AbortHandle;

/// Ephemeral descriptor for an armed or in-flight write-back window.
#[derive(Debug, Clone)]
pub(crate) struct PendingWriteBack {
    /// The last server-confirmed model, captured when the window opened.
    /// Rollback target if the write-back fails.
    pub snapshot_before: CartModel,
}

/// Scheduler state embedded in the cart engine, behind its lock.
#[derive(Debug, Default)]
pub(crate) struct DebounceState {
    generation: u64,
    pending: Option<PendingWriteBack>,
    sleeper: Option<AbortHandle>,
}

impl DebounceState {
    /// (Re)arm the window. Bumps the generation, opening the window with
    /// `snapshot_before` if it is not already open. Returns the generation
    /// the new sleeper must carry.
    pub fn arm(&mut self, snapshot_before: impl FnOnce() -> CartModel) -> u64 {
        self.generation += 1;
        if self.pending.is_none() {
            self.pending = Some(PendingWriteBack {
                snapshot_before: snapshot_before(),
            });
        }
        self.generation
    }

    /// Whether a sleeper's generation is still the latest.
    pub const fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Record the sleeper for the latest generation, aborting the previous
    /// one (a superseded sleeper is harmless, but there is no reason to let
    /// it wake).
    pub fn set_sleeper(&mut self, handle: AbortHandle) {
        if let Some(previous) = self.sleeper.replace(handle) {
            previous.abort();
        }
    }

    /// The rollback target for the open window, if any.
    pub fn rollback_target(&self) -> Option<&CartModel> {
        self.pending.as_ref().map(|p| &p.snapshot_before)
    }

    /// Record a confirmed write-back of `generation` carrying `confirmed`.
    ///
    /// Closes the window if it has not been re-armed since. If it has, the
    /// open window's rollback target advances to the confirmed model: the
    /// server now holds that state, so a later failure must not revert past
    /// it.
    pub fn confirm(&mut self, generation: u64, confirmed: &CartModel) {
        if self.is_current(generation) {
            self.pending = None;
            self.sleeper = None;
        } else if let Some(pending) = &mut self.pending {
            pending.snapshot_before = confirmed.clone();
        }
    }

    /// Close the window after a rollback.
    pub fn reset(&mut self) {
        self.pending = None;
        self.sleeper = None;
    }

    /// Cancel without flushing: abort the sleeper and drop the window. Used
    /// at session boundaries, where a trailing write would fail anyway.
    pub fn cancel(&mut self) {
        if let Some(sleeper) = self.sleeper.take() {
            sleeper.abort();
        }
        self.pending = None;
    }
}
