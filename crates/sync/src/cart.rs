//! The cart synchronization engine.
//!
//! Mutations apply optimistically to the in-memory model, mirror to the
//! session store, and - while authenticated - arm the debounced write-back.
//! The UI subscribes to a `watch` channel of [`CartSnapshot`]s and always
//! reads the latest optimistic value; there is no visible consistency window.
//!
//! The engine is a cheaply cloneable handle; all clones share state. It must
//! be used from within a Tokio runtime, since mutations spawn the write-back
//! sleeper task.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use clementine_core::{
    CartError, CartLine, CartModel, Price, ProductId, ProductRef, SessionIdentity,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::backend::{CartBackend, StockSource};
use crate::config::SyncConfig;
use crate::debounce::DebounceState;
use crate::reconcile::{Reconciler, WriteBackOutcome, event_for_failure};
use crate::store::{self, SessionStore, keys};

/// Immutable cart view handed to subscribers.
///
/// Derived values are recomputed synchronously with every mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    /// Cart lines, ordered by product id.
    pub lines: Vec<CartLine>,
    /// Total units across all lines.
    pub count: u32,
    /// Total price across all lines.
    pub total: Price,
}

impl CartSnapshot {
    fn of(model: &CartModel) -> Self {
        Self {
            lines: model.to_lines(),
            count: model.count(),
            total: model.total(),
        }
    }
}

/// Mutable engine state, behind one lock. Critical sections never suspend.
struct Shared {
    model: CartModel,
    session: SessionIdentity,
    /// Bumped on every session transition; in-flight responses carrying an
    /// older epoch are discarded.
    epoch: u64,
    /// Bumped on every local mutation; lets the reconciler detect that a
    /// failing write-back was superseded by newer user input.
    seq: u64,
    debounce: DebounceState,
}

struct Inner<B> {
    backend: B,
    store: Arc<dyn SessionStore>,
    reconciler: Reconciler,
    config: SyncConfig,
    shared: Mutex<Shared>,
    changed: watch::Sender<CartSnapshot>,
}

/// The cart synchronization engine.
pub struct CartSyncEngine<B> {
    inner: Arc<Inner<B>>,
}

impl<B> Clone for CartSyncEngine<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: CartBackend + StockSource> CartSyncEngine<B> {
    /// Create an engine in the guest state.
    ///
    /// If the session store holds a cart mirror from a previous page load, the
    /// model hydrates from it; a corrupt mirror falls back to empty.
    #[must_use]
    pub fn new(
        backend: B,
        store: Arc<dyn SessionStore>,
        reconciler: Reconciler,
        config: SyncConfig,
    ) -> Self {
        let lines: Vec<CartLine> = store::read_json(store.as_ref(), keys::CART).unwrap_or_default();
        let model = CartModel::from_lines(lines);
        let (changed, _rx) = watch::channel(CartSnapshot::of(&model));

        Self {
            inner: Arc::new(Inner {
                backend,
                store,
                reconciler,
                config,
                shared: Mutex::new(Shared {
                    model,
                    session: SessionIdentity::guest(),
                    epoch: 0,
                    seq: 0,
                    debounce: DebounceState::default(),
                }),
                changed,
            }),
        }
    }

    /// Subscribe to cart snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.inner.changed.subscribe()
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.inner.changed.borrow().clone()
    }

    /// Add one unit of a product.
    ///
    /// Applied optimistically; the write-back is debounced. While anonymous
    /// the mutation is retained only in the session store.
    ///
    /// # Errors
    ///
    /// [`CartError::OutOfStock`] if no line exists and the product has no
    /// stock; [`CartError::StockExceeded`] if the line is at its ceiling.
    /// Both are purely local: no network request is made.
    pub fn increment(&self, product: &ProductRef) -> Result<(), CartError> {
        let armed = {
            let mut shared = self.lock();
            let before = shared.model.clone();
            let stock = self.inner.backend.product_stock(product.id).unwrap_or(0);
            shared.model.increment(*product, stock)?;
            self.commit(&mut shared, before)
        };
        self.spawn_sleeper(armed);
        Ok(())
    }

    /// Remove one unit of a product; at quantity 1 the line disappears.
    pub fn decrement(&self, product_id: ProductId) {
        let armed = {
            let mut shared = self.lock();
            let before = shared.model.clone();
            if !shared.model.decrement(product_id) {
                return;
            }
            self.commit(&mut shared, before)
        };
        self.spawn_sleeper(armed);
    }

    /// Remove a line entirely.
    pub fn remove(&self, product_id: ProductId) {
        let armed = {
            let mut shared = self.lock();
            let before = shared.model.clone();
            if !shared.model.remove(product_id) {
                return;
            }
            self.commit(&mut shared, before)
        };
        self.spawn_sleeper(armed);
    }

    /// Empty the cart, e.g. after checkout. The empty cart is written back so
    /// the server copy is emptied too.
    pub fn clear(&self) {
        let armed = {
            let mut shared = self.lock();
            if shared.model.is_empty() {
                return;
            }
            let before = shared.model.clone();
            shared.model.clear();
            self.commit(&mut shared, before)
        };
        self.spawn_sleeper(armed);
    }

    /// Watch `rx` for session transitions and run the reset handler on each.
    ///
    /// If the session is already authenticated when the watcher starts, one
    /// hydration runs immediately.
    pub fn spawn_session_watcher(
        &self,
        mut rx: watch::Receiver<SessionIdentity>,
    ) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let initial = rx.borrow_and_update().clone();
            let mut was_authenticated = initial.is_authenticated;
            engine.lock().session = initial;
            if was_authenticated {
                engine.handle_login().await;
            }

            while rx.changed().await.is_ok() {
                let identity = rx.borrow_and_update().clone();
                let is_authenticated = identity.is_authenticated;
                engine.lock().session = identity;
                if is_authenticated == was_authenticated {
                    // Credential rotation without a boundary crossing.
                    continue;
                }
                was_authenticated = is_authenticated;
                if is_authenticated {
                    engine.handle_login().await;
                } else {
                    engine.handle_logout();
                }
            }
        })
    }

    /// Guest -> Authenticated: one fetch of the authoritative cart, merged
    /// with the local cart, including mutations applied while the fetch was
    /// in flight.
    ///
    /// Merge policy: the server line wins for products on both sides;
    /// local-only lines are appended and then written back, so guest
    /// mutations are retained rather than discarded.
    #[instrument(skip(self))]
    async fn handle_login(&self) {
        let epoch = {
            let mut shared = self.lock();
            shared.epoch += 1;
            shared.debounce.cancel();
            shared.epoch
        };

        let fetched = self.inner.backend.fetch_cart().await;

        let armed = {
            let mut shared = self.lock();
            if shared.epoch != epoch {
                tracing::debug!("Discarding cart hydration from a previous session");
                return;
            }
            match fetched {
                Ok(mut server) => {
                    // Merge against the model as it is now, not as it was
                    // when the fetch was issued: a mutation applied while
                    // the fetch was in flight must survive hydration.
                    let local = std::mem::take(&mut shared.model);
                    // The fetched cart is the confirmed state: a failed
                    // write-back of the merge rolls back to it, not to the
                    // local cart.
                    let confirmed = server.clone();
                    let appended = server.merge_guest_lines(&local);
                    shared.model = server;
                    // Any window armed by a mid-fetch mutation carries a
                    // pre-hydration rollback target; reopen it on the
                    // confirmed state.
                    shared.debounce.cancel();
                    let armed = self.commit(&mut shared, confirmed);
                    if appended {
                        armed
                    } else {
                        // Server already matches; nothing to write back.
                        shared.debounce.cancel();
                        None
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Cart hydration failed, keeping local state");
                    self.inner.reconciler.events().publish(event_for_failure(&e));
                    None
                }
            }
        };
        self.spawn_sleeper(armed);
    }

    /// Authenticated -> Guest: tear down without flushing. The credential is
    /// gone, so a trailing write would fail authentication anyway.
    fn handle_logout(&self) {
        let mut shared = self.lock();
        shared.epoch += 1;
        shared.debounce.cancel();
        shared.model.clear();
        shared.seq += 1;
        self.inner.store.remove(keys::CART);
        self.inner
            .changed
            .send_replace(CartSnapshot::of(&shared.model));
    }

    /// Record a completed mutation: bump the sequence marker, mirror to the
    /// session store, publish the snapshot, and - while authenticated - arm
    /// the debounce window. Returns the sleeper parameters to spawn with.
    fn commit(&self, shared: &mut Shared, before: CartModel) -> Option<(u64, u64)> {
        shared.seq += 1;
        store::write_json(
            self.inner.store.as_ref(),
            keys::CART,
            &shared.model.to_lines(),
        );
        self.inner
            .changed
            .send_replace(CartSnapshot::of(&shared.model));

        if shared.session.is_authenticated {
            let epoch = shared.epoch;
            let generation = shared.debounce.arm(move || before);
            Some((generation, epoch))
        } else {
            None
        }
    }

    /// Spawn the sleeper that flushes after the quiet period. Must not be
    /// called while holding the lock.
    fn spawn_sleeper(&self, armed: Option<(u64, u64)>) {
        let Some((generation, epoch)) = armed else {
            return;
        };
        let engine = self.clone();
        // Anchor the quiet period at the mutation, not at the sleeper's first
        // poll: under the paused test clock the two can differ.
        let deadline = tokio::time::Instant::now() + self.inner.config.quiet_period;
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            engine.flush(generation, epoch).await;
        });
        self.lock().debounce.set_sleeper(handle.abort_handle());
    }

    /// Send the full current model, then reconcile the response.
    #[instrument(skip(self))]
    async fn flush(&self, generation: u64, epoch: u64) {
        let (model, seq) = {
            let shared = self.lock();
            if !shared.debounce.is_current(generation) || shared.epoch != epoch {
                // Superseded while sleeping; the newer sleeper will send.
                return;
            }
            (shared.model.clone(), shared.seq)
        };

        let result = self.inner.backend.replace_cart(model.clone()).await;

        let mut shared = self.lock();
        let current_epoch = shared.epoch;
        let remutated = shared.seq != seq;
        let target = shared.debounce.rollback_target().cloned();
        let shared_ref = &mut *shared;
        let outcome = self.inner.reconciler.resolve(
            "cart write-back",
            epoch,
            current_epoch,
            remutated,
            &result,
            || {
                if let Some(target) = target {
                    shared_ref.model = target;
                }
            },
        );

        match outcome {
            WriteBackOutcome::Confirmed => {
                shared.debounce.confirm(generation, &model);
            }
            WriteBackOutcome::RolledBack => {
                shared.seq += 1;
                shared.debounce.reset();
                store::write_json(
                    self.inner.store.as_ref(),
                    keys::CART,
                    &shared.model.to_lines(),
                );
                self.inner
                    .changed
                    .send_replace(CartSnapshot::of(&shared.model));
            }
            WriteBackOutcome::Superseded | WriteBackOutcome::Stale => {}
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner
            .shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
