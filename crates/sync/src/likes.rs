//! The liked-products synchronization engine.
//!
//! Same optimistic pattern as the cart, with two differences: toggles bypass
//! the debounce (likes are idempotent and independent per product, so
//! rapid-fire requests cannot degrade UX the way repeated +/- clicks would),
//! and each product's write-back is in flight and rolled back independently.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use clementine_core::{LikedSet, ProductId, SessionIdentity};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::backend::LikesBackend;
use crate::reconcile::{Reconciler, WriteBackOutcome, event_for_failure};
use crate::store::{self, SessionStore, keys};

/// Mutable engine state, behind one lock. Critical sections never suspend.
struct Shared {
    set: LikedSet,
    session: SessionIdentity,
    /// Bumped on every session transition; in-flight responses carrying an
    /// older epoch are discarded.
    epoch: u64,
}

struct Inner<B> {
    backend: B,
    store: Arc<dyn SessionStore>,
    reconciler: Reconciler,
    shared: Mutex<Shared>,
    changed: watch::Sender<LikedSet>,
}

/// The liked-products synchronization engine.
pub struct LikesSyncEngine<B> {
    inner: Arc<Inner<B>>,
}

impl<B> Clone for LikesSyncEngine<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: LikesBackend> LikesSyncEngine<B> {
    /// Create an engine in the guest state, hydrating from the session-store
    /// mirror if one exists.
    #[must_use]
    pub fn new(backend: B, store: Arc<dyn SessionStore>, reconciler: Reconciler) -> Self {
        let ids: Vec<ProductId> =
            store::read_json(store.as_ref(), keys::LIKED_PRODUCTS).unwrap_or_default();
        let set = LikedSet::from_ids(ids);
        let (changed, _rx) = watch::channel(set.clone());

        Self {
            inner: Arc::new(Inner {
                backend,
                store,
                reconciler,
                shared: Mutex::new(Shared {
                    set,
                    session: SessionIdentity::guest(),
                    epoch: 0,
                }),
                changed,
            }),
        }
    }

    /// Subscribe to liked-set snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LikedSet> {
        self.inner.changed.subscribe()
    }

    /// The current liked set.
    #[must_use]
    pub fn snapshot(&self) -> LikedSet {
        self.inner.changed.borrow().clone()
    }

    /// Whether a product is currently liked.
    #[must_use]
    pub fn is_liked(&self, product_id: ProductId) -> bool {
        self.lock().set.contains(product_id)
    }

    /// Flip a product's liked state.
    ///
    /// Applied optimistically and - while authenticated - sent immediately,
    /// with no debounce. Concurrent toggles on different products do not
    /// interfere with each other's rollback.
    pub fn toggle(&self, product_id: ProductId) {
        let send = {
            let mut shared = self.lock();
            let liked = shared.set.toggle(product_id);
            self.mirror_and_emit(&shared);
            if shared.session.is_authenticated {
                Some((liked, shared.epoch))
            } else {
                None
            }
        };
        if let Some((liked, epoch)) = send {
            self.spawn_set_liked(product_id, liked, epoch);
        }
    }

    /// Watch `rx` for session transitions and run the reset handler on each.
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

    /// Guest -> Authenticated: one fetch of the authoritative set, unioned
    /// with the local likes; ids the server lacks are pushed per id.
    #[instrument(skip(self))]
    async fn handle_login(&self) {
        let epoch = {
            let mut shared = self.lock();
            shared.epoch += 1;
            shared.epoch
        };

        let fetched = self.inner.backend.fetch_liked().await;

        let local_only = {
            let mut shared = self.lock();
            if shared.epoch != epoch {
                tracing::debug!("Discarding likes hydration from a previous session");
                return;
            }
            match fetched {
                Ok(server) => {
                    // Union with the set as it is now, not as it was when
                    // the fetch was issued: a toggle applied while the fetch
                    // was in flight must survive hydration.
                    let local = std::mem::take(&mut shared.set);
                    let local_only = server.missing_from(&local);
                    let mut merged = server;
                    merged.union_with(&local);
                    shared.set = merged;
                    self.mirror_and_emit(&shared);
                    local_only
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Likes hydration failed, keeping local state");
                    self.inner.reconciler.events().publish(event_for_failure(&e));
                    return;
                }
            }
        };

        for product_id in local_only {
            self.spawn_set_liked(product_id, true, epoch);
        }
    }

    /// Authenticated -> Guest: clear everything; in-flight responses are
    /// discarded by epoch.
    fn handle_logout(&self) {
        let mut shared = self.lock();
        shared.epoch += 1;
        shared.set.clear();
        self.inner.store.remove(keys::LIKED_PRODUCTS);
        self.inner.changed.send_replace(shared.set.clone());
    }

    /// Send one per-id write and reconcile the response.
    fn spawn_set_liked(&self, product_id: ProductId, liked: bool, epoch: u64) {
        let engine = self.clone();
        tokio::spawn(async move {
            let result = engine.inner.backend.set_liked(product_id, liked).await;

            let mut shared = engine.lock();
            let current_epoch = shared.epoch;
            // Re-toggled since the request was issued: the model no longer
            // holds the state we sent, so a rollback would clobber it.
            let remutated = shared.set.contains(product_id) != liked;
            let shared_ref = &mut *shared;
            let outcome = engine.inner.reconciler.resolve(
                "like toggle",
                epoch,
                current_epoch,
                remutated,
                &result,
                || shared_ref.set.set(product_id, !liked),
            );
            if outcome == WriteBackOutcome::RolledBack {
                engine.mirror_and_emit(&shared);
            }
        });
    }

    /// Mirror the set to the session store and publish a snapshot.
    fn mirror_and_emit(&self, shared: &Shared) {
        store::write_json(
            self.inner.store.as_ref(),
            keys::LIKED_PRODUCTS,
            &shared.set.to_ids(),
        );
        self.inner.changed.send_replace(shared.set.clone());
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner
            .shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RemoteError;
    use crate::events::EventBus;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct StubBackend {
        set_liked_calls: AtomicUsize,
    }

    impl LikesBackend for StubBackend {
        async fn fetch_liked(&self) -> Result<LikedSet, RemoteError> {
            Ok(LikedSet::new())
        }

        async fn set_liked(&self, _product_id: ProductId, _liked: bool) -> Result<(), RemoteError> {
            self.set_liked_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn engine() -> LikesSyncEngine<StubBackend> {
        LikesSyncEngine::new(
            StubBackend::default(),
            Arc::new(MemoryStore::new()),
            Reconciler::new(EventBus::new()),
        )
    }

    #[tokio::test]
    async fn test_toggle_flips_optimistically() {
        let engine = engine();
        engine.toggle(ProductId::new(5));
        assert!(engine.is_liked(ProductId::new(5)));
        engine.toggle(ProductId::new(5));
        assert!(!engine.is_liked(ProductId::new(5)));
    }

    #[tokio::test]
    async fn test_guest_toggles_send_nothing() {
        let engine = engine();
        engine.toggle(ProductId::new(5));
        tokio::task::yield_now().await;
        assert_eq!(engine.inner.backend.set_liked_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_hydrates_from_store_mirror() {
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        {
            let engine = LikesSyncEngine::new(
                StubBackend::default(),
                Arc::clone(&store),
                Reconciler::new(EventBus::new()),
            );
            engine.toggle(ProductId::new(7));
        }

        let engine = LikesSyncEngine::new(
            StubBackend::default(),
            store,
            Reconciler::new(EventBus::new()),
        );
        assert!(engine.is_liked(ProductId::new(7)));
    }
}
