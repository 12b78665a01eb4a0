//! Liked-products scenarios: immediate per-id write-backs, independent
//! rollback, and the union merge on login.

use std::sync::Arc;
use std::time::Duration;

use clementine_core::{LikedSet, ProductId, SessionToken};
use clementine_integration_tests::{MockBackend, settle};
use clementine_sync::store::keys;
use clementine_sync::{
    EventBus, LikesSyncEngine, MemoryStore, Reconciler, RemoteError, SessionHandle, SessionStore,
    SyncEvent,
};

struct Harness {
    backend: MockBackend,
    engine: LikesSyncEngine<MockBackend>,
    session: SessionHandle,
    events: EventBus,
    store: Arc<MemoryStore>,
}

fn harness() -> Harness {
    let backend = MockBackend::new();
    let store = Arc::new(MemoryStore::new());
    let events = EventBus::new();
    let session = SessionHandle::new();
    let engine = LikesSyncEngine::new(
        backend.clone(),
        Arc::clone(&store) as Arc<dyn SessionStore>,
        Reconciler::new(events.clone()),
    );
    engine.spawn_session_watcher(session.subscribe());
    Harness {
        backend,
        engine,
        session,
        events,
        store,
    }
}

async fn login(harness: &Harness) {
    harness
        .session
        .login(SessionToken::new("test-token".to_string()));
    settle().await;
}

#[tokio::test(start_paused = true)]
async fn test_toggle_sends_immediately_without_quiet_period() {
    let harness = harness();
    login(&harness).await;

    harness.engine.toggle(ProductId::new(4));
    // No clock advance: likes are not debounced
    settle().await;

    assert_eq!(
        harness.backend.set_liked_calls(),
        vec![(ProductId::new(4), true)]
    );
    assert!(harness.backend.server_liked().contains(ProductId::new(4)));
}

#[tokio::test(start_paused = true)]
async fn test_failed_toggle_reverts_one_id() {
    let harness = harness();
    login(&harness).await;

    let mut events = harness.events.subscribe();
    harness
        .backend
        .fail_set_liked(ProductId::new(5), RemoteError::Network("offline".to_string()));

    harness.engine.toggle(ProductId::new(5));
    assert!(harness.engine.is_liked(ProductId::new(5))); // optimistic
    settle().await;

    assert!(!harness.engine.is_liked(ProductId::new(5)));
    assert!(!harness.backend.server_liked().contains(ProductId::new(5)));
    assert_eq!(
        events.try_recv().unwrap(),
        SyncEvent::WriteBackFailed {
            detail: "offline".to_string()
        }
    );
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_per_id_failures_are_independent() {
    let harness = harness();
    login(&harness).await;
    harness
        .backend
        .fail_set_liked(ProductId::new(5), RemoteError::Network("offline".to_string()));

    harness.engine.toggle(ProductId::new(5));
    harness.engine.toggle(ProductId::new(6));
    settle().await;

    // 5 rolled back, 6 confirmed
    assert!(!harness.engine.is_liked(ProductId::new(5)));
    assert!(harness.engine.is_liked(ProductId::new(6)));
    assert!(harness.backend.server_liked().contains(ProductId::new(6)));
}

#[tokio::test(start_paused = true)]
async fn test_login_unions_guest_likes_and_pushes_them() {
    let harness = harness();
    harness
        .backend
        .seed_liked(LikedSet::from_ids([ProductId::new(5)]));

    // Guest likes product 3 before authenticating
    harness.engine.toggle(ProductId::new(3));
    login(&harness).await;

    assert!(harness.engine.is_liked(ProductId::new(3)));
    assert!(harness.engine.is_liked(ProductId::new(5)));
    // Only the guest-only id is pushed; the server already knows about 5
    assert_eq!(
        harness.backend.set_liked_calls(),
        vec![(ProductId::new(3), true)]
    );
    assert!(harness.backend.server_liked().contains(ProductId::new(3)));
}

#[tokio::test(start_paused = true)]
async fn test_toggle_during_hydration_survives() {
    let harness = harness();
    harness
        .backend
        .seed_liked(LikedSet::from_ids([ProductId::new(5)]));
    harness
        .backend
        .delay_fetch_liked(Duration::from_millis(500));

    harness
        .session
        .login(SessionToken::new("test-token".to_string()));
    settle().await;

    // The hydration fetch is in flight; the user likes a product
    harness.engine.toggle(ProductId::new(3));
    assert!(harness.engine.is_liked(ProductId::new(3)));

    tokio::time::advance(Duration::from_millis(500)).await;
    settle().await;

    // Hydration unioned the fetched set with the newer toggle
    assert!(harness.engine.is_liked(ProductId::new(3)));
    assert!(harness.engine.is_liked(ProductId::new(5)));
    assert!(harness.backend.server_liked().contains(ProductId::new(3)));
}

#[tokio::test(start_paused = true)]
async fn test_logout_clears_set_and_store() {
    let harness = harness();
    harness
        .backend
        .seed_liked(LikedSet::from_ids([ProductId::new(5)]));
    login(&harness).await;
    assert!(harness.engine.is_liked(ProductId::new(5)));

    harness.session.logout();
    settle().await;

    assert!(harness.engine.snapshot().is_empty());
    assert_eq!(harness.store.get(keys::LIKED_PRODUCTS), None);
}

#[tokio::test(start_paused = true)]
async fn test_retoggle_during_flight_suppresses_rollback() {
    let harness = harness();
    login(&harness).await;
    harness
        .backend
        .fail_set_liked(ProductId::new(5), RemoteError::Network("offline".to_string()));

    let mut events = harness.events.subscribe();

    // Like then immediately unlike: when the first (failing) response lands,
    // the model already holds the newer state and must not be clobbered.
    harness.engine.toggle(ProductId::new(5));
    harness.engine.toggle(ProductId::new(5));
    settle().await;

    assert_eq!(harness.backend.set_liked_calls().len(), 2);
    // The first failure is superseded silently; only the second (the unlike,
    // which matches the model) rolls back, restoring the liked state.
    assert!(harness.engine.is_liked(ProductId::new(5)));
    assert_eq!(
        events.try_recv().unwrap(),
        SyncEvent::WriteBackFailed {
            detail: "offline".to_string()
        }
    );
    assert!(events.try_recv().is_err());
}