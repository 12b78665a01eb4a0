//! Cart synchronization scenarios: debounce coalescing, rollback, and the
//! stock-ceiling invariants, all under the paused test clock.

use std::sync::Arc;
use std::time::Duration;

use clementine_core::{
    CartError, CartLine, CartModel, CurrencyCode, Price, ProductId, ProductRef, SessionToken,
};
use clementine_integration_tests::{MockBackend, settle};
use clementine_sync::store::keys;
use clementine_sync::{
    CartSyncEngine, EventBus, MemoryStore, Reconciler, RemoteError, SessionHandle, SessionStore,
    SyncConfig, SyncEvent,
};
use rust_decimal::Decimal;

fn usd(cents: i64) -> Price {
    Price::new(Decimal::new(cents, 2), CurrencyCode::USD)
}

fn product(id: i32) -> ProductRef {
    ProductRef {
        id: ProductId::new(id),
        unit_price: usd(10_00),
    }
}

fn cart_line(id: i32, quantity: u32, stock_ceiling: u32) -> CartLine {
    CartLine {
        product_id: ProductId::new(id),
        quantity,
        unit_price: usd(10_00),
        stock_ceiling,
    }
}

struct Harness {
    backend: MockBackend,
    engine: CartSyncEngine<MockBackend>,
    session: SessionHandle,
    events: EventBus,
    store: Arc<MemoryStore>,
}

fn harness() -> Harness {
    let backend = MockBackend::new();
    let store = Arc::new(MemoryStore::new());
    let events = EventBus::new();
    let session = SessionHandle::new();
    let engine = CartSyncEngine::new(
        backend.clone(),
        Arc::clone(&store) as Arc<dyn SessionStore>,
        Reconciler::new(events.clone()),
        SyncConfig::default(),
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
async fn test_debounce_coalesces_rapid_mutations() {
    let harness = harness();
    harness.backend.set_stock(ProductId::new(7), 5);
    login(&harness).await;

    // M1 at t=0, M2 at t=200ms, quiet period 800ms
    harness.engine.increment(&product(7)).unwrap();
    tokio::time::advance(Duration::from_millis(200)).await;
    harness.engine.increment(&product(7)).unwrap();

    // t=990ms: M1's timer (t=800) was superseded, M2's (t=1000) not yet due
    tokio::time::advance(Duration::from_millis(790)).await;
    settle().await;
    assert_eq!(harness.backend.replace_cart_calls(), 0);

    // t=1010ms: exactly one write-back, carrying the state after M2
    tokio::time::advance(Duration::from_millis(20)).await;
    settle().await;
    assert_eq!(harness.backend.replace_cart_calls(), 1);
    assert_eq!(
        harness
            .backend
            .server_cart()
            .line(ProductId::new(7))
            .map(|line| line.quantity),
        Some(2)
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_write_back_rolls_back_with_one_notification() {
    let harness = harness();
    harness
        .backend
        .seed_cart(CartModel::from_lines([cart_line(5, 2, 10)]));
    harness.backend.set_stock(ProductId::new(5), 10);
    login(&harness).await;
    assert_eq!(harness.engine.snapshot().count, 2);

    let mut events = harness.events.subscribe();
    harness
        .backend
        .fail_next_replace_cart(RemoteError::Network("connection reset".to_string()));

    harness.engine.increment(&product(5)).unwrap();
    assert_eq!(harness.engine.snapshot().count, 3); // optimistic

    tokio::time::advance(Duration::from_millis(810)).await;
    settle().await;

    // Rolled back to the pre-mutation snapshot
    assert_eq!(harness.engine.snapshot().count, 2);
    assert_eq!(
        events.try_recv().unwrap(),
        SyncEvent::WriteBackFailed {
            detail: "connection reset".to_string()
        }
    );
    assert!(events.try_recv().is_err(), "exactly one notification");
}

#[tokio::test(start_paused = true)]
async fn test_validation_rejection_rolls_back() {
    let harness = harness();
    harness.backend.set_stock(ProductId::new(7), 5);
    login(&harness).await;

    let mut events = harness.events.subscribe();
    harness
        .backend
        .fail_next_replace_cart(RemoteError::Validation("product removed".to_string()));

    harness.engine.increment(&product(7)).unwrap();
    tokio::time::advance(Duration::from_millis(810)).await;
    settle().await;

    assert!(harness.engine.snapshot().lines.is_empty());
    assert_eq!(
        events.try_recv().unwrap(),
        SyncEvent::ValidationRejected {
            detail: "product removed".to_string()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_stock_ceiling_rejection_makes_no_network_call() {
    let harness = harness();
    harness
        .backend
        .seed_cart(CartModel::from_lines([cart_line(5, 3, 3)]));
    harness.backend.set_stock(ProductId::new(5), 3);
    login(&harness).await;

    let mut events = harness.events.subscribe();
    assert_eq!(
        harness.engine.increment(&product(5)),
        Err(CartError::StockExceeded {
            product_id: ProductId::new(5),
            stock_ceiling: 3
        })
    );

    // Model unchanged, nothing scheduled, nothing sent
    assert_eq!(harness.engine.snapshot().count, 3);
    tokio::time::advance(Duration::from_secs(2)).await;
    settle().await;
    assert_eq!(harness.backend.replace_cart_calls(), 0);
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_out_of_stock_rejection_creates_no_line() {
    let harness = harness();
    harness.backend.set_stock(ProductId::new(9), 0);
    login(&harness).await;

    assert_eq!(
        harness.engine.increment(&product(9)),
        Err(CartError::OutOfStock {
            product_id: ProductId::new(9)
        })
    );
    assert!(harness.engine.snapshot().lines.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_repeated_full_state_write_back_is_idempotent() {
    let harness = harness();
    harness.backend.set_stock(ProductId::new(7), 5);
    login(&harness).await;

    harness.engine.increment(&product(7)).unwrap();
    tokio::time::advance(Duration::from_millis(810)).await;
    settle().await;
    assert_eq!(harness.backend.replace_cart_calls(), 1);
    let after_once = harness.backend.server_cart();

    // Mutations that cancel out make the engine send the identical payload
    // again; the full-state replacement must leave the server unchanged
    harness.engine.decrement(ProductId::new(7));
    harness.engine.increment(&product(7)).unwrap();
    tokio::time::advance(Duration::from_millis(810)).await;
    settle().await;

    assert_eq!(harness.backend.replace_cart_calls(), 2);
    assert_eq!(harness.backend.server_cart(), after_once);
}

#[tokio::test(start_paused = true)]
async fn test_clear_empties_server_cart() {
    let harness = harness();
    harness
        .backend
        .seed_cart(CartModel::from_lines([cart_line(5, 2, 10)]));
    login(&harness).await;

    harness.engine.clear();
    assert!(harness.engine.snapshot().lines.is_empty());

    tokio::time::advance(Duration::from_millis(810)).await;
    settle().await;
    assert!(harness.backend.server_cart().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rollback_mirrors_to_session_store() {
    let harness = harness();
    harness.backend.set_stock(ProductId::new(7), 5);
    login(&harness).await;

    harness
        .backend
        .fail_next_replace_cart(RemoteError::Network("offline".to_string()));
    harness.engine.increment(&product(7)).unwrap();
    tokio::time::advance(Duration::from_millis(810)).await;
    settle().await;

    // The mirror reflects the rolled-back (empty) model, not the optimistic one
    let mirror = harness.store.get(keys::CART).unwrap();
    assert_eq!(mirror, "[]");
}
