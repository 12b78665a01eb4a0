//! Integration tests for Clementine.
//!
//! The scenarios in `tests/` drive the synchronization engines end to end
//! against [`MockBackend`], an in-process stand-in for the remote store. All
//! timer behavior runs under Tokio's paused test clock, so the suites are
//! deterministic and need no network or external services.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use clementine_core::{CartModel, LikedSet, ProductId};
use clementine_sync::{CartBackend, LikesBackend, RemoteError, StockSource};

/// In-process stand-in for the remote authoritative backend.
///
/// Holds a server-side cart and liked set, records every write, and can be
/// told to fail specific requests. Cheap to clone; all clones share state, so
/// a test keeps one handle for assertions and hands another to the engine.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<MockState>,
}

#[derive(Default)]
struct MockState {
    cart: Mutex<CartModel>,
    liked: Mutex<LikedSet>,
    stock: Mutex<HashMap<ProductId, u32>>,
    replace_cart_calls: AtomicUsize,
    set_liked_calls: Mutex<Vec<(ProductId, bool)>>,
    fail_next_replace_cart: Mutex<Option<RemoteError>>,
    fail_next_fetch_cart: Mutex<Option<RemoteError>>,
    fail_set_liked: Mutex<HashMap<ProductId, RemoteError>>,
    replace_cart_delay: Mutex<Option<Duration>>,
    fetch_cart_delay: Mutex<Option<Duration>>,
    fetch_liked_delay: Mutex<Option<Duration>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockBackend {
    /// A backend with an empty server-side cart and liked set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stock for a product.
    pub fn set_stock(&self, product_id: ProductId, stock: u32) {
        lock(&self.state.stock).insert(product_id, stock);
    }

    /// Seed the server-side cart, as if a previous session had written it.
    pub fn seed_cart(&self, cart: CartModel) {
        *lock(&self.state.cart) = cart;
    }

    /// Seed the server-side liked set.
    pub fn seed_liked(&self, liked: LikedSet) {
        *lock(&self.state.liked) = liked;
    }

    /// The cart the server currently holds.
    #[must_use]
    pub fn server_cart(&self) -> CartModel {
        lock(&self.state.cart).clone()
    }

    /// The liked set the server currently holds.
    #[must_use]
    pub fn server_liked(&self) -> LikedSet {
        lock(&self.state.liked).clone()
    }

    /// Number of `replace_cart` requests received.
    #[must_use]
    pub fn replace_cart_calls(&self) -> usize {
        self.state.replace_cart_calls.load(Ordering::SeqCst)
    }

    /// Every `set_liked` request received, in order.
    #[must_use]
    pub fn set_liked_calls(&self) -> Vec<(ProductId, bool)> {
        lock(&self.state.set_liked_calls).clone()
    }

    /// Fail the next `replace_cart` request with `error`, then recover.
    pub fn fail_next_replace_cart(&self, error: RemoteError) {
        *lock(&self.state.fail_next_replace_cart) = Some(error);
    }

    /// Fail the next `fetch_cart` request with `error`, then recover.
    pub fn fail_next_fetch_cart(&self, error: RemoteError) {
        *lock(&self.state.fail_next_fetch_cart) = Some(error);
    }

    /// Fail every `set_liked` request for `product_id` with `error`.
    pub fn fail_set_liked(&self, product_id: ProductId, error: RemoteError) {
        lock(&self.state.fail_set_liked).insert(product_id, error);
    }

    /// Delay `replace_cart` responses, so a test can interleave a session
    /// transition with an in-flight request under the paused clock.
    pub fn delay_replace_cart(&self, delay: Duration) {
        *lock(&self.state.replace_cart_delay) = Some(delay);
    }

    /// Delay `fetch_cart` responses, so a test can mutate while a hydration
    /// fetch is in flight.
    pub fn delay_fetch_cart(&self, delay: Duration) {
        *lock(&self.state.fetch_cart_delay) = Some(delay);
    }

    /// Delay `fetch_liked` responses.
    pub fn delay_fetch_liked(&self, delay: Duration) {
        *lock(&self.state.fetch_liked_delay) = Some(delay);
    }
}

impl CartBackend for MockBackend {
    async fn fetch_cart(&self) -> Result<CartModel, RemoteError> {
        let delay = *lock(&self.state.fetch_cart_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = lock(&self.state.fail_next_fetch_cart).take() {
            return Err(error);
        }
        Ok(self.server_cart())
    }

    async fn replace_cart(&self, cart: CartModel) -> Result<(), RemoteError> {
        let delay = *lock(&self.state.replace_cart_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.state.replace_cart_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = lock(&self.state.fail_next_replace_cart).take() {
            return Err(error);
        }
        *lock(&self.state.cart) = cart;
        Ok(())
    }
}

impl LikesBackend for MockBackend {
    async fn fetch_liked(&self) -> Result<LikedSet, RemoteError> {
        let delay = *lock(&self.state.fetch_liked_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.server_liked())
    }

    async fn set_liked(&self, product_id: ProductId, liked: bool) -> Result<(), RemoteError> {
        lock(&self.state.set_liked_calls).push((product_id, liked));
        if let Some(error) = lock(&self.state.fail_set_liked).get(&product_id) {
            return Err(error.clone());
        }
        lock(&self.state.liked).set(product_id, liked);
        Ok(())
    }
}

impl StockSource for MockBackend {
    fn product_stock(&self, product_id: ProductId) -> Option<u32> {
        lock(&self.state.stock).get(&product_id).copied()
    }
}

/// Let spawned engine tasks (session watchers, write-backs) run to quiescence
/// on the current-thread test runtime.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
