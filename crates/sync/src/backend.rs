//! Remote persistence contracts.
//!
//! The engine never talks to the network directly; it is generic over these
//! traits. Production wires them to the HTTP client (which attaches the
//! session credential itself); tests wire them to in-process mocks.
//!
//! Write operations are full-state or per-id replacements, never deltas, so
//! retrying a request that actually succeeded leaves the server unchanged.

use std::future::Future;

use clementine_core::{CartModel, LikedSet, ProductId};
use thiserror::Error;

/// Errors from remote collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Transport-level failure: timeout, connection refused, 5xx.
    #[error("network error: {0}")]
    Network(String),

    /// The server rejected the payload, e.g. a product left the catalog or
    /// server-side stock changed between optimistic apply and confirmation.
    #[error("rejected by server: {0}")]
    Validation(String),

    /// The session credential was rejected; the session expired mid-mutation.
    #[error("authentication failed")]
    Unauthorized,
}

/// Full-state remote persistence for the cart.
pub trait CartBackend: Send + Sync + 'static {
    /// Fetch the authoritative cart for the current session.
    fn fetch_cart(&self) -> impl Future<Output = Result<CartModel, RemoteError>> + Send;

    /// Replace the server-side cart with `cart` wholesale.
    ///
    /// This is a full-state replacement, not a delta: applying the same
    /// payload twice leaves the server state identical to applying it once.
    fn replace_cart(
        &self,
        cart: CartModel,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

/// Per-id remote persistence for likes.
pub trait LikesBackend: Send + Sync + 'static {
    /// Fetch the authoritative liked set for the current session.
    fn fetch_liked(&self) -> impl Future<Output = Result<LikedSet, RemoteError>> + Send;

    /// Set the liked state for one product. Idempotent.
    fn set_liked(
        &self,
        product_id: ProductId,
        liked: bool,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

/// Read-only stock lookup, used to populate a line's stock ceiling when it is
/// created.
///
/// This is synchronous by design: mutation application never suspends, so the
/// implementation must answer from data it already holds (the product catalog
/// the view is rendering from).
pub trait StockSource: Send + Sync + 'static {
    /// Units in stock, or `None` if the product is unknown.
    fn product_stock(&self, product_id: ProductId) -> Option<u32>;
}
