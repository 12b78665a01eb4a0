//! Clementine Sync - client-side optimistic state synchronization.
//!
//! Keeps the shopping cart and the liked-products set consistent across three
//! sources of truth: the in-memory model, the persisted session store, and
//! the remote authoritative backend, while the user mutates state through
//! rapid independent UI actions.
//!
//! # Architecture
//!
//! - Mutations apply to the in-memory model immediately (optimistically) and
//!   recompute derived totals synchronously; subscribers always read the
//!   latest optimistic value.
//! - Cart write-backs are debounced: rapid mutations coalesce into one
//!   full-model replacement after a quiet period. Like/unlike toggles bypass
//!   the debounce and are sent immediately per id.
//! - On write-back failure the pre-mutation snapshot is restored and a
//!   [`SyncEvent`] is published; the backend is always authoritative.
//! - Login/logout transitions re-hydrate or tear down state exactly once;
//!   responses that cross a session boundary are discarded by epoch tag.
//!
//! # Example
//!
//! ```rust,ignore
//! let events = EventBus::new();
//! let session = SessionHandle::new();
//! let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
//!
//! let cart = CartSyncEngine::new(
//!     backend,
//!     Arc::clone(&store),
//!     Reconciler::new(events.clone()),
//!     SyncConfig::default(),
//! );
//! cart.spawn_session_watcher(session.subscribe());
//!
//! cart.increment(&ProductRef { id, unit_price })?;   // applied instantly
//! // ...one replace_cart() fires after the quiet period
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod cart;
pub mod config;
pub mod debounce;
pub mod events;
pub mod likes;
pub mod reconcile;
pub mod session;
pub mod store;

pub use backend::{CartBackend, LikesBackend, RemoteError, StockSource};
pub use cart::{CartSnapshot, CartSyncEngine};
pub use config::SyncConfig;
pub use events::{EventBus, SyncEvent};
pub use likes::LikesSyncEngine;
pub use reconcile::{Reconciler, WriteBackOutcome};
pub use session::SessionHandle;
pub use store::{MemoryStore, SessionStore};
