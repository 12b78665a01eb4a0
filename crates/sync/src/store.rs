//! The local persistent cache.
//!
//! A durable string-keyed store scoped to the browser session, mirroring the
//! in-memory model so guest state survives a reload and authenticated state
//! survives a network outage. Cart and likes use independent keys so a write
//! to one never clobbers the other.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Store keys for engine state.
pub mod keys {
    /// Key for the cart mirror (a JSON array of cart lines).
    pub const CART: &str = "cart";

    /// Key for the liked-products mirror (a JSON array of product ids).
    pub const LIKED_PRODUCTS: &str = "liked_products";
}

/// A durable key/value store scoped to the browser session.
///
/// Implementations must not fail on reads: a missing or unreadable entry is
/// `None`. Writes are fire-and-forget from the engine's point of view.
pub trait SessionStore: Send + Sync {
    /// Read the raw value for a key.
    fn get(&self, key: &str) -> Option<String>;

    /// Write the raw value for a key, replacing any previous value.
    fn put(&self, key: &str, value: String);

    /// Remove a key.
    fn remove(&self, key: &str);
}

/// Read and deserialize a JSON value from the store.
///
/// A corrupt entry is treated as absent: the engine falls back to an empty
/// model rather than failing to start.
pub(crate) fn read_json<T: DeserializeOwned>(store: &dyn SessionStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "Discarding corrupt session-store entry");
            None
        }
    }
}

/// Serialize and write a JSON value to the store.
pub(crate) fn write_json<T: Serialize>(store: &dyn SessionStore, key: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(raw) => store.put(key, raw),
        Err(e) => {
            // Nothing in the model should be unserializable; log and move on.
            tracing::error!(key, error = %e, "Failed to serialize session-store entry");
        }
    }
}

/// An in-memory [`SessionStore`] for hosts without durable storage and for
/// tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn put(&self, key: &str, value: String) {
        self.entries().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.entries().remove(key);
    }
}
