//! The liked-products set.
//!
//! Membership is binary and idempotent: liking an already-liked product is a
//! no-op. Like the cart, this is a pure model; persistence and per-id
//! write-back live in `clementine-sync`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::id::ProductId;

/// The set of product ids the user has liked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LikedSet {
    ids: HashSet<ProductId>,
}

impl LikedSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from a list of ids.
    #[must_use]
    pub fn from_ids(ids: impl IntoIterator<Item = ProductId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    /// Whether a product is liked.
    #[must_use]
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.ids.contains(&product_id)
    }

    /// Number of liked products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no products are liked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Flip membership for a product. Returns the new membership state.
    pub fn toggle(&mut self, product_id: ProductId) -> bool {
        if self.ids.remove(&product_id) {
            false
        } else {
            self.ids.insert(product_id);
            true
        }
    }

    /// Force membership to a specific state, e.g. when reverting a failed
    /// toggle. Idempotent.
    pub fn set(&mut self, product_id: ProductId, liked: bool) {
        if liked {
            self.ids.insert(product_id);
        } else {
            self.ids.remove(&product_id);
        }
    }

    /// Remove all ids.
    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// The ids present in `other` but not in `self`.
    #[must_use]
    pub fn missing_from(&self, other: &Self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = other.ids.difference(&self.ids).copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Add every id from `other`.
    pub fn union_with(&mut self, other: &Self) {
        self.ids.extend(other.ids.iter().copied());
    }

    /// Snapshot the ids, sorted for stable output.
    #[must_use]
    pub fn to_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = self.ids.iter().copied().collect();
        ids.sort_unstable();
        ids
    }
}
