//! The shopping cart data model.
//!
//! [`CartModel`] is a pure in-memory model: every mutation runs to completion
//! synchronously and enforces the stock invariants before applying anything.
//! Persistence and write-back live in the `clementine-sync` crate; this module
//! has no I/O.
//!
//! # Invariants
//!
//! - `1 <= quantity <= stock_ceiling` for every line, at all times.
//! - A quantity of zero is represented by the line being absent; zero-quantity
//!   lines are never stored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::id::ProductId;
use crate::types::price::{CurrencyCode, Price};

/// Errors from cart mutations, detected locally before any network activity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// The line is already at its stock ceiling.
    #[error("cannot add more of product {product_id}: only {stock_ceiling} in stock")]
    StockExceeded {
        product_id: ProductId,
        stock_ceiling: u32,
    },

    /// The product has no stock at all, so no line can be created.
    #[error("product {product_id} is out of stock")]
    OutOfStock { product_id: ProductId },
}

/// The product data a caller must supply when adding a line.
///
/// The cart does not own product data; the view layer already holds the
/// product it is rendering, so it passes the id and unit price through. The
/// stock ceiling comes from a `StockSource` lookup at line creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductRef {
    /// Product being added.
    pub id: ProductId,
    /// Unit price at the time of the add.
    pub unit_price: Price,
}

/// A single cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Product this line refers to.
    pub product_id: ProductId,
    /// Units of the product in the cart. Always `>= 1`.
    pub quantity: u32,
    /// Unit price when the line was created.
    pub unit_price: Price,
    /// Maximum purchasable quantity, from inventory data.
    pub stock_ceiling: u32,
}

impl CartLine {
    /// The total price for this line.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.line_total(self.quantity)
    }
}

/// The shopping cart: an unordered mapping from product to cart line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartModel {
    lines: HashMap<ProductId, CartLine>,
}

impl CartModel {
    /// Create an empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cart from a list of lines, e.g. a backend response or a
    /// session-store mirror. Later duplicates of a product replace earlier
    /// ones; lines violating the quantity invariants are dropped.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Self {
        let lines = lines
            .into_iter()
            .filter(|line| line.quantity >= 1 && line.quantity <= line.stock_ceiling)
            .map(|line| (line.product_id, line))
            .collect();
        Self { lines }
    }

    /// Snapshot the lines, ordered by product id for stable output.
    #[must_use]
    pub fn to_lines(&self) -> Vec<CartLine> {
        let mut lines: Vec<CartLine> = self.lines.values().cloned().collect();
        lines.sort_by_key(|line| line.product_id);
        lines
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct products in the cart.
    #[must_use]
    pub fn num_lines(&self) -> usize {
        self.lines.len()
    }

    /// Look up the line for a product.
    #[must_use]
    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.get(&product_id)
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.lines.values().map(|line| line.quantity).sum()
    }

    /// Total price across all lines.
    ///
    /// Assumes a single-currency storefront: the currency is taken from any
    /// line, or the default currency for an empty cart.
    #[must_use]
    pub fn total(&self) -> Price {
        let currency = self
            .lines
            .values()
            .next()
            .map_or_else(CurrencyCode::default, |line| line.unit_price.currency_code);
        let amount = self
            .lines
            .values()
            .map(|line| line.line_total().amount)
            .sum();
        Price::new(amount, currency)
    }

    /// Add one unit of a product.
    ///
    /// Creates the line with quantity 1 if absent (rejecting with
    /// [`CartError::OutOfStock`] when `stock_ceiling` is 0), otherwise
    /// increments, rejecting with [`CartError::StockExceeded`] at the ceiling.
    /// Nothing is applied on rejection.
    ///
    /// # Errors
    ///
    /// Returns `OutOfStock` or `StockExceeded` as above.
    pub fn increment(
        &mut self,
        product: ProductRef,
        stock_ceiling: u32,
    ) -> Result<(), CartError> {
        match self.lines.get_mut(&product.id) {
            Some(line) => {
                if line.quantity >= line.stock_ceiling {
                    return Err(CartError::StockExceeded {
                        product_id: product.id,
                        stock_ceiling: line.stock_ceiling,
                    });
                }
                line.quantity += 1;
                Ok(())
            }
            None => {
                if stock_ceiling == 0 {
                    return Err(CartError::OutOfStock {
                        product_id: product.id,
                    });
                }
                self.lines.insert(
                    product.id,
                    CartLine {
                        product_id: product.id,
                        quantity: 1,
                        unit_price: product.unit_price,
                        stock_ceiling,
                    },
                );
                Ok(())
            }
        }
    }

    /// Remove one unit of a product. At quantity 1 the line is removed
    /// entirely; zero-quantity lines never exist.
    ///
    /// Returns `true` if the cart changed.
    pub fn decrement(&mut self, product_id: ProductId) -> bool {
        match self.lines.get_mut(&product_id) {
            Some(line) if line.quantity > 1 => {
                line.quantity -= 1;
                true
            }
            Some(_) => {
                self.lines.remove(&product_id);
                true
            }
            None => false,
        }
    }

    /// Remove a line entirely, regardless of quantity.
    ///
    /// Returns `true` if the cart changed.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        self.lines.remove(&product_id).is_some()
    }

    /// Remove all lines.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Merge lines accumulated by a guest into this (server-fetched) cart.
    ///
    /// The server is authoritative: for products present on both sides the
    /// server line wins. Guest-only lines are appended, capped at their stock
    /// ceiling. Returns `true` if anything was appended, i.e. the merged cart
    /// differs from what the server already had.
    pub fn merge_guest_lines(&mut self, guest: &Self) -> bool {
        let mut changed = false;
        for line in guest.lines.values() {
            if self.lines.contains_key(&line.product_id) {
                continue;
            }
            let mut line = line.clone();
            line.quantity = line.quantity.min(line.stock_ceiling);
            if line.quantity == 0 {
                continue;
            }
            self.lines.insert(line.product_id, line);
            changed = true;
        }
        changed
    }
}
