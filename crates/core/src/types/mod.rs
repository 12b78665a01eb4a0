//! Core types for Clementine.
//!
//! This module provides type-safe wrappers for common domain concepts and the
//! pure cart/likes data model the synchronization engine operates on.

pub mod cart;
pub mod id;
pub mod likes;
pub mod price;
pub mod session;

pub use cart::{CartError, CartLine, CartModel, ProductRef};
pub use id::*;
pub use likes::LikedSet;
pub use price::{CurrencyCode, Price};
pub use session::{SessionIdentity, SessionToken};
