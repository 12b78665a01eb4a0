//! Clementine Core - Shared types library.
//!
//! This crate provides common types used across all Clementine components:
//! - `sync` - Client-side optimistic state synchronization engine
//! - host view code that embeds the engine
//!
//! # Architecture
//!
//! The core crate contains only types and pure model logic - no I/O, no
//! timers, no network clients. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, and the cart/likes data model

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
