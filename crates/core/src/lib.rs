//! Seaglass Core - Shared types library.
//!
//! This crate provides common types used across all Seaglass components:
//! - `shopstate` - Cart and wishlist state manager
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients,
//! no storage access. This keeps it lightweight and allows it to be used
//! anywhere, including contexts without an async runtime.
//!
//! # Modules
//!
//! - [`types`] - Type-safe money, IDs, line-item identity, and stock status

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
