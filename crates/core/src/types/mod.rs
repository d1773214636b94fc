//! Core types for Seaglass.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod identity;
pub mod price;
pub mod status;

pub use id::*;
pub use identity::{Customizations, LineItemKey};
pub use price::{CurrencyCode, Money};
pub use status::StockStatus;
