//! Unified error type for shop-state operations.
//!
//! Storage failures never reach this type - they are absorbed and logged at
//! the storage adapter boundary. Remote failures propagate exactly one level,
//! to the caller of the mutating operation, as a typed error.

use thiserror::Error;

use crate::remote::RemoteError;

/// Errors surfaced to callers of cart/wishlist operations.
#[derive(Debug, Error)]
pub enum ShopStateError {
    /// The remote authority rejected or failed the operation.
    ///
    /// In-memory state is unchanged; the previous snapshot remains
    /// queryable through the hub.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),
}

/// Result type alias for `ShopStateError`.
pub type Result<T> = std::result::Result<T, ShopStateError>;
