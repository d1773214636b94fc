//! Status enums for various entities.

use serde::{Deserialize, Serialize};

/// Stock availability for a wishlist entry.
///
/// Wishlists keep items around for a long time, so availability is recorded
/// when the entry is saved and refreshed when the remote authority returns
/// an updated snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    /// Availability has not been checked yet.
    #[default]
    Unknown,
    InStock,
    OutOfStock,
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::InStock => write!(f, "in_stock"),
            Self::OutOfStock => write!(f, "out_of_stock"),
        }
    }
}
