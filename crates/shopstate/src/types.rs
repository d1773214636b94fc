//! Domain types shared across the shop-state managers.

use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use seaglass_core::{CurrencyCode, UserId};

use crate::items::LineItemCollection;

/// Derived cart totals.
///
/// Always recomputed from the line items after a mutation via
/// [`crate::totals::compute_totals`] - never edited independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CartTotals {
    /// Sum of quantities across all lines.
    pub total_items: u32,
    /// Sum of price x quantity across all lines.
    pub subtotal: Decimal,
    /// Flat-rate tax on the subtotal.
    pub tax: Decimal,
    /// Zero at or above the free-shipping threshold, flat fee below.
    pub shipping: Decimal,
    /// subtotal + tax + shipping.
    pub total: Decimal,
    /// Currency all amounts are denominated in.
    pub currency: CurrencyCode,
}

/// A cart snapshot: line items plus derived totals.
///
/// This is the value published to subscribers and persisted to storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// Line items in insertion order.
    pub lines: LineItemCollection,
    /// Totals derived from `lines`.
    pub totals: CartTotals,
}

impl Cart {
    /// Whether the cart has no line items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// An authenticated user identity handed in by the auth module.
///
/// The credential is opaque to this crate: it is attached to remote calls
/// as a bearer token and never inspected, refreshed, or persisted here.
///
/// Implements `Debug` manually to redact the credential.
#[derive(Clone)]
pub struct Identity {
    /// Signed-in user this session belongs to.
    pub user_id: UserId,
    /// Bearer credential for remote calls.
    pub access_token: SecretString,
}

impl Identity {
    /// Create an identity from a user ID and bearer credential.
    #[must_use]
    pub fn new(user_id: impl Into<UserId>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: SecretString::from(access_token.into()),
        }
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}
