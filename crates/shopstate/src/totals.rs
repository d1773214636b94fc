//! Derived cart totals as a pure function of line items and pricing rules.
//!
//! Per-line amounts are summed unrounded; rounding to currency precision
//! (2 decimals) happens once, on tax and the grand total, so rounding error
//! does not compound across lines.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::PricingConfig;
use crate::items::LineItemCollection;
use crate::types::CartTotals;

/// Compute derived totals for a collection of line items.
///
/// Deterministic: calling this twice on the same items and pricing yields
/// identical output. The free-shipping threshold is inclusive - a subtotal
/// exactly at the threshold ships free.
#[must_use]
pub fn compute_totals(lines: &LineItemCollection, pricing: &PricingConfig) -> CartTotals {
    let total_items = lines.total_quantity();

    let subtotal: Decimal = lines
        .iter()
        .map(|line| line.unit_price * Decimal::from(line.quantity))
        .sum();

    let shipping = if lines.is_empty() || subtotal >= pricing.free_shipping_threshold {
        Decimal::ZERO
    } else {
        pricing.shipping_fee
    };

    let tax = round_currency(subtotal * pricing.tax_rate);
    let total = round_currency(subtotal + tax + shipping);

    CartTotals {
        total_items,
        subtotal: round_currency(subtotal),
        tax,
        shipping,
        total,
        currency: pricing.currency,
    }
}

/// Round to 2 decimal places with half-away-from-zero semantics.
fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
