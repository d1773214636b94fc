//! Wire types for the remote cart/wishlist API.
//!
//! These mirror the domain types but are kept separate so the JSON contract
//! (camelCase field names, envelope shapes) can evolve without touching the
//! rest of the crate. Conversions live next to the types they convert.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use seaglass_core::{LineItemKey, ProductId, StockStatus};

use crate::items::{LineItem, LineItemCollection};
use crate::wishlist::{Wishlist, WishlistEntry};

// =============================================================================
// Keys and lines
// =============================================================================

/// Wire form of a line-item identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineKeyWire {
    pub product_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customizations_hash: Option<String>,
}

impl From<&LineItemKey> for LineKeyWire {
    fn from(key: &LineItemKey) -> Self {
        Self {
            product_id: key.product_id.as_str().to_string(),
            color: key.color.clone(),
            size: key.size.clone(),
            customizations_hash: key.customizations_hash.clone(),
        }
    }
}

impl From<LineKeyWire> for LineItemKey {
    fn from(wire: LineKeyWire) -> Self {
        Self {
            product_id: ProductId::new(wire.product_id),
            color: wire.color,
            size: wire.size,
            customizations_hash: wire.customizations_hash,
        }
    }
}

/// Wire form of a cart line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineWire {
    #[serde(flatten)]
    pub key: LineKeyWire,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl From<&LineItem> for CartLineWire {
    fn from(line: &LineItem) -> Self {
        Self {
            key: LineKeyWire::from(&line.key),
            name: line.name.clone(),
            unit_price: line.unit_price,
            quantity: line.quantity,
            image_url: line.image_url.clone(),
        }
    }
}

impl From<CartLineWire> for LineItem {
    fn from(wire: CartLineWire) -> Self {
        Self {
            key: wire.key.into(),
            name: wire.name,
            unit_price: wire.unit_price,
            quantity: wire.quantity.max(1),
            image_url: wire.image_url,
        }
    }
}

/// Response envelope for every cart endpoint: the authoritative
/// post-operation collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartEnvelope {
    pub lines: Vec<CartLineWire>,
}

impl From<CartEnvelope> for LineItemCollection {
    fn from(envelope: CartEnvelope) -> Self {
        envelope.lines.into_iter().map(LineItem::from).collect()
    }
}

// =============================================================================
// Cart requests
// =============================================================================

/// Request body for updating a line's quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuantityRequest {
    pub key: LineKeyWire,
    pub quantity: i64,
}

/// Request body for removing a line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveLineRequest {
    pub key: LineKeyWire,
}

/// Request body for the bulk sign-in sync: the anonymous local lines the
/// server combines into the remote cart (quantities summed per identity).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCartRequest {
    pub lines: Vec<CartLineWire>,
}

impl From<&LineItemCollection> for SyncCartRequest {
    fn from(lines: &LineItemCollection) -> Self {
        Self {
            lines: lines.iter().map(CartLineWire::from).collect(),
        }
    }
}

// =============================================================================
// Wishlist
// =============================================================================

/// Wire form of a wishlist entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistEntryWire {
    #[serde(flatten)]
    pub key: LineKeyWire,
    pub name: String,
    pub unit_price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub stock: StockStatus,
    pub added_at: DateTime<Utc>,
}

impl From<&WishlistEntry> for WishlistEntryWire {
    fn from(entry: &WishlistEntry) -> Self {
        Self {
            key: LineKeyWire::from(&entry.key),
            name: entry.name.clone(),
            unit_price: entry.unit_price,
            image_url: entry.image_url.clone(),
            stock: entry.stock,
            added_at: entry.added_at,
        }
    }
}

impl From<WishlistEntryWire> for WishlistEntry {
    fn from(wire: WishlistEntryWire) -> Self {
        Self {
            key: wire.key.into(),
            name: wire.name,
            unit_price: wire.unit_price,
            image_url: wire.image_url,
            stock: wire.stock,
            added_at: wire.added_at,
        }
    }
}

/// Response envelope for every wishlist endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistEnvelope {
    pub entries: Vec<WishlistEntryWire>,
}

impl From<WishlistEnvelope> for Wishlist {
    fn from(envelope: WishlistEnvelope) -> Self {
        envelope
            .entries
            .into_iter()
            .map(WishlistEntry::from)
            .collect()
    }
}

/// Request body for the bulk wishlist sync on sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncWishlistRequest {
    pub entries: Vec<WishlistEntryWire>,
}

impl From<&Wishlist> for SyncWishlistRequest {
    fn from(wishlist: &Wishlist) -> Self {
        Self {
            entries: wishlist.iter().map(WishlistEntryWire::from).collect(),
        }
    }
}
