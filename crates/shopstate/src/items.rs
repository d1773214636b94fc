//! Pure in-memory line-item collection.
//!
//! No I/O and no derived totals here - this module only maintains the
//! identity invariant: at most one line item per [`LineItemKey`], with
//! quantity merged on repeated adds. Insertion order is preserved for
//! display but carries no correctness weight.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use seaglass_core::LineItemKey;

/// Display attributes carried alongside a line item.
///
/// These may refresh when the same identity is added again (the catalog may
/// have updated the name, price, or image since the first add).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemAttrs {
    /// Product display name.
    pub name: String,
    /// Unit price in the cart's currency.
    pub unit_price: Decimal,
    /// Product image URL, if any.
    pub image_url: Option<String>,
}

/// A single cart line: identity, display attributes, and quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Identity of this line within the collection.
    pub key: LineItemKey,
    /// Product display name.
    pub name: String,
    /// Unit price in the cart's currency.
    pub unit_price: Decimal,
    /// Number of units. Always >= 1; a quantity of zero is a removal.
    pub quantity: u32,
    /// Product image URL, if any.
    pub image_url: Option<String>,
}

impl LineItem {
    /// Build a line item from an identity, quantity, and display attributes.
    ///
    /// Quantity is floored to 1: a line item cannot exist with zero units.
    #[must_use]
    pub fn new(key: LineItemKey, quantity: u32, attrs: LineItemAttrs) -> Self {
        Self {
            key,
            name: attrs.name,
            unit_price: attrs.unit_price,
            quantity: quantity.max(1),
            image_url: attrs.image_url,
        }
    }

    fn refresh_attrs(&mut self, attrs: LineItemAttrs) {
        self.name = attrs.name;
        self.unit_price = attrs.unit_price;
        self.image_url = attrs.image_url;
    }
}

/// An insertion-ordered collection of line items, unique by identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineItemCollection(Vec<LineItem>);

impl LineItemCollection {
    /// Create an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Number of distinct line items (not total units).
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the collection has no line items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over line items in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, LineItem> {
        self.0.iter()
    }

    /// Sum of quantities across all line items.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.0.iter().map(|line| line.quantity).sum()
    }

    /// Find a line item by identity.
    #[must_use]
    pub fn find(&self, key: &LineItemKey) -> Option<&LineItem> {
        self.0.iter().find(|line| &line.key == key)
    }

    /// Insert a new line item or increase the quantity of an existing one.
    ///
    /// For an existing identity the quantity increases by `delta` and the
    /// display attributes refresh to the latest supplied values. For a new
    /// identity a line is inserted with quantity `max(delta, 1)`.
    pub fn upsert(&mut self, key: LineItemKey, delta: u32, attrs: LineItemAttrs) {
        if let Some(line) = self.0.iter_mut().find(|line| line.key == key) {
            line.quantity = line.quantity.saturating_add(delta);
            line.refresh_attrs(attrs);
        } else {
            self.0.push(LineItem::new(key, delta, attrs));
        }
    }

    /// Replace the quantity of a line item exactly (not additive).
    ///
    /// A quantity <= 0 is equivalent to [`Self::remove`]. Setting a quantity
    /// on an absent identity is a no-op.
    pub fn set_quantity(&mut self, key: &LineItemKey, quantity: i64) {
        let Ok(quantity) = u32::try_from(quantity) else {
            // Negative: normalize to removal
            self.remove(key);
            return;
        };
        if quantity == 0 {
            self.remove(key);
        } else if let Some(line) = self.0.iter_mut().find(|line| &line.key == key) {
            line.quantity = quantity;
        }
    }

    /// Remove a line item by identity. A no-op (not an error) if absent.
    pub fn remove(&mut self, key: &LineItemKey) {
        self.0.retain(|line| &line.key != key);
    }

    /// Remove all line items.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Union two collections by identity, summing quantities for matching
    /// keys.
    ///
    /// Lines already present keep their position; their display attributes
    /// refresh from `other` (the latest supplied values win). Identities only
    /// in `other` are appended in `other`'s order. This is the same combine
    /// rule the remote authority applies during a sign-in sync.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        for line in other.0 {
            self.upsert(
                line.key,
                line.quantity,
                LineItemAttrs {
                    name: line.name,
                    unit_price: line.unit_price,
                    image_url: line.image_url,
                },
            );
        }
        self
    }
}

impl IntoIterator for LineItemCollection {
    type Item = LineItem;
    type IntoIter = std::vec::IntoIter<LineItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<LineItem> for LineItemCollection {
    fn from_iter<T: IntoIterator<Item = LineItem>>(iter: T) -> Self {
        let mut collection = Self::new();
        for line in iter {
            collection.upsert(
                line.key,
                line.quantity,
                LineItemAttrs {
                    name: line.name,
                    unit_price: line.unit_price,
                    image_url: line.image_url,
                },
            );
        }
        collection
    }
}
