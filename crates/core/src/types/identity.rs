//! Line-item identity: the tuple that determines uniqueness in a cart or
//! wishlist.
//!
//! Two entries are the same line item when product, color, size, and the
//! customization digest all match. Free-form customization maps are
//! canonicalized through a `BTreeMap` (order-independent) and reduced to a
//! stable SHA-256 digest, so the identity survives serialization and
//! process restarts. The digest is used purely for identity comparison;
//! the map itself is not part of the key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::id::ProductId;

/// A canonicalized, order-independent customization map.
///
/// Backed by a `BTreeMap` so iteration order (and therefore the derived
/// digest) does not depend on insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Customizations(BTreeMap<String, String>);

impl Customizations {
    /// Create an empty customization map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a customization entry, replacing any previous value for the key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Whether the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Derive the stable identity digest for this map.
    ///
    /// Returns `None` for an empty map so that "no customizations" and
    /// "empty customizations" compare equal as identities.
    #[must_use]
    pub fn digest(&self) -> Option<String> {
        if self.0.is_empty() {
            return None;
        }

        let mut hasher = Sha256::new();
        for (key, value) in &self.0 {
            // Length-prefix each field so ("ab","c") and ("a","bc") differ
            hasher.update(key.len().to_le_bytes());
            hasher.update(key.as_bytes());
            hasher.update(value.len().to_le_bytes());
            hasher.update(value.as_bytes());
        }

        let digest = hasher.finalize();
        Some(format!("{digest:x}"))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Customizations {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// The identity of a line item within a cart or wishlist.
///
/// At most one line item per key exists in a collection; adding an existing
/// key increases quantity rather than duplicating the line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineItemKey {
    /// Product this line refers to.
    pub product_id: ProductId,
    /// Selected color variant, if any.
    pub color: Option<String>,
    /// Selected size variant, if any.
    pub size: Option<String>,
    /// Stable digest of the customization map, if any.
    pub customizations_hash: Option<String>,
}

impl LineItemKey {
    /// Create a key for a plain product with no variant options.
    #[must_use]
    pub fn for_product(product_id: impl Into<ProductId>) -> Self {
        Self {
            product_id: product_id.into(),
            color: None,
            size: None,
            customizations_hash: None,
        }
    }

    /// Create a key with variant options and customizations.
    #[must_use]
    pub fn with_options(
        product_id: impl Into<ProductId>,
        color: Option<String>,
        size: Option<String>,
        customizations: &Customizations,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            color,
            size,
            customizations_hash: customizations.digest(),
        }
    }
}

impl std::fmt::Display for LineItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.product_id)?;
        if let Some(color) = &self.color {
            write!(f, "/{color}")?;
        }
        if let Some(size) = &self.size {
            write!(f, "/{size}")?;
        }
        if let Some(hash) = &self.customizations_hash {
            // First 8 hex chars are plenty for log readability
            write!(f, "#{}", &hash[..hash.len().min(8)])?;
        }
        Ok(())
    }
}
