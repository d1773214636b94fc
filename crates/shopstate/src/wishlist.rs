//! Wishlist collection and reconciliation manager.
//!
//! A wishlist is a presence-only set keyed by the same line-item identity
//! as the cart: no quantities, but each entry carries stock status and the
//! time it was added. The manager follows the same two-state reconciliation
//! contract as [`crate::manager::CartManager`], minus totals.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tracing::instrument;

use seaglass_core::{LineItemKey, StockStatus};

use crate::error::Result;
use crate::hub::StateHub;
use crate::items::LineItemAttrs;
use crate::manager::{AuthState, UpdatingGuard};
use crate::remote::{RemoteError, WishlistRemote};
use crate::storage::{StorageBackend, Store, WISHLIST_KEY};
use crate::types::Identity;

/// A saved-for-later item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistEntry {
    /// Identity of this entry within the wishlist.
    pub key: LineItemKey,
    /// Product display name.
    pub name: String,
    /// Unit price at the time the entry was last refreshed.
    pub unit_price: Decimal,
    /// Product image URL, if any.
    pub image_url: Option<String>,
    /// Stock availability, refreshed from the remote authority.
    pub stock: StockStatus,
    /// When the entry was first added.
    pub added_at: DateTime<Utc>,
}

/// An identity-keyed set of wishlist entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wishlist(Vec<WishlistEntry>);

impl Wishlist {
    /// Create an empty wishlist.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the wishlist has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, WishlistEntry> {
        self.0.iter()
    }

    /// Whether an identity is present.
    #[must_use]
    pub fn contains(&self, key: &LineItemKey) -> bool {
        self.0.iter().any(|entry| &entry.key == key)
    }

    /// Find an entry by identity.
    #[must_use]
    pub fn find(&self, key: &LineItemKey) -> Option<&WishlistEntry> {
        self.0.iter().find(|entry| &entry.key == key)
    }

    /// Add an entry, keeping the identity unique.
    ///
    /// An existing entry refreshes its display attributes and stock status
    /// but keeps its original added-at timestamp.
    pub fn add(&mut self, entry: WishlistEntry) {
        if let Some(existing) = self.0.iter_mut().find(|e| e.key == entry.key) {
            existing.name = entry.name;
            existing.unit_price = entry.unit_price;
            existing.image_url = entry.image_url;
            existing.stock = entry.stock;
        } else {
            self.0.push(entry);
        }
    }

    /// Remove an entry by identity. A no-op (not an error) if absent.
    pub fn remove(&mut self, key: &LineItemKey) {
        self.0.retain(|entry| &entry.key != key);
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Union two wishlists by identity.
    ///
    /// Presence only - entries already present keep their position and
    /// original added-at timestamp while refreshing attributes from
    /// `other`; identities only in `other` are appended.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        for entry in other.0 {
            self.add(entry);
        }
        self
    }
}

impl IntoIterator for Wishlist {
    type Item = WishlistEntry;
    type IntoIter = std::vec::IntoIter<WishlistEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<WishlistEntry> for Wishlist {
    fn from_iter<T: IntoIterator<Item = WishlistEntry>>(iter: T) -> Self {
        let mut wishlist = Self::new();
        for entry in iter {
            wishlist.add(entry);
        }
        wishlist
    }
}

// =============================================================================
// WishlistManager
// =============================================================================

/// The wishlist state manager.
///
/// Same contract as [`crate::manager::CartManager`]: constructed at the
/// composition root, hydrated from storage, mutations dispatch by auth
/// state, every successful mutation publishes a full snapshot.
#[derive(Debug)]
pub struct WishlistManager<R, B> {
    remote: R,
    store: Store<B>,
    hub: StateHub<Wishlist>,
    auth: Mutex<AuthState>,
    updating: AtomicBool,
}

impl<R: WishlistRemote, B: StorageBackend> WishlistManager<R, B> {
    /// Create a manager and hydrate it from the injected storage backend.
    #[must_use]
    pub fn new(remote: R, backend: B) -> Self {
        let store = Store::new(backend);
        let wishlist: Wishlist = store.load_or_default(WISHLIST_KEY);

        Self {
            remote,
            store,
            hub: StateHub::new(wishlist),
            auth: Mutex::new(AuthState::Anonymous),
            updating: AtomicBool::new(false),
        }
    }

    /// Synchronous read of the current wishlist snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Wishlist {
        self.hub.current()
    }

    /// Subscribe to wishlist snapshots. Dropping the receiver unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Wishlist> {
        self.hub.subscribe()
    }

    /// Advisory flag: a mutation is in flight.
    #[must_use]
    pub fn is_updating(&self) -> bool {
        self.updating.load(Ordering::Relaxed)
    }

    /// Transition to the authenticated state, merging the anonymous
    /// wishlist (union by identity) into the remote one. One-shot per
    /// authentication session.
    ///
    /// # Errors
    ///
    /// Returns the remote error if the merge or fetch fails; the manager
    /// stays anonymous and local state is untouched.
    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn sign_in(&self, identity: Identity) -> Result<Wishlist> {
        let mut auth = self.auth.lock().await;
        if let AuthState::Authenticated {
            identity: current,
            merged: true,
        } = &*auth
            && current.user_id == identity.user_id
        {
            return Ok(self.snapshot());
        }

        let _guard = UpdatingGuard::hold(&self.updating);

        let local = self.hub.current();
        let wishlist = if local.is_empty() {
            self.remote.fetch_wishlist(&identity).await?
        } else {
            tracing::info!(entry_count = local.len(), "Merging anonymous wishlist into remote");
            self.remote.sync_wishlist(&identity, &local).await?
        };

        *auth = AuthState::Authenticated {
            identity,
            merged: true,
        };
        drop(auth);

        Ok(self.commit(wishlist))
    }

    /// Transition back to the anonymous state, leaving the remote wishlist
    /// untouched.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) {
        *self.auth.lock().await = AuthState::Anonymous;
    }

    /// Add an item. Adding a present identity refreshes its attributes and
    /// stock status rather than duplicating.
    ///
    /// # Errors
    ///
    /// Returns a remote error in the authenticated state (except 401, which
    /// falls back to the local path); in-memory state is unchanged on error.
    #[instrument(skip(self, attrs), fields(key = %key))]
    pub async fn add(
        &self,
        key: LineItemKey,
        attrs: LineItemAttrs,
        stock: StockStatus,
    ) -> Result<Wishlist> {
        let _guard = UpdatingGuard::hold(&self.updating);

        let entry = WishlistEntry {
            key,
            name: attrs.name,
            unit_price: attrs.unit_price,
            image_url: attrs.image_url,
            stock,
            added_at: Utc::now(),
        };

        let Some(identity) = self.identity().await else {
            return Ok(self.apply_local(|wishlist| wishlist.add(entry)));
        };

        match self.remote.add_entry(&identity, entry.clone()).await {
            Ok(wishlist) => Ok(self.commit(wishlist)),
            Err(RemoteError::Unauthorized) => {
                self.expire_session().await;
                Ok(self.apply_local(|wishlist| wishlist.add(entry)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove an entry by identity. A no-op (not an error) if absent.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::add`].
    #[instrument(skip(self), fields(key = %key))]
    pub async fn remove(&self, key: &LineItemKey) -> Result<Wishlist> {
        let _guard = UpdatingGuard::hold(&self.updating);

        let Some(identity) = self.identity().await else {
            return Ok(self.apply_local(|wishlist| wishlist.remove(key)));
        };

        match self.remote.remove_entry(&identity, key).await {
            Ok(wishlist) => Ok(self.commit(wishlist)),
            Err(RemoteError::Unauthorized) => {
                self.expire_session().await;
                Ok(self.apply_local(|wishlist| wishlist.remove(key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every entry.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::add`].
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<Wishlist> {
        let _guard = UpdatingGuard::hold(&self.updating);

        let Some(identity) = self.identity().await else {
            return Ok(self.apply_local(Wishlist::clear));
        };

        match self.remote.clear_wishlist(&identity).await {
            Ok(wishlist) => Ok(self.commit(wishlist)),
            Err(RemoteError::Unauthorized) => {
                self.expire_session().await;
                Ok(self.apply_local(Wishlist::clear))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn identity(&self) -> Option<Identity> {
        self.auth.lock().await.identity()
    }

    async fn expire_session(&self) {
        tracing::warn!("Session expired mid-operation, falling back to local wishlist");
        *self.auth.lock().await = AuthState::Anonymous;
    }

    fn apply_local(&self, mutate: impl FnOnce(&mut Wishlist)) -> Wishlist {
        let mut wishlist = self.hub.current();
        mutate(&mut wishlist);
        self.commit(wishlist)
    }

    fn commit(&self, wishlist: Wishlist) -> Wishlist {
        self.store.save(WISHLIST_KEY, &wishlist);
        self.hub.publish(wishlist.clone());
        wishlist
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;

    use super::*;
    use crate::storage::MemoryBackend;

    #[derive(Clone, Default)]
    struct FakeWishlistRemote {
        inner: Arc<FakeInner>,
    }

    #[derive(Default)]
    struct FakeInner {
        entries: std::sync::Mutex<Wishlist>,
        sync_calls: AtomicU32,
        expire_next: std::sync::Mutex<bool>,
    }

    impl FakeWishlistRemote {
        fn with_entries(entries: Wishlist) -> Self {
            let fake = Self::default();
            *fake.inner.entries.lock().unwrap() = entries;
            fake
        }

        fn expire_next(&self) {
            *self.inner.expire_next.lock().unwrap() = true;
        }

        fn check_expiry(&self) -> std::result::Result<(), RemoteError> {
            if std::mem::take(&mut *self.inner.expire_next.lock().unwrap()) {
                return Err(RemoteError::Unauthorized);
            }
            Ok(())
        }

        fn current(&self) -> Wishlist {
            self.inner.entries.lock().unwrap().clone()
        }
    }

    impl WishlistRemote for FakeWishlistRemote {
        async fn fetch_wishlist(
            &self,
            _: &Identity,
        ) -> std::result::Result<Wishlist, RemoteError> {
            self.check_expiry()?;
            Ok(self.current())
        }

        async fn add_entry(
            &self,
            _: &Identity,
            entry: WishlistEntry,
        ) -> std::result::Result<Wishlist, RemoteError> {
            self.check_expiry()?;
            let mut entries = self.inner.entries.lock().unwrap();
            entries.add(entry);
            Ok(entries.clone())
        }

        async fn remove_entry(
            &self,
            _: &Identity,
            key: &LineItemKey,
        ) -> std::result::Result<Wishlist, RemoteError> {
            self.check_expiry()?;
            let mut entries = self.inner.entries.lock().unwrap();
            entries.remove(key);
            Ok(entries.clone())
        }

        async fn clear_wishlist(&self, _: &Identity) -> std::result::Result<Wishlist, RemoteError> {
            self.check_expiry()?;
            let mut entries = self.inner.entries.lock().unwrap();
            entries.clear();
            Ok(entries.clone())
        }

        async fn sync_wishlist(
            &self,
            _: &Identity,
            incoming: &Wishlist,
        ) -> std::result::Result<Wishlist, RemoteError> {
            self.check_expiry()?;
            self.inner.sync_calls.fetch_add(1, Ordering::Relaxed);
            let mut entries = self.inner.entries.lock().unwrap();
            *entries = entries.clone().merge(incoming.clone());
            Ok(entries.clone())
        }
    }

    fn attrs(name: &str, price_cents: i64) -> LineItemAttrs {
        LineItemAttrs {
            name: name.to_string(),
            unit_price: Decimal::new(price_cents, 2),
            image_url: None,
        }
    }

    fn key(product: &str) -> LineItemKey {
        LineItemKey::for_product(product)
    }

    fn entry(product: &str) -> WishlistEntry {
        WishlistEntry {
            key: key(product),
            name: product.to_string(),
            unit_price: Decimal::new(1000, 2),
            image_url: None,
            stock: StockStatus::InStock,
            added_at: Utc::now(),
        }
    }

    fn identity() -> Identity {
        Identity::new("customer-1", "test-token")
    }

    #[test]
    fn test_add_is_presence_only() {
        let mut wishlist = Wishlist::new();
        wishlist.add(entry("p-1"));
        wishlist.add(entry("p-1"));
        assert_eq!(wishlist.len(), 1);
        assert!(wishlist.contains(&key("p-1")));
    }

    #[test]
    fn test_add_existing_keeps_added_at() {
        let mut wishlist = Wishlist::new();
        let original = entry("p-1");
        let original_added_at = original.added_at;
        wishlist.add(original);

        let mut refreshed = entry("p-1");
        refreshed.added_at = original_added_at + chrono::Duration::hours(1);
        refreshed.stock = StockStatus::OutOfStock;
        wishlist.add(refreshed);

        let stored = wishlist.find(&key("p-1")).unwrap();
        assert_eq!(stored.added_at, original_added_at);
        assert_eq!(stored.stock, StockStatus::OutOfStock);
    }

    #[test]
    fn test_merge_unions_by_identity() {
        let local: Wishlist = [entry("a")].into_iter().collect();
        let remote: Wishlist = [entry("a"), entry("b")].into_iter().collect();
        let merged = local.merge(remote);
        assert_eq!(merged.len(), 2);
    }

    #[tokio::test]
    async fn test_anonymous_add_persists() {
        let backend = Arc::new(MemoryBackend::new());
        let manager = WishlistManager::new(FakeWishlistRemote::default(), Arc::clone(&backend));
        manager
            .add(key("p-1"), attrs("P1", 2000), StockStatus::InStock)
            .await
            .unwrap();

        let second = WishlistManager::new(FakeWishlistRemote::default(), backend);
        assert!(second.snapshot().contains(&key("p-1")));
    }

    #[tokio::test]
    async fn test_sign_in_unions_wishlists() {
        let remote = FakeWishlistRemote::with_entries([entry("b")].into_iter().collect());
        let manager = WishlistManager::new(remote.clone(), MemoryBackend::new());
        manager
            .add(key("a"), attrs("A", 1000), StockStatus::Unknown)
            .await
            .unwrap();

        let wishlist = manager.sign_in(identity()).await.unwrap();

        assert_eq!(wishlist.len(), 2);
        assert!(wishlist.contains(&key("a")));
        assert!(wishlist.contains(&key("b")));
        assert_eq!(remote.inner.sync_calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_falls_back_to_local() {
        let remote = FakeWishlistRemote::default();
        let manager = WishlistManager::new(remote.clone(), MemoryBackend::new());
        manager.sign_in(identity()).await.unwrap();

        remote.expire_next();
        let wishlist = manager
            .add(key("p-1"), attrs("P1", 2000), StockStatus::InStock)
            .await
            .unwrap();

        assert!(wishlist.contains(&key("p-1")));
        assert!(!remote.current().contains(&key("p-1")));
    }

    #[tokio::test]
    async fn test_remove_publishes_snapshot() {
        let manager = WishlistManager::new(FakeWishlistRemote::default(), MemoryBackend::new());
        let mut rx = manager.subscribe();

        manager
            .add(key("p-1"), attrs("P1", 2000), StockStatus::InStock)
            .await
            .unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 1);

        manager.remove(&key("p-1")).await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_empty());
    }
}
