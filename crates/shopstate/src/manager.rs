//! Cart reconciliation engine.
//!
//! A two-state machine (`Anonymous` / `Authenticated`) that dispatches every
//! mutation to either the local collection + storage or the remote
//! authority. Callers see one contract regardless of the backing path: a
//! mutation returns the new snapshot or a typed error, and every successful
//! mutation publishes to the hub.
//!
//! Signing in triggers a one-shot merge: non-empty anonymous lines are
//! pushed to the remote authority, which combines quantities per identity
//! and returns the canonical cart. A 401 during an authenticated mutation
//! falls back to the local path transparently and drops the session.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, watch};
use tracing::instrument;

use seaglass_core::LineItemKey;

use crate::config::PricingConfig;
use crate::error::Result;
use crate::hub::StateHub;
use crate::items::{LineItem, LineItemAttrs, LineItemCollection};
use crate::remote::{CartRemote, RemoteError};
use crate::storage::{CART_KEY, StorageBackend, Store};
use crate::totals::compute_totals;
use crate::types::{Cart, Identity};

/// Which authority currently backs mutations.
#[derive(Debug)]
pub(crate) enum AuthState {
    /// No signed-in user; the local collection is authoritative.
    Anonymous,
    /// Signed-in user; the remote authority is authoritative. `merged`
    /// makes the sign-in merge a one-shot per authentication session.
    Authenticated { identity: Identity, merged: bool },
}

impl AuthState {
    pub(crate) fn identity(&self) -> Option<Identity> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated { identity, .. } => Some(identity.clone()),
        }
    }
}

/// RAII guard for the advisory `updating` flag.
pub(crate) struct UpdatingGuard<'a>(&'a AtomicBool);

impl<'a> UpdatingGuard<'a> {
    pub(crate) fn hold(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Relaxed);
        Self(flag)
    }
}

impl Drop for UpdatingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// The cart state manager.
///
/// Constructed once at the composition root and passed to consumers
/// explicitly; hydrates from storage on construction. Not a global.
#[derive(Debug)]
pub struct CartManager<R, B> {
    remote: R,
    store: Store<B>,
    pricing: PricingConfig,
    hub: StateHub<Cart>,
    auth: Mutex<AuthState>,
    updating: AtomicBool,
}

impl<R: CartRemote, B: StorageBackend> CartManager<R, B> {
    /// Create a manager and hydrate it from the injected storage backend.
    ///
    /// Derived totals are recomputed from the loaded lines - the persisted
    /// copy of the totals is display data, never trusted.
    #[must_use]
    pub fn new(remote: R, backend: B, pricing: PricingConfig) -> Self {
        let store = Store::new(backend);
        let mut cart: Cart = store.load_or_default(CART_KEY);
        cart.totals = compute_totals(&cart.lines, &pricing);

        Self {
            remote,
            store,
            pricing,
            hub: StateHub::new(cart),
            auth: Mutex::new(AuthState::Anonymous),
            updating: AtomicBool::new(false),
        }
    }

    /// Synchronous read of the current cart snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Cart {
        self.hub.current()
    }

    /// Subscribe to cart snapshots. Dropping the receiver unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Cart> {
        self.hub.subscribe()
    }

    /// Advisory flag: a mutation is in flight. Not enforced - callers use
    /// it to disable re-entrant UI actions.
    #[must_use]
    pub fn is_updating(&self) -> bool {
        self.updating.load(Ordering::Relaxed)
    }

    // =========================================================================
    // Session transitions
    // =========================================================================

    /// Transition to the authenticated state, merging the anonymous cart.
    ///
    /// Non-empty local lines are pushed as a bulk sync; the remote authority
    /// sums quantities per matching identity and its response is adopted as
    /// canonical. Empty local lines mean a plain fetch. The merge runs at
    /// most once per authentication session - repeated sign-in events for
    /// the same user return the current snapshot without re-merging.
    ///
    /// # Errors
    ///
    /// Returns the remote error if the merge or fetch fails; the manager
    /// stays anonymous and local state is untouched.
    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn sign_in(&self, identity: Identity) -> Result<Cart> {
        // Serializes rapid sign-in events; the merged flag makes the merge
        // one-shot even across them
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

        let local = self.hub.current().lines;
        let lines = if local.is_empty() {
            self.remote.fetch(&identity).await?
        } else {
            tracing::info!(line_count = local.len(), "Merging anonymous cart into remote");
            self.remote.sync(&identity, &local).await?
        };

        *auth = AuthState::Authenticated {
            identity,
            merged: true,
        };
        drop(auth);

        Ok(self.commit(lines))
    }

    /// Transition back to the anonymous state.
    ///
    /// The remote cart is left untouched; subsequent operations run against
    /// the local collection, which still holds the last adopted snapshot.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) {
        *self.auth.lock().await = AuthState::Anonymous;
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` units of an item, merging into an existing line with
    /// the same identity. A quantity of zero is floored to one.
    ///
    /// # Errors
    ///
    /// Returns a remote error in the authenticated state (except 401, which
    /// falls back to the local path); in-memory state is unchanged on error.
    #[instrument(skip(self, attrs), fields(key = %key))]
    pub async fn add(&self, key: LineItemKey, quantity: u32, attrs: LineItemAttrs) -> Result<Cart> {
        let _guard = UpdatingGuard::hold(&self.updating);

        let Some(identity) = self.identity().await else {
            return Ok(self.apply_local(|lines| lines.upsert(key, quantity, attrs)));
        };

        let line = LineItem::new(key.clone(), quantity, attrs.clone());
        match self.remote.add(&identity, line).await {
            Ok(lines) => Ok(self.commit(lines)),
            Err(RemoteError::Unauthorized) => {
                self.expire_session().await;
                Ok(self.apply_local(|lines| lines.upsert(key, quantity, attrs)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace a line's quantity exactly; a quantity <= 0 removes the line.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::add`].
    #[instrument(skip(self), fields(key = %key))]
    pub async fn update_quantity(&self, key: &LineItemKey, quantity: i64) -> Result<Cart> {
        let _guard = UpdatingGuard::hold(&self.updating);

        let Some(identity) = self.identity().await else {
            return Ok(self.apply_local(|lines| lines.set_quantity(key, quantity)));
        };

        match self.remote.update_quantity(&identity, key, quantity).await {
            Ok(lines) => Ok(self.commit(lines)),
            Err(RemoteError::Unauthorized) => {
                self.expire_session().await;
                Ok(self.apply_local(|lines| lines.set_quantity(key, quantity)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a line by identity. A no-op (not an error) if absent.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::add`].
    #[instrument(skip(self), fields(key = %key))]
    pub async fn remove(&self, key: &LineItemKey) -> Result<Cart> {
        let _guard = UpdatingGuard::hold(&self.updating);

        let Some(identity) = self.identity().await else {
            return Ok(self.apply_local(|lines| lines.remove(key)));
        };

        match self.remote.remove(&identity, key).await {
            Ok(lines) => Ok(self.commit(lines)),
            Err(RemoteError::Unauthorized) => {
                self.expire_session().await;
                Ok(self.apply_local(|lines| lines.remove(key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::add`].
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<Cart> {
        let _guard = UpdatingGuard::hold(&self.updating);

        let Some(identity) = self.identity().await else {
            return Ok(self.apply_local(LineItemCollection::clear));
        };

        match self.remote.clear(&identity).await {
            Ok(lines) => Ok(self.commit(lines)),
            Err(RemoteError::Unauthorized) => {
                self.expire_session().await;
                Ok(self.apply_local(LineItemCollection::clear))
            }
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn identity(&self) -> Option<Identity> {
        self.auth.lock().await.identity()
    }

    /// Drop the authenticated session after a 401; the current operation
    /// replays locally and later operations stay local until the next
    /// sign-in.
    async fn expire_session(&self) {
        tracing::warn!("Session expired mid-operation, falling back to local cart");
        *self.auth.lock().await = AuthState::Anonymous;
    }

    /// Mutate the local collection and commit the result.
    fn apply_local(&self, mutate: impl FnOnce(&mut LineItemCollection)) -> Cart {
        let mut lines = self.hub.current().lines;
        mutate(&mut lines);
        self.commit(lines)
    }

    /// Recompute totals, persist the snapshot, publish it, return it.
    ///
    /// Storage failures are absorbed inside [`Store::save`]; the published
    /// in-memory snapshot is authoritative either way.
    fn commit(&self, lines: LineItemCollection) -> Cart {
        let totals = compute_totals(&lines, &self.pricing);
        let cart = Cart { lines, totals };
        self.store.save(CART_KEY, &cart);
        self.hub.publish(cart.clone());
        cart
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;

    use rust_decimal::Decimal;

    use super::*;
    use crate::storage::MemoryBackend;

    // =========================================================================
    // Fake remote authority
    // =========================================================================

    #[derive(Clone, Default)]
    struct FakeRemote {
        inner: Arc<FakeRemoteInner>,
    }

    #[derive(Default)]
    struct FakeRemoteInner {
        lines: std::sync::Mutex<LineItemCollection>,
        sync_calls: AtomicU32,
        // Next call fails with this HTTP-like status (401 maps to Unauthorized)
        fail_next: std::sync::Mutex<Option<u16>>,
    }

    impl FakeRemote {
        fn with_lines(lines: LineItemCollection) -> Self {
            let fake = Self::default();
            *fake.inner.lines.lock().unwrap() = lines;
            fake
        }

        fn fail_next(&self, status: u16) {
            *self.inner.fail_next.lock().unwrap() = Some(status);
        }

        fn sync_calls(&self) -> u32 {
            self.inner.sync_calls.load(Ordering::Relaxed)
        }

        fn check_failure(&self) -> std::result::Result<(), RemoteError> {
            match self.inner.fail_next.lock().unwrap().take() {
                Some(401) => Err(RemoteError::Unauthorized),
                Some(status) => Err(RemoteError::Status {
                    status,
                    message: "injected failure".to_string(),
                }),
                None => Ok(()),
            }
        }

        fn current(&self) -> LineItemCollection {
            self.inner.lines.lock().unwrap().clone()
        }
    }

    impl CartRemote for FakeRemote {
        async fn fetch(&self, _: &Identity) -> std::result::Result<LineItemCollection, RemoteError> {
            self.check_failure()?;
            Ok(self.current())
        }

        async fn add(
            &self,
            _: &Identity,
            line: LineItem,
        ) -> std::result::Result<LineItemCollection, RemoteError> {
            self.check_failure()?;
            let mut lines = self.inner.lines.lock().unwrap();
            lines.upsert(
                line.key,
                line.quantity,
                LineItemAttrs {
                    name: line.name,
                    unit_price: line.unit_price,
                    image_url: line.image_url,
                },
            );
            Ok(lines.clone())
        }

        async fn update_quantity(
            &self,
            _: &Identity,
            key: &LineItemKey,
            quantity: i64,
        ) -> std::result::Result<LineItemCollection, RemoteError> {
            self.check_failure()?;
            let mut lines = self.inner.lines.lock().unwrap();
            lines.set_quantity(key, quantity);
            Ok(lines.clone())
        }

        async fn remove(
            &self,
            _: &Identity,
            key: &LineItemKey,
        ) -> std::result::Result<LineItemCollection, RemoteError> {
            self.check_failure()?;
            let mut lines = self.inner.lines.lock().unwrap();
            lines.remove(key);
            Ok(lines.clone())
        }

        async fn clear(&self, _: &Identity) -> std::result::Result<LineItemCollection, RemoteError> {
            self.check_failure()?;
            let mut lines = self.inner.lines.lock().unwrap();
            lines.clear();
            Ok(lines.clone())
        }

        async fn sync(
            &self,
            _: &Identity,
            incoming: &LineItemCollection,
        ) -> std::result::Result<LineItemCollection, RemoteError> {
            self.check_failure()?;
            self.inner.sync_calls.fetch_add(1, Ordering::Relaxed);
            let mut lines = self.inner.lines.lock().unwrap();
            // Same combine rule as the real server: union, quantities summed
            *lines = lines.clone().merge(incoming.clone());
            Ok(lines.clone())
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

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

    fn lines(entries: &[(&str, u32)]) -> LineItemCollection {
        let mut lines = LineItemCollection::new();
        for (product, quantity) in entries {
            lines.upsert(key(product), *quantity, attrs(product, 1000));
        }
        lines
    }

    fn manager(remote: FakeRemote) -> CartManager<FakeRemote, MemoryBackend> {
        CartManager::new(remote, MemoryBackend::new(), PricingConfig::default())
    }

    fn identity() -> Identity {
        Identity::new("customer-1", "test-token")
    }

    // =========================================================================
    // Anonymous path
    // =========================================================================

    #[tokio::test]
    async fn test_anonymous_add_scenario() {
        // Add P1 qty 1 at $20, then qty 2 more of P1
        let manager = manager(FakeRemote::default());
        manager.add(key("p1"), 1, attrs("P1", 2000)).await.unwrap();
        let cart = manager.add(key("p1"), 2, attrs("P1", 2000)).await.unwrap();

        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines.find(&key("p1")).unwrap().quantity, 3);
        assert_eq!(cart.totals.subtotal, Decimal::new(6000, 2));
        // 8% of $60, and $60 clears the $50 free-shipping threshold
        assert_eq!(cart.totals.tax, Decimal::new(480, 2));
        assert_eq!(cart.totals.shipping, Decimal::ZERO);
        assert_eq!(cart.totals.total, Decimal::new(6480, 2));
    }

    #[tokio::test]
    async fn test_anonymous_mutations_publish_snapshots() {
        let manager = manager(FakeRemote::default());
        let mut rx = manager.subscribe();

        manager.add(key("p1"), 1, attrs("P1", 2000)).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().totals.total_items, 1);

        manager.update_quantity(&key("p1"), 4).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().totals.total_items, 4);
    }

    #[tokio::test]
    async fn test_anonymous_state_persists_across_managers() {
        let backend = Arc::new(MemoryBackend::new());

        let first = CartManager::new(
            FakeRemote::default(),
            Arc::clone(&backend),
            PricingConfig::default(),
        );
        first.add(key("p1"), 2, attrs("P1", 2000)).await.unwrap();

        // A new manager over the same medium hydrates the saved snapshot
        let second = CartManager::new(FakeRemote::default(), backend, PricingConfig::default());
        let cart = second.snapshot();
        assert_eq!(cart.lines.find(&key("p1")).unwrap().quantity, 2);
        assert_eq!(cart.totals.total_items, 2);
    }

    #[tokio::test]
    async fn test_update_quantity_zero_removes() {
        let manager = manager(FakeRemote::default());
        manager.add(key("p1"), 3, attrs("P1", 2000)).await.unwrap();
        let cart = manager.update_quantity(&key("p1"), 0).await.unwrap();
        assert!(cart.is_empty());
    }

    // =========================================================================
    // Sign-in merge
    // =========================================================================

    #[tokio::test]
    async fn test_sign_in_merges_local_into_remote() {
        let remote = FakeRemote::with_lines(lines(&[("a", 1), ("b", 3)]));
        let manager = manager(remote.clone());
        manager.add(key("a"), 2, attrs("a", 1000)).await.unwrap();

        let cart = manager.sign_in(identity()).await.unwrap();

        assert_eq!(cart.lines.len(), 2);
        assert_eq!(cart.lines.find(&key("a")).unwrap().quantity, 3);
        assert_eq!(cart.lines.find(&key("b")).unwrap().quantity, 3);
        assert_eq!(remote.sync_calls(), 1);
    }

    #[tokio::test]
    async fn test_sign_in_with_empty_local_fetches_remote() {
        let remote = FakeRemote::with_lines(lines(&[("b", 3)]));
        let manager = manager(remote.clone());

        let cart = manager.sign_in(identity()).await.unwrap();

        assert_eq!(cart.lines.find(&key("b")).unwrap().quantity, 3);
        // No local lines, so no sync - just a fetch
        assert_eq!(remote.sync_calls(), 0);
    }

    #[tokio::test]
    async fn test_repeated_sign_in_merges_once() {
        let remote = FakeRemote::with_lines(lines(&[("a", 1)]));
        let manager = manager(remote.clone());
        manager.add(key("a"), 2, attrs("a", 1000)).await.unwrap();

        manager.sign_in(identity()).await.unwrap();
        let cart = manager.sign_in(identity()).await.unwrap();

        assert_eq!(remote.sync_calls(), 1);
        // A double merge would have summed to 5
        assert_eq!(cart.lines.find(&key("a")).unwrap().quantity, 3);
    }

    #[tokio::test]
    async fn test_failed_sign_in_stays_anonymous() {
        let remote = FakeRemote::with_lines(lines(&[("b", 3)]));
        let manager = manager(remote.clone());
        manager.add(key("a"), 2, attrs("a", 1000)).await.unwrap();

        remote.fail_next(503);
        assert!(manager.sign_in(identity()).await.is_err());

        // Local state untouched, later mutations stay local
        let cart = manager.add(key("a"), 1, attrs("a", 1000)).await.unwrap();
        assert_eq!(cart.lines.find(&key("a")).unwrap().quantity, 3);
        assert!(cart.lines.find(&key("b")).is_none());
    }

    #[tokio::test]
    async fn test_sign_out_keeps_last_snapshot_local() {
        let remote = FakeRemote::with_lines(lines(&[("b", 3)]));
        let manager = manager(remote.clone());
        manager.sign_in(identity()).await.unwrap();

        manager.sign_out().await;

        // Remote cart untouched, local mutations no longer reach it
        let cart = manager.add(key("c"), 1, attrs("c", 500)).await.unwrap();
        assert_eq!(cart.lines.len(), 2);
        assert!(remote.current().find(&key("c")).is_none());
    }

    // =========================================================================
    // Authenticated mutations and failure handling
    // =========================================================================

    #[tokio::test]
    async fn test_authenticated_add_adopts_remote_snapshot() {
        let remote = FakeRemote::with_lines(lines(&[("a", 1)]));
        let manager = manager(remote.clone());
        manager.sign_in(identity()).await.unwrap();

        let cart = manager.add(key("b"), 2, attrs("b", 1500)).await.unwrap();

        assert_eq!(cart.lines.find(&key("b")).unwrap().quantity, 2);
        assert_eq!(remote.current().find(&key("b")).unwrap().quantity, 2);
    }

    #[tokio::test]
    async fn test_remote_failure_leaves_state_untouched() {
        let remote = FakeRemote::with_lines(lines(&[("a", 1)]));
        let manager = manager(remote.clone());
        manager.sign_in(identity()).await.unwrap();
        let before = manager.snapshot();

        remote.fail_next(500);
        let result = manager.add(key("b"), 2, attrs("b", 1500)).await;

        assert!(result.is_err());
        assert_eq!(manager.snapshot(), before);
    }

    #[tokio::test]
    async fn test_unauthorized_falls_back_to_local() {
        let remote = FakeRemote::with_lines(lines(&[("a", 1)]));
        let manager = manager(remote.clone());
        manager.sign_in(identity()).await.unwrap();

        remote.fail_next(401);
        let cart = manager.add(key("b"), 2, attrs("b", 1500)).await.unwrap();

        // Applied locally, not remotely
        assert_eq!(cart.lines.find(&key("b")).unwrap().quantity, 2);
        assert!(remote.current().find(&key("b")).is_none());

        // Session dropped: the next mutation is local too
        manager.add(key("c"), 1, attrs("c", 500)).await.unwrap();
        assert!(remote.current().find(&key("c")).is_none());
    }

    #[tokio::test]
    async fn test_updating_flag_clears_after_mutation() {
        let manager = manager(FakeRemote::default());
        manager.add(key("p1"), 1, attrs("P1", 2000)).await.unwrap();
        assert!(!manager.is_updating());
    }
}
