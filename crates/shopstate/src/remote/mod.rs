//! Remote authority client for the authenticated cart/wishlist API.
//!
//! Every operation requires an authenticated [`Identity`]; the reconciling
//! managers only call these methods once they have established the user is
//! signed in. On success the server returns the authoritative
//! post-operation collection. Failures surface as typed errors with no
//! partial mutation - retrying is left to the caller.

pub mod types;

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::instrument;

use seaglass_core::LineItemKey;

use crate::config::RemoteConfig;
use crate::items::{LineItem, LineItemCollection};
use crate::types::Identity;
use crate::wishlist::{Wishlist, WishlistEntry};

use types::{
    CartEnvelope, CartLineWire, LineKeyWire, RemoveLineRequest, SyncCartRequest,
    SyncWishlistRequest, UpdateQuantityRequest, WishlistEntryWire, WishlistEnvelope,
};

/// Errors that can occur when talking to the remote authority.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP transport failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The session credential was rejected (HTTP 401).
    ///
    /// The managers recover from this transparently by replaying the
    /// operation against local storage.
    #[error("Authentication expired")]
    Unauthorized,

    /// The server returned a non-success status.
    #[error("Remote returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body did not parse as the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

// =============================================================================
// Remote traits
// =============================================================================

/// Cart operations against the remote authority.
///
/// The managers depend on this trait rather than [`RemoteClient`] directly
/// so tests can inject an in-memory authority.
#[allow(async_fn_in_trait)]
pub trait CartRemote {
    /// Fetch the current remote cart.
    async fn fetch(&self, identity: &Identity) -> Result<LineItemCollection, RemoteError>;

    /// Add a line (or increase its quantity) and return the updated cart.
    async fn add(
        &self,
        identity: &Identity,
        line: LineItem,
    ) -> Result<LineItemCollection, RemoteError>;

    /// Set a line's quantity exactly; `quantity <= 0` removes the line.
    async fn update_quantity(
        &self,
        identity: &Identity,
        key: &LineItemKey,
        quantity: i64,
    ) -> Result<LineItemCollection, RemoteError>;

    /// Remove a line and return the updated cart.
    async fn remove(
        &self,
        identity: &Identity,
        key: &LineItemKey,
    ) -> Result<LineItemCollection, RemoteError>;

    /// Remove every line and return the (empty) cart.
    async fn clear(&self, identity: &Identity) -> Result<LineItemCollection, RemoteError>;

    /// Bulk sign-in sync: push anonymous local lines; the server combines
    /// them into the remote cart (quantities summed per identity) and
    /// returns the canonical result.
    async fn sync(
        &self,
        identity: &Identity,
        lines: &LineItemCollection,
    ) -> Result<LineItemCollection, RemoteError>;
}

/// Wishlist operations against the remote authority.
#[allow(async_fn_in_trait)]
pub trait WishlistRemote {
    /// Fetch the current remote wishlist.
    async fn fetch_wishlist(&self, identity: &Identity) -> Result<Wishlist, RemoteError>;

    /// Add an entry (no-op server-side if the identity is already present).
    async fn add_entry(
        &self,
        identity: &Identity,
        entry: WishlistEntry,
    ) -> Result<Wishlist, RemoteError>;

    /// Remove an entry by identity.
    async fn remove_entry(
        &self,
        identity: &Identity,
        key: &LineItemKey,
    ) -> Result<Wishlist, RemoteError>;

    /// Remove every entry.
    async fn clear_wishlist(&self, identity: &Identity) -> Result<Wishlist, RemoteError>;

    /// Bulk sign-in sync: union local entries into the remote wishlist.
    async fn sync_wishlist(
        &self,
        identity: &Identity,
        wishlist: &Wishlist,
    ) -> Result<Wishlist, RemoteError>;
}

// =============================================================================
// RemoteClient
// =============================================================================

/// HTTP client for the cart/wishlist API.
///
/// Cheaply cloneable via `Arc`. The bearer credential comes from the
/// [`Identity`] passed per call, not from the client itself.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    inner: Arc<RemoteClientInner>,
}

#[derive(Debug)]
struct RemoteClientInner {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteClient {
    /// Create a new client for the configured API.
    #[must_use]
    pub fn new(config: &RemoteConfig) -> Self {
        Self {
            inner: Arc::new(RemoteClientInner {
                client: reqwest::Client::new(),
                base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
            }),
        }
    }

    /// Execute a request and decode the success envelope.
    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        identity: &Identity,
        body: Option<&impl Serialize>,
    ) -> Result<T, RemoteError> {
        let url = format!("{}/{path}", self.inner.base_url);

        let mut request = self
            .inner
            .client
            .request(method, url)
            .bearer_auth(identity.access_token.expose_secret());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(RemoteError::Unauthorized);
        }

        // Read the body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Remote API returned non-success status"
            );
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message: response_text.chars().take(200).collect(),
            });
        }

        match serde_json::from_str(&response_text) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %response_text.chars().take(500).collect::<String>(),
                    "Failed to parse remote API response"
                );
                Err(RemoteError::Parse(e))
            }
        }
    }

    async fn cart_op(
        &self,
        method: Method,
        path: &str,
        identity: &Identity,
        body: Option<&impl Serialize>,
    ) -> Result<LineItemCollection, RemoteError> {
        let envelope: CartEnvelope = self.execute(method, path, identity, body).await?;
        Ok(envelope.into())
    }

    async fn wishlist_op(
        &self,
        method: Method,
        path: &str,
        identity: &Identity,
        body: Option<&impl Serialize>,
    ) -> Result<Wishlist, RemoteError> {
        let envelope: WishlistEnvelope = self.execute(method, path, identity, body).await?;
        Ok(envelope.into())
    }
}

// An always-absent body for requests without one; gives `Option<&impl
// Serialize>` a concrete type at bodiless call sites.
const NO_BODY: Option<&()> = None;

impl CartRemote for RemoteClient {
    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    async fn fetch(&self, identity: &Identity) -> Result<LineItemCollection, RemoteError> {
        self.cart_op(Method::GET, "cart", identity, NO_BODY).await
    }

    #[instrument(skip(self, identity, line), fields(user_id = %identity.user_id, key = %line.key))]
    async fn add(
        &self,
        identity: &Identity,
        line: LineItem,
    ) -> Result<LineItemCollection, RemoteError> {
        let body = CartLineWire::from(&line);
        self.cart_op(Method::POST, "cart/items", identity, Some(&body))
            .await
    }

    #[instrument(skip(self, identity), fields(user_id = %identity.user_id, key = %key))]
    async fn update_quantity(
        &self,
        identity: &Identity,
        key: &LineItemKey,
        quantity: i64,
    ) -> Result<LineItemCollection, RemoteError> {
        let body = UpdateQuantityRequest {
            key: LineKeyWire::from(key),
            quantity,
        };
        self.cart_op(Method::PUT, "cart/items", identity, Some(&body))
            .await
    }

    #[instrument(skip(self, identity), fields(user_id = %identity.user_id, key = %key))]
    async fn remove(
        &self,
        identity: &Identity,
        key: &LineItemKey,
    ) -> Result<LineItemCollection, RemoteError> {
        let body = RemoveLineRequest {
            key: LineKeyWire::from(key),
        };
        self.cart_op(Method::DELETE, "cart/items", identity, Some(&body))
            .await
    }

    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    async fn clear(&self, identity: &Identity) -> Result<LineItemCollection, RemoteError> {
        self.cart_op(Method::DELETE, "cart", identity, NO_BODY).await
    }

    #[instrument(skip(self, identity, lines), fields(user_id = %identity.user_id, line_count = lines.len()))]
    async fn sync(
        &self,
        identity: &Identity,
        lines: &LineItemCollection,
    ) -> Result<LineItemCollection, RemoteError> {
        let body = SyncCartRequest::from(lines);
        self.cart_op(Method::POST, "cart/sync", identity, Some(&body))
            .await
    }
}

impl WishlistRemote for RemoteClient {
    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    async fn fetch_wishlist(&self, identity: &Identity) -> Result<Wishlist, RemoteError> {
        self.wishlist_op(Method::GET, "wishlist", identity, NO_BODY)
            .await
    }

    #[instrument(skip(self, identity, entry), fields(user_id = %identity.user_id, key = %entry.key))]
    async fn add_entry(
        &self,
        identity: &Identity,
        entry: WishlistEntry,
    ) -> Result<Wishlist, RemoteError> {
        let body = WishlistEntryWire::from(&entry);
        self.wishlist_op(Method::POST, "wishlist/items", identity, Some(&body))
            .await
    }

    #[instrument(skip(self, identity), fields(user_id = %identity.user_id, key = %key))]
    async fn remove_entry(
        &self,
        identity: &Identity,
        key: &LineItemKey,
    ) -> Result<Wishlist, RemoteError> {
        let body = RemoveLineRequest {
            key: LineKeyWire::from(key),
        };
        self.wishlist_op(Method::DELETE, "wishlist/items", identity, Some(&body))
            .await
    }

    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    async fn clear_wishlist(&self, identity: &Identity) -> Result<Wishlist, RemoteError> {
        self.wishlist_op(Method::DELETE, "wishlist", identity, NO_BODY)
            .await
    }

    #[instrument(skip(self, identity, wishlist), fields(user_id = %identity.user_id, entry_count = wishlist.len()))]
    async fn sync_wishlist(
        &self,
        identity: &Identity,
        wishlist: &Wishlist,
    ) -> Result<Wishlist, RemoteError> {
        let body = SyncWishlistRequest::from(wishlist);
        self.wishlist_op(Method::POST, "wishlist/sync", identity, Some(&body))
            .await
    }
}
