//! Seaglass shop-state - client-side cart and wishlist state manager.
//!
//! Tracks a mutable collection of line items, keeps derived totals
//! consistent, persists snapshots across sessions, and reconciles state
//! between an anonymous local store and an authenticated remote authority
//! as the user signs in or out.
//!
//! # Architecture
//!
//! - [`items`] - Pure in-memory line-item collection (no I/O)
//! - [`totals`] - Derived totals as a pure function of items + pricing
//! - [`storage`] - Key/value persistence with injected backends
//! - [`remote`] - HTTP client for the authenticated cart/wishlist API
//! - [`manager`] / [`wishlist`] - Reconciling state machines over the above
//! - [`hub`] - Snapshot publication to UI subscribers
//!
//! # Example
//!
//! ```rust,ignore
//! use seaglass_shopstate::config::ShopStateConfig;
//! use seaglass_shopstate::manager::CartManager;
//! use seaglass_shopstate::remote::RemoteClient;
//! use seaglass_shopstate::storage::FileBackend;
//!
//! let config = ShopStateConfig::from_env()?;
//! let remote = RemoteClient::new(&config.remote);
//! let backend = FileBackend::new(config.storage_dir.clone().unwrap_or_default());
//! let cart = CartManager::new(remote, backend, config.pricing.clone());
//!
//! let mut updates = cart.subscribe();
//! cart.add(key, 1, attrs).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod hub;
pub mod items;
pub mod manager;
pub mod remote;
pub mod storage;
pub mod totals;
pub mod types;
pub mod wishlist;

pub use config::{PricingConfig, RemoteConfig, ShopStateConfig};
pub use error::ShopStateError;
pub use items::{LineItem, LineItemAttrs, LineItemCollection};
pub use manager::CartManager;
pub use types::{Cart, CartTotals, Identity};
pub use wishlist::{Wishlist, WishlistEntry, WishlistManager};
