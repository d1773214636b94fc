//! Shop-state configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPSTATE_API_BASE_URL` - Base URL of the cart/wishlist API
//!
//! ## Optional
//! - `SHOPSTATE_STORAGE_DIR` - Directory for persisted snapshots (no durable
//!   persistence when unset)
//! - `SHOPSTATE_CURRENCY` - ISO 4217 currency code (default: USD)
//! - `SHOPSTATE_TAX_RATE` - Flat tax rate as a decimal fraction (default: 0.08)
//! - `SHOPSTATE_SHIPPING_FEE` - Flat shipping fee (default: 5.95)
//! - `SHOPSTATE_FREE_SHIPPING_THRESHOLD` - Subtotal at which shipping is free
//!   (default: 50)

use std::path::PathBuf;

use rust_decimal::Decimal;
use thiserror::Error;
use url::Url;

use seaglass_core::CurrencyCode;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Pricing rules used to derive cart totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingConfig {
    /// Currency all amounts are denominated in.
    pub currency: CurrencyCode,
    /// Flat tax rate applied to the subtotal (e.g. 0.08 for 8%).
    pub tax_rate: Decimal,
    /// Shipping fee charged below the free-shipping threshold.
    pub shipping_fee: Decimal,
    /// Subtotal at or above which shipping is free.
    pub free_shipping_threshold: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            currency: CurrencyCode::USD,
            tax_rate: Decimal::new(8, 2),
            shipping_fee: Decimal::new(595, 2),
            free_shipping_threshold: Decimal::new(50, 0),
        }
    }
}

/// Remote cart/wishlist API configuration.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the API (e.g. `https://api.seaglass.shop/v1`).
    pub base_url: Url,
}

/// Top-level shop-state configuration.
#[derive(Debug, Clone)]
pub struct ShopStateConfig {
    /// Remote API configuration.
    pub remote: RemoteConfig,
    /// Pricing rules for derived totals.
    pub pricing: PricingConfig,
    /// Snapshot directory; `None` means no durable medium is available and
    /// the no-op storage backend should be injected.
    pub storage_dir: Option<PathBuf>,
}

impl ShopStateConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let base_url = get_required_env("SHOPSTATE_API_BASE_URL")?;
        let base_url = Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("SHOPSTATE_API_BASE_URL".to_string(), e.to_string())
        })?;

        let storage_dir = get_optional_env("SHOPSTATE_STORAGE_DIR").map(PathBuf::from);

        Ok(Self {
            remote: RemoteConfig { base_url },
            pricing: PricingConfig::from_env()?,
            storage_dir,
        })
    }
}

impl PricingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let currency = match get_optional_env("SHOPSTATE_CURRENCY") {
            Some(code) => parse_currency(&code)?,
            None => defaults.currency,
        };

        Ok(Self {
            currency,
            tax_rate: get_decimal_or("SHOPSTATE_TAX_RATE", defaults.tax_rate)?,
            shipping_fee: get_decimal_or("SHOPSTATE_SHIPPING_FEE", defaults.shipping_fee)?,
            free_shipping_threshold: get_decimal_or(
                "SHOPSTATE_FREE_SHIPPING_THRESHOLD",
                defaults.free_shipping_threshold,
            )?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get a decimal environment variable with a default value.
fn get_decimal_or(key: &str, default: Decimal) -> Result<Decimal, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .parse::<Decimal>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Parse an ISO 4217 code into a supported currency.
fn parse_currency(code: &str) -> Result<CurrencyCode, ConfigError> {
    match code.to_ascii_uppercase().as_str() {
        "USD" => Ok(CurrencyCode::USD),
        "EUR" => Ok(CurrencyCode::EUR),
        "GBP" => Ok(CurrencyCode::GBP),
        "CAD" => Ok(CurrencyCode::CAD),
        "AUD" => Ok(CurrencyCode::AUD),
        other => Err(ConfigError::InvalidEnvVar(
            "SHOPSTATE_CURRENCY".to_string(),
            format!("unsupported currency: {other}"),
        )),
    }
}
