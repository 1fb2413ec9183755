//! # Core Traits (Ports)
//!
//! Any storage plugin must implement these traits to be used by the stores.
//! Implementations report failures through `anyhow`; the stores translate them
//! into [`MarketError`](crate::error::MarketError) kinds.

use async_trait::async_trait;

use crate::category::Category;
use crate::models::{CartLineItem, Listing, ListingId, Notice, UserId};
use crate::query::QuerySpec;

/// Device-local key/value storage (one browser profile, one machine).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait LocalStorage: Send + Sync {
    async fn get_item(&self, key: &str) -> anyhow::Result<Option<String>>;
    /// Overwrites the whole value under `key`.
    async fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()>;
    async fn remove_item(&self, key: &str) -> anyhow::Result<()>;
}

/// Durable, per-user cart collection reachable over the network.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RemoteCartRepo: Send + Sync {
    async fn load_cart(&self, user_id: &UserId) -> anyhow::Result<Vec<CartLineItem>>;
    /// Replaces the user's whole cart with `items`, preserving their order.
    async fn replace_cart(&self, user_id: &UserId, items: &[CartLineItem]) -> anyhow::Result<()>;
}

/// The favorites collection, keyed by (user id, listing id).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait FavoritesRepo: Send + Sync {
    async fn list_favorites(&self, user_id: &UserId) -> anyhow::Result<Vec<ListingId>>;
    /// Inserting an existing pair is not an error.
    async fn add_favorite(&self, user_id: &UserId, listing_id: &ListingId) -> anyhow::Result<()>;
    /// Deleting a missing pair is not an error.
    async fn remove_favorite(&self, user_id: &UserId, listing_id: &ListingId) -> anyhow::Result<()>;
}

/// Read side of the listing collection (plus the server-side view counter).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ListingRepo: Send + Sync {
    /// Reads a listing by id regardless of its status.
    async fn get_listing(&self, id: &ListingId) -> anyhow::Result<Option<Listing>>;
    /// Runs a compiled catalog query and returns the windowed rows.
    async fn query_listings(&self, query: &QuerySpec) -> anyhow::Result<Vec<Listing>>;
    async fn increment_views(&self, id: &ListingId) -> anyhow::Result<()>;
    async fn list_categories(&self) -> anyhow::Result<Vec<Category>>;
}

/// Delivery of user-facing notices (toasts, banners). Must not block.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}
