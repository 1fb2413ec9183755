//! # services
//!
//! The stateful side of the storefront: the cart and favorites stores, the
//! reconciler that reacts to sign-in / sign-out, and the catalog service that
//! executes compiled queries. Each store is an explicit object built once per
//! session around injected ports and shared by reference (`Arc`).

pub mod cart;
pub mod catalog;
pub mod favorites;
pub mod reconciler;

mod bounded;

pub use cart::{merge_carts, CartPorts, CartStore};
pub use catalog::CatalogService;
pub use favorites::FavoritesStore;
pub use reconciler::{IdentityReconciler, Transition};

use std::time::Duration;

use domains::CartMergePolicy;

/// Knobs shared by the stores.
#[derive(Debug, Clone)]
pub struct CommerceOptions {
    /// Local storage key holding the serialized cart.
    pub cart_key: String,
    /// Upper bound on every port call.
    pub backend_timeout: Duration,
    pub merge_policy: CartMergePolicy,
}

impl Default for CommerceOptions {
    fn default() -> Self {
        Self {
            cart_key: "cart".to_string(),
            backend_timeout: Duration::from_secs(10),
            merge_policy: CartMergePolicy::default(),
        }
    }
}
