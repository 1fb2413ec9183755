#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use domains::{CategoryId, Listing, LocalStorage, SessionIdentity};
use services::{CartPorts, CartStore, CommerceOptions, FavoritesStore, IdentityReconciler};
use storage_adapters::{MemoryBackend, MemoryLocalStorage, MemoryNotifier};

pub fn listing(title: &str, price: Option<i64>, category: &str, minutes_ago: i64) -> Listing {
    let mut listing = Listing::sample(title, price);
    listing.category_id = CategoryId::from(category);
    listing.created_at = Utc::now() - chrono::Duration::minutes(minutes_ago);
    listing
}

/// Four active phones priced 90 000, 150 000, 500 000 and 600 000.
pub fn phones() -> Vec<Listing> {
    vec![
        listing("Phone A", Some(90_000), "phones", 4),
        listing("Phone B", Some(150_000), "phones", 3),
        listing("Phone C", Some(500_000), "phones", 2),
        listing("Phone D", Some(600_000), "phones", 1),
    ]
}

/// One session wired to in-memory adapters, or to the given local storage.
pub struct Session {
    pub backend: Arc<MemoryBackend>,
    pub local: Arc<dyn LocalStorage>,
    pub notifier: Arc<MemoryNotifier>,
    pub cart: Arc<CartStore>,
    pub favorites: Arc<FavoritesStore>,
    pub reconciler: Arc<IdentityReconciler>,
}

impl Session {
    pub fn new(options: CommerceOptions) -> Self {
        Self::with_backend(Arc::new(MemoryBackend::new()), Arc::new(MemoryLocalStorage::new()), options)
    }

    pub fn with_backend(backend: Arc<MemoryBackend>, local: Arc<dyn LocalStorage>, options: CommerceOptions) -> Self {
        let notifier = Arc::new(MemoryNotifier::new());
        let timeout = options.backend_timeout;
        let cart = Arc::new(CartStore::new(
            CartPorts {
                local: local.clone(),
                remote: backend.clone(),
                listings: backend.clone(),
                notifier: notifier.clone(),
            },
            options,
        ));
        let favorites = Arc::new(FavoritesStore::new(backend.clone(), notifier.clone(), timeout));
        let reconciler = Arc::new(IdentityReconciler::new(cart.clone(), favorites.clone()));
        Self {
            backend,
            local,
            notifier,
            cart,
            favorites,
            reconciler,
        }
    }

    pub fn stock(&self, listings: &[Listing]) {
        for listing in listings {
            self.backend.insert_listing(listing.clone());
        }
    }
}

pub fn options() -> CommerceOptions {
    CommerceOptions {
        backend_timeout: Duration::from_secs(2),
        ..CommerceOptions::default()
    }
}

pub fn user(id: &str) -> SessionIdentity {
    SessionIdentity::User(id.into())
}
