//! # Cart Store
//!
//! Owns the cart line items of the current session and keeps them mirrored to
//! the persistence port that matches the session identity: the local key/value
//! store for guests, the remote cart collection for signed-in users.
//!
//! Updates are optimistic. The in-memory collection changes first and is the
//! source of truth for the rest of the session; the durable write follows. A
//! failed write is reported as `PersistenceWriteFailed` and is *not* rolled
//! back, so the UI may show a cart that is not (yet) durable. The next
//! successful write catches storage up, since every write carries the full
//! latest collection.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use domains::{
    CartLineItem, CartMergePolicy, ListingId, ListingRepo, LocalStorage, MarketError, Notice, Notifier,
    RemoteCartRepo, Result, SessionIdentity,
};
use tracing::{debug, info, warn};

use crate::bounded::bounded;
use crate::CommerceOptions;

/// The ports a cart store talks to.
#[derive(Clone)]
pub struct CartPorts {
    pub local: Arc<dyn LocalStorage>,
    pub remote: Arc<dyn RemoteCartRepo>,
    pub listings: Arc<dyn ListingRepo>,
    pub notifier: Arc<dyn Notifier>,
}

struct CartState {
    identity: SessionIdentity,
    items: Vec<CartLineItem>,
    /// Bumped on every in-memory change that must reach storage.
    revision: u64,
    /// Set while the signed-in user's remote cart has not been read yet. Holds
    /// the policy used to fold the in-memory items into it before the first
    /// remote write.
    unreconciled: Option<CartMergePolicy>,
}

pub struct CartStore {
    ports: CartPorts,
    options: CommerceOptions,
    state: Mutex<CartState>,
    /// Revision covered by the last completed durable write. Holding this lock
    /// serializes writers.
    persisted: tokio::sync::Mutex<u64>,
}

/// Combines the in-memory (guest) cart with the user's remote cart on sign-in.
pub fn merge_carts(
    policy: CartMergePolicy,
    local: Vec<CartLineItem>,
    remote: Vec<CartLineItem>,
) -> Vec<CartLineItem> {
    match policy {
        CartMergePolicy::KeepLocal => local,
        CartMergePolicy::PreferRemote if remote.is_empty() => local,
        CartMergePolicy::PreferRemote => remote,
        CartMergePolicy::Merge => {
            let mut merged = local;
            for incoming in remote {
                match merged.iter_mut().find(|i| i.listing_id == incoming.listing_id) {
                    Some(existing) => {
                        existing.quantity = existing.quantity.saturating_add(incoming.quantity)
                    }
                    None => merged.push(incoming),
                }
            }
            merged
        }
    }
}

impl CartStore {
    /// Creates an empty guest cart. Call [`CartStore::load`] to read the stored one.
    pub fn new(ports: CartPorts, options: CommerceOptions) -> Self {
        Self {
            ports,
            options,
            state: Mutex::new(CartState {
                identity: SessionIdentity::Guest,
                items: Vec::new(),
                revision: 0,
                unreconciled: None,
            }),
            persisted: tokio::sync::Mutex::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, CartState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ============================================================================
    // Reads
    // ============================================================================

    /// Line items in insertion order.
    pub fn items(&self) -> Vec<CartLineItem> {
        self.state().items.clone()
    }

    pub fn line_item(&self, listing_id: &ListingId) -> Option<CartLineItem> {
        self.state()
            .items
            .iter()
            .find(|i| &i.listing_id == listing_id)
            .cloned()
    }

    /// Quantity of `listing_id` in the cart, 0 when absent.
    pub fn quantity_of(&self, listing_id: &ListingId) -> u32 {
        self.state()
            .items
            .iter()
            .find(|i| &i.listing_id == listing_id)
            .map_or(0, |i| i.quantity)
    }

    /// Σ quantity.
    pub fn total_item_count(&self) -> u64 {
        self.state().items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// Σ unit price × quantity.
    pub fn total_price(&self) -> i64 {
        self.state()
            .items
            .iter()
            .fold(0i64, |acc, i| acc.saturating_add(i.line_total()))
    }

    pub fn is_empty(&self) -> bool {
        self.state().items.is_empty()
    }

    pub fn identity(&self) -> SessionIdentity {
        self.state().identity.clone()
    }

    // ============================================================================
    // Mutations
    // ============================================================================

    /// Reads the stored cart for the current identity into memory. A missing,
    /// unreadable or corrupt stored cart leaves the in-memory one as it is.
    pub async fn load(&self) {
        let identity = self.identity();
        match self.read_snapshot(&identity).await {
            Ok(items) => {
                let mut state = self.state();
                if state.identity == identity {
                    debug!(count = items.len(), "cart loaded");
                    match state.unreconciled.take() {
                        Some(policy) => {
                            let local = std::mem::take(&mut state.items);
                            let merged = merge_carts(policy, local, items.clone());
                            if merged != items {
                                state.revision += 1;
                            }
                            state.items = merged;
                        }
                        None => state.items = items,
                    }
                }
            }
            Err(e) => warn!(error = %e, "failed to load cart; keeping in-memory items"),
        }
    }

    /// Adds one unit of a listing, snapshotting its price, title and images the
    /// first time it is added.
    ///
    /// Fails with `ListingUnavailable` (nothing changed) when the listing cannot
    /// be read, and with `PersistenceWriteFailed` when the in-memory change was
    /// applied but could not be stored.
    pub async fn add_to_cart(&self, listing_id: &ListingId) -> Result<CartLineItem> {
        let read = bounded(
            self.options.backend_timeout,
            "read listing",
            self.ports.listings.get_listing(listing_id),
        )
        .await;

        let listing = match read {
            Ok(Some(listing)) => listing,
            Ok(None) => return Err(self.unavailable(listing_id, "listing not found")),
            Err(e) => return Err(self.unavailable(listing_id, &e.to_string())),
        };

        let line = {
            let mut state = self.state();
            let line = match state.items.iter().position(|i| &i.listing_id == listing_id) {
                Some(pos) => {
                    let item = &mut state.items[pos];
                    item.quantity = item.quantity.saturating_add(1);
                    item.clone()
                }
                None => {
                    let item = CartLineItem::from_listing(&listing);
                    state.items.push(item.clone());
                    item
                }
            };
            state.revision += 1;
            line
        };

        info!(listing_id = %listing_id, quantity = line.quantity, "added to cart");
        self.persist_or_report().await?;
        self.ports.notifier.notify(Notice::AddedToCart {
            title: listing.title,
        });
        Ok(line)
    }

    /// Deletes the line item for `listing_id`. Absent items are a no-op.
    pub async fn remove_from_cart(&self, listing_id: &ListingId) -> Result<()> {
        let removed = {
            let mut state = self.state();
            let before = state.items.len();
            state.items.retain(|i| &i.listing_id != listing_id);
            let removed = state.items.len() != before;
            if removed {
                state.revision += 1;
            }
            removed
        };
        if !removed {
            return Ok(());
        }

        info!(listing_id = %listing_id, "removed from cart");
        self.persist_or_report().await?;
        self.ports.notifier.notify(Notice::RemovedFromCart);
        Ok(())
    }

    /// Replaces the quantity of an existing line item. `quantity <= 0` removes
    /// it; an absent line item is never created.
    pub async fn set_quantity(&self, listing_id: &ListingId, quantity: i64) -> Result<()> {
        if quantity <= 0 {
            return self.remove_from_cart(listing_id).await;
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);

        let changed = {
            let mut state = self.state();
            let changed = match state.items.iter_mut().find(|i| &i.listing_id == listing_id) {
                Some(item) if item.quantity != quantity => {
                    item.quantity = quantity;
                    true
                }
                _ => false,
            };
            if changed {
                state.revision += 1;
            }
            changed
        };
        if !changed {
            return Ok(());
        }

        debug!(listing_id = %listing_id, quantity, "cart quantity changed");
        self.persist_or_report().await
    }

    pub async fn clear_cart(&self) -> Result<()> {
        let changed = {
            let mut state = self.state();
            let changed = !state.items.is_empty();
            if changed {
                state.items.clear();
                state.revision += 1;
            }
            changed
        };

        if changed {
            info!("cart cleared");
            self.persist_or_report().await?;
        }
        self.ports.notifier.notify(Notice::CartCleared);
        Ok(())
    }

    /// Follows a session identity change.
    ///
    /// Signing out keeps the in-memory cart and points future writes at local
    /// storage. Signing in from a guest session combines the in-memory cart
    /// with the user's remote cart according to the configured
    /// [`CartMergePolicy`] and mirrors the result remotely. Switching directly
    /// from one user to another drops the previous user's items and shows the
    /// new user's remote cart as stored. The guest entry in local storage is
    /// left untouched.
    ///
    /// When the remote cart cannot be read, nothing is written remotely until
    /// a later read succeeds: the next write first loads the remote cart and
    /// folds the in-memory items into it.
    pub async fn switch_identity(&self, next: SessionIdentity) -> Result<()> {
        let previous = self.identity();
        if previous == next {
            return Ok(());
        }

        let user_id = match &next {
            SessionIdentity::Guest => {
                let mut state = self.state();
                state.identity = SessionIdentity::Guest;
                state.unreconciled = None;
                info!("cart now stored locally");
                return Ok(());
            }
            SessionIdentity::User(user_id) => user_id.clone(),
        };

        let remote = bounded(
            self.options.backend_timeout,
            "load remote cart",
            self.ports.remote.load_cart(&user_id),
        )
        .await;

        let from_guest = previous.is_guest();
        let needs_mirror = {
            let mut state = self.state();
            state.identity = next;
            state.unreconciled = None;
            if !from_guest {
                state.items.clear();
            }
            match remote {
                Ok(remote) if from_guest => {
                    let local = std::mem::take(&mut state.items);
                    let merged = merge_carts(self.options.merge_policy, local, remote.clone());
                    let needs_mirror = merged != remote;
                    state.items = merged;
                    if needs_mirror {
                        state.revision += 1;
                    }
                    needs_mirror
                }
                Ok(remote) => {
                    state.items = remote;
                    false
                }
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "failed to load remote cart");
                    // After a user switch the cart starts empty; whatever is
                    // added meanwhile goes on top of the stored cart.
                    state.unreconciled = Some(if from_guest {
                        self.options.merge_policy
                    } else {
                        CartMergePolicy::Merge
                    });
                    false
                }
            }
        };

        info!(user_id = %user_id, policy = ?self.options.merge_policy, from_guest, "cart bound to user");
        if needs_mirror {
            self.persist_or_report().await?;
        }
        Ok(())
    }

    // ============================================================================
    // Persistence
    // ============================================================================

    fn unavailable(&self, listing_id: &ListingId, reason: &str) -> MarketError {
        warn!(listing_id = %listing_id, reason, "cannot add listing to cart");
        self.ports.notifier.notify(Notice::Failure {
            message: "This item could not be added to your cart.".to_string(),
        });
        MarketError::ListingUnavailable(listing_id.to_string())
    }

    async fn persist_or_report(&self) -> Result<()> {
        self.persist().await.map_err(|e| {
            warn!(error = %e, "cart write failed; in-memory cart kept");
            self.ports.notifier.notify(Notice::Failure {
                message: "Your cart could not be saved.".to_string(),
            });
            MarketError::PersistenceWriteFailed(e.to_string())
        })
    }

    /// Writes the latest snapshot unless a newer write already covered it.
    async fn persist(&self) -> anyhow::Result<()> {
        let mut persisted = self.persisted.lock().await;
        self.reconcile_remote().await?;
        let (identity, items, revision) = {
            let state = self.state();
            (state.identity.clone(), state.items.clone(), state.revision)
        };
        if revision <= *persisted {
            return Ok(());
        }

        self.write_snapshot(&identity, &items).await?;
        *persisted = revision;
        Ok(())
    }

    /// Reads the remote cart that sign-in could not load and folds the
    /// in-memory items into it. Fails, and so blocks the remote write, while
    /// the remote cart stays unreadable.
    async fn reconcile_remote(&self) -> anyhow::Result<()> {
        let (user_id, policy) = {
            let state = self.state();
            match (&state.identity, state.unreconciled) {
                (SessionIdentity::User(user_id), Some(policy)) => (user_id.clone(), policy),
                _ => return Ok(()),
            }
        };

        let remote = bounded(
            self.options.backend_timeout,
            "load remote cart",
            self.ports.remote.load_cart(&user_id),
        )
        .await
        .context("remote cart not read yet")?;

        let mut state = self.state();
        if state.identity.user_id() == Some(&user_id) && state.unreconciled.is_some() {
            let local = std::mem::take(&mut state.items);
            state.items = merge_carts(policy, local, remote);
            state.unreconciled = None;
            state.revision += 1;
            debug!(user_id = %user_id, "remote cart reconciled");
        }
        Ok(())
    }

    async fn read_snapshot(&self, identity: &SessionIdentity) -> anyhow::Result<Vec<CartLineItem>> {
        let timeout = self.options.backend_timeout;
        match identity {
            SessionIdentity::Guest => {
                let raw = bounded(timeout, "read local cart", self.ports.local.get_item(&self.options.cart_key)).await?;
                match raw {
                    Some(raw) => serde_json::from_str(&raw).context("stored cart is not valid JSON"),
                    None => Ok(Vec::new()),
                }
            }
            SessionIdentity::User(user_id) => {
                bounded(timeout, "load remote cart", self.ports.remote.load_cart(user_id)).await
            }
        }
    }

    async fn write_snapshot(&self, identity: &SessionIdentity, items: &[CartLineItem]) -> anyhow::Result<()> {
        let timeout = self.options.backend_timeout;
        match identity {
            SessionIdentity::Guest if items.is_empty() => {
                bounded(timeout, "remove local cart", self.ports.local.remove_item(&self.options.cart_key)).await
            }
            SessionIdentity::Guest => {
                let raw = serde_json::to_string(items).context("serialize cart")?;
                bounded(
                    timeout,
                    "write local cart",
                    self.ports.local.set_item(&self.options.cart_key, &raw),
                )
                .await
            }
            SessionIdentity::User(user_id) => {
                bounded(timeout, "write remote cart", self.ports.remote.replace_cart(user_id, items)).await
            }
        }
    }
}
