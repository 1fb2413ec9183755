//! Identity transition reconciler.
//!
//! The identity provider is external; it publishes the current
//! [`SessionIdentity`] on a `watch` channel. Every change is applied to both
//! stores in order: favorites are reloaded (or cleared), and the cart is
//! rebound to the persistence port of the new identity.

use std::sync::{Arc, Mutex, PoisonError};

use domains::{SessionIdentity, UserId};
use tokio::sync::watch;
use tracing::{error, info};

use crate::cart::CartStore;
use crate::favorites::FavoritesStore;

/// What an identity change amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    SignedIn(UserId),
    SignedOut,
    /// One user replaced by another without a guest phase in between.
    Switched { from: UserId, to: UserId },
}

impl Transition {
    pub fn between(from: &SessionIdentity, to: &SessionIdentity) -> Self {
        match (from, to) {
            (a, b) if a == b => Self::Unchanged,
            (SessionIdentity::Guest, SessionIdentity::User(to)) => Self::SignedIn(to.clone()),
            (SessionIdentity::User(_), SessionIdentity::Guest) => Self::SignedOut,
            (SessionIdentity::User(from), SessionIdentity::User(to)) => Self::Switched {
                from: from.clone(),
                to: to.clone(),
            },
            (SessionIdentity::Guest, SessionIdentity::Guest) => Self::Unchanged,
        }
    }
}

pub struct IdentityReconciler {
    cart: Arc<CartStore>,
    favorites: Arc<FavoritesStore>,
    current: Mutex<SessionIdentity>,
}

impl IdentityReconciler {
    pub fn new(cart: Arc<CartStore>, favorites: Arc<FavoritesStore>) -> Self {
        Self {
            cart,
            favorites,
            current: Mutex::new(SessionIdentity::Guest),
        }
    }

    pub fn current(&self) -> SessionIdentity {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Brings both stores in line with `next`.
    pub async fn apply(&self, next: SessionIdentity) -> Transition {
        let previous = {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, next.clone())
        };

        let transition = Transition::between(&previous, &next);
        if transition == Transition::Unchanged {
            return transition;
        }

        info!(transition = ?transition, "session identity changed");
        self.favorites.load_for(&next).await;
        if let Err(e) = self.cart.switch_identity(next).await {
            // The cart keeps its in-memory items; the failure was already notified.
            error!(error = %e, "cart could not be mirrored after identity change");
        }
        transition
    }

    /// Follows the identity provider until its sender is dropped.
    pub async fn run(self: Arc<Self>, mut identities: watch::Receiver<SessionIdentity>) {
        let initial = identities.borrow_and_update().clone();
        self.apply(initial).await;

        while identities.changed().await.is_ok() {
            let next = identities.borrow_and_update().clone();
            self.apply(next).await;
        }
        info!("identity provider closed; reconciler stopped");
    }
}
