//! Favorites store: the set of listing ids the signed-in user has saved.
//!
//! Unlike the cart, favorite toggles are confirmed by the backend before the
//! in-memory set changes. Guests have no favorites.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use domains::{FavoritesRepo, ListingId, MarketError, Notice, Notifier, Result, SessionIdentity, UserId};
use tracing::{debug, info, warn};

use crate::bounded::bounded;

#[derive(Default)]
struct FavoritesState {
    user_id: Option<UserId>,
    ids: Vec<ListingId>,
}

pub struct FavoritesStore {
    repo: Arc<dyn FavoritesRepo>,
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
    state: Mutex<FavoritesState>,
    /// Serializes toggles so a remove cannot overtake the add it follows.
    toggles: tokio::sync::Mutex<()>,
}

impl FavoritesStore {
    pub fn new(repo: Arc<dyn FavoritesRepo>, notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        Self {
            repo,
            notifier,
            timeout,
            state: Mutex::new(FavoritesState::default()),
            toggles: tokio::sync::Mutex::new(()),
        }
    }

    fn state(&self) -> MutexGuard<'_, FavoritesState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_favorite(&self, listing_id: &ListingId) -> bool {
        self.state().ids.contains(listing_id)
    }

    pub fn favorites(&self) -> Vec<ListingId> {
        self.state().ids.clone()
    }

    pub fn count(&self) -> usize {
        self.state().ids.len()
    }

    /// Adds the listing to favorites if absent, removes it if present.
    /// Returns whether the listing is a favorite afterwards.
    ///
    /// Guests get `AuthenticationRequired` and a sign-in notice; a failed
    /// backend write leaves the set unchanged.
    pub async fn toggle_favorite(&self, listing_id: &ListingId) -> Result<bool> {
        let _turn = self.toggles.lock().await;

        let Some(user_id) = self.state().user_id.clone() else {
            self.notifier.notify(Notice::SignInRequired);
            return Err(MarketError::AuthenticationRequired);
        };

        let adding = !self.is_favorite(listing_id);
        let write = if adding {
            bounded(self.timeout, "add favorite", self.repo.add_favorite(&user_id, listing_id)).await
        } else {
            bounded(self.timeout, "remove favorite", self.repo.remove_favorite(&user_id, listing_id)).await
        };

        if let Err(e) = write {
            warn!(listing_id = %listing_id, error = %e, "favorite toggle failed");
            self.notifier.notify(Notice::Failure {
                message: "Your favorites could not be updated.".to_string(),
            });
            return Err(MarketError::PersistenceWriteFailed(e.to_string()));
        }

        {
            let mut state = self.state();
            // The session may have changed while the write was in flight.
            if state.user_id.as_ref() != Some(&user_id) {
                debug!(listing_id = %listing_id, "identity changed during toggle; result dropped");
                return Ok(adding);
            }
            if adding {
                state.ids.push(listing_id.clone());
            } else {
                state.ids.retain(|id| id != listing_id);
            }
        }

        info!(listing_id = %listing_id, favorite = adding, "favorite toggled");
        self.notifier.notify(if adding {
            Notice::FavoriteAdded
        } else {
            Notice::FavoriteRemoved
        });
        Ok(adding)
    }

    /// Replaces the set with the favorites of `identity`. Guests get an empty
    /// set; a failed read leaves the set empty.
    pub async fn load_for(&self, identity: &SessionIdentity) {
        let _turn = self.toggles.lock().await;

        let user_id = match identity {
            SessionIdentity::Guest => {
                *self.state() = FavoritesState::default();
                return;
            }
            SessionIdentity::User(user_id) => user_id.clone(),
        };

        {
            let mut state = self.state();
            state.user_id = Some(user_id.clone());
            state.ids.clear();
        }

        match bounded(self.timeout, "list favorites", self.repo.list_favorites(&user_id)).await {
            Ok(mut ids) => {
                let mut seen = std::collections::HashSet::new();
                ids.retain(|id| seen.insert(id.clone()));
                debug!(user_id = %user_id, count = ids.len(), "favorites loaded");
                let mut state = self.state();
                if state.user_id.as_ref() == Some(&user_id) {
                    state.ids = ids;
                }
            }
            Err(e) => warn!(user_id = %user_id, error = %e, "failed to load favorites"),
        }
    }
}
