//! # MarketError
//!
//! Centralized error handling for the Rusty-Market stores and services.
//! Port implementations speak `anyhow`; everything that crosses a store or
//! service boundary is converted into one of these kinds first.

use thiserror::Error;

/// The primary error type for all store and catalog operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    /// The add-to-cart target could not be read (removed, backend down, timed out).
    /// Nothing was changed.
    #[error("listing {0} is unavailable")]
    ListingUnavailable(String),

    /// An operation that needs a signed-in user was attempted as a guest.
    /// Nothing was changed.
    #[error("authentication required")]
    AuthenticationRequired,

    /// A durable write failed. For the cart the in-memory change has already
    /// been applied and is kept (optimistic update); for favorites nothing
    /// was changed.
    #[error("persistence write failed: {0}")]
    PersistenceWriteFailed(String),

    /// A catalog read failed (backend error or timeout).
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// A query string could not be decoded or encoded.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl MarketError {
    /// True when the caller should show a sign-in prompt rather than an error.
    pub fn is_auth_prompt(&self) -> bool {
        matches!(self, Self::AuthenticationRequired)
    }
}

/// A specialized Result type for Rusty-Market logic.
pub type Result<T> = std::result::Result<T, MarketError>;
