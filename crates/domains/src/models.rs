//! # Domain Models
//!
//! These structs represent the core entities of Rusty-Market.
//! Identifiers are opaque strings issued by the backend data service; new
//! ones are minted as UUID v4 text.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Mints a fresh identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_string())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }
    };
}

opaque_id!(
    /// Stable, unique identifier of a listing ("ad").
    ListingId
);
opaque_id!(
    /// Identifier of a catalog category.
    CategoryId
);
opaque_id!(
    /// Opaque user identity handed out by the identity provider.
    UserId
);

/// Moderation / lifecycle state of a listing. Public browsing only ever sees `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    #[default]
    Active,
    Pending,
    Rejected,
    Sold,
    Inactive,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Rejected => "rejected",
            Self::Sold => "sold",
            Self::Inactive => "inactive",
        }
    }

    /// Parses the stored status text; unknown values are treated as `Inactive`
    /// so they never leak into public browsing.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "active" => Self::Active,
            "pending" => Self::Pending,
            "rejected" => Self::Rejected,
            "sold" => Self::Sold,
            _ => Self::Inactive,
        }
    }
}

/// A single marketplace item for sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    /// The owning user; only they create or edit the listing.
    pub user_id: UserId,
    pub title: String,
    pub description: String,
    /// Whole currency units. `None` means "contact for price".
    pub price: Option<i64>,
    pub currency: String,
    pub category_id: CategoryId,
    pub city: String,
    /// Free-text location (district, street, ...). Filtering only looks at `city`.
    pub location: String,
    /// Ordered image references; the first one is the primary image.
    #[serde(default)]
    pub images: Vec<String>,
    pub condition: Option<String>,
    #[serde(default)]
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    /// Monotonic, incremented by the backend only.
    #[serde(default)]
    pub views_count: i64,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub is_urgent: bool,
    #[serde(default)]
    pub is_negotiable: bool,
}

impl Listing {
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    pub fn is_active(&self) -> bool {
        self.status == ListingStatus::Active
    }

    /// A minimal active listing for tests and fixtures.
    #[cfg(any(test, feature = "testing"))]
    pub fn sample(title: &str, price: Option<i64>) -> Self {
        Self {
            id: ListingId::generate(),
            user_id: UserId::from("seller-1"),
            title: title.to_string(),
            description: String::new(),
            price,
            currency: "XOF".to_string(),
            category_id: CategoryId::from("misc"),
            city: "Dakar".to_string(),
            location: String::new(),
            images: vec![format!("https://img.example/{}.jpg", title.len())],
            condition: None,
            status: ListingStatus::Active,
            created_at: Utc::now(),
            views_count: 0,
            is_featured: false,
            is_urgent: false,
            is_negotiable: false,
        }
    }
}

/// One row of a cart: a quantity of one listing, with a snapshot of the listing
/// taken when it was first added. The snapshot never auto-updates.
///
/// The serialized layout is the local storage format:
/// `{ id, ad_id, quantity, price, title, images }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub id: Uuid,
    #[serde(rename = "ad_id")]
    pub listing_id: ListingId,
    pub quantity: u32,
    /// Unit price captured at add-time; "contact for price" listings capture 0.
    #[serde(rename = "price")]
    pub unit_price: i64,
    pub title: String,
    #[serde(default)]
    pub images: Vec<String>,
}

impl CartLineItem {
    /// Snapshots a listing into a new line item with quantity 1.
    pub fn from_listing(listing: &Listing) -> Self {
        Self {
            id: Uuid::new_v4(),
            listing_id: listing.id.clone(),
            quantity: 1,
            unit_price: listing.price.unwrap_or(0),
            title: listing.title.clone(),
            images: listing.images.clone(),
        }
    }

    pub fn line_total(&self) -> i64 {
        self.unit_price.saturating_mul(i64::from(self.quantity))
    }

    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// A (user, listing) membership record. Existence is the only state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FavoriteEntry {
    pub user_id: UserId,
    #[serde(rename = "ad_id")]
    pub listing_id: ListingId,
}

/// Who is browsing. Supplied and invalidated by the external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "user_id")]
pub enum SessionIdentity {
    #[default]
    Guest,
    User(UserId),
}

impl SessionIdentity {
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Guest => None,
            Self::User(id) => Some(id),
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, Self::Guest)
    }
}

/// What happens to the in-memory (guest) cart when a user signs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartMergePolicy {
    /// Keep the guest cart verbatim and mirror it to the user's remote cart.
    #[default]
    KeepLocal,
    /// Union by listing id; quantities of shared listings are summed.
    Merge,
    /// A non-empty remote cart replaces the guest cart.
    PreferRemote,
}

/// User-facing notices; delivery (toasts, banners) is up to the `Notifier`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    AddedToCart { title: String },
    RemovedFromCart,
    CartCleared,
    FavoriteAdded,
    FavoriteRemoved,
    SignInRequired,
    Failure { message: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddedToCart { title } => write!(f, "{title} was added to your cart"),
            Self::RemovedFromCart => f.write_str("item removed from your cart"),
            Self::CartCleared => f.write_str("all items were removed from your cart"),
            Self::FavoriteAdded => f.write_str("added to favorites"),
            Self::FavoriteRemoved => f.write_str("removed from favorites"),
            Self::SignInRequired => f.write_str("sign in to manage favorites"),
            Self::Failure { message } => f.write_str(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_item_uses_local_storage_layout() {
        let item = CartLineItem {
            id: Uuid::nil(),
            listing_id: ListingId::from("ad-1"),
            quantity: 2,
            unit_price: 1500,
            title: "Lampe".into(),
            images: vec!["a.jpg".into()],
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "00000000-0000-0000-0000-000000000000",
                "ad_id": "ad-1",
                "quantity": 2,
                "price": 1500,
                "title": "Lampe",
                "images": ["a.jpg"],
            })
        );
    }

    #[test]
    fn test_unpriced_listing_snapshots_zero() {
        let listing = Listing::sample("Canapé", None);
        assert_eq!(CartLineItem::from_listing(&listing).unit_price, 0);
    }

    #[test]
    fn test_unknown_status_is_not_public() {
        assert_eq!(ListingStatus::parse("archived"), ListingStatus::Inactive);
        assert_eq!(ListingStatus::parse("sold"), ListingStatus::Sold);
    }
}
