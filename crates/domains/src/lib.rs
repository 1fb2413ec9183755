//! rusty-market/crates/domains/src/lib.rs
//!
//! The central domain model and interface definitions for Rusty-Market:
//! listings and categories, the catalog filter model and its query compiler,
//! cart/favorites value types and the persistence ports the stores talk to.

pub mod category;
pub mod criteria;
pub mod error;
pub mod models;
pub mod ports;
pub mod query;

// Re-exporting for easier access in other crates
pub use category::*;
pub use criteria::*;
pub use error::*;
pub use models::*;
pub use ports::*;
pub use query::*;

#[cfg(test)]
mod tests {
    use super::models::*;

    #[test]
    fn test_line_item_snapshot_from_listing() {
        let listing = Listing::sample("Vélo de course", Some(85_000));
        let item = CartLineItem::from_listing(&listing);

        assert_eq!(item.listing_id, listing.id);
        assert_eq!(item.quantity, 1);
        assert_eq!(item.unit_price, 85_000);
        assert_eq!(item.title, "Vélo de course");
        assert_eq!(item.line_total(), 85_000);
    }
}
