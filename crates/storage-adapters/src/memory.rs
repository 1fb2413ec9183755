//! In-process adapters backed by `dashmap`.

use async_trait::async_trait;
use dashmap::DashMap;
use domains::{
    CartLineItem, Category, CategoryId, FavoritesRepo, Listing, ListingId, ListingRepo, LocalStorage, QuerySpec,
    RemoteCartRepo, UserId,
};

/// Key/value storage that lives as long as the process.
#[derive(Default)]
pub struct MemoryLocalStorage {
    entries: DashMap<String, String>,
}

impl MemoryLocalStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalStorage for MemoryLocalStorage {
    async fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> anyhow::Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// A whole backend in memory: listings, categories, favorites and remote carts.
///
/// Catalog queries are answered by scanning every listing with
/// [`QuerySpec::execute`].
#[derive(Default)]
pub struct MemoryBackend {
    listings: DashMap<ListingId, Listing>,
    categories: DashMap<CategoryId, Category>,
    favorites: DashMap<UserId, Vec<ListingId>>,
    carts: DashMap<UserId, Vec<CartLineItem>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_listing(&self, listing: Listing) {
        self.listings.insert(listing.id.clone(), listing);
    }

    pub fn insert_category(&self, category: Category) {
        self.categories.insert(category.id.clone(), category);
    }

    /// Number of favorite pairs stored for `user_id`.
    pub fn favorite_count(&self, user_id: &UserId) -> usize {
        self.favorites.get(user_id).map(|f| f.len()).unwrap_or(0)
    }

    /// The stored remote cart, without going through the port.
    pub fn stored_cart(&self, user_id: &UserId) -> Vec<CartLineItem> {
        self.carts.get(user_id).map(|c| c.value().clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ListingRepo for MemoryBackend {
    async fn get_listing(&self, id: &ListingId) -> anyhow::Result<Option<Listing>> {
        Ok(self.listings.get(id).map(|l| l.value().clone()))
    }

    async fn query_listings(&self, query: &QuerySpec) -> anyhow::Result<Vec<Listing>> {
        let snapshot: Vec<Listing> = self.listings.iter().map(|l| l.value().clone()).collect();
        Ok(query.execute(&snapshot))
    }

    async fn increment_views(&self, id: &ListingId) -> anyhow::Result<()> {
        if let Some(mut listing) = self.listings.get_mut(id) {
            listing.views_count += 1;
        }
        Ok(())
    }

    async fn list_categories(&self) -> anyhow::Result<Vec<Category>> {
        Ok(self.categories.iter().map(|c| c.value().clone()).collect())
    }
}

#[async_trait]
impl FavoritesRepo for MemoryBackend {
    async fn list_favorites(&self, user_id: &UserId) -> anyhow::Result<Vec<ListingId>> {
        Ok(self.favorites.get(user_id).map(|f| f.value().clone()).unwrap_or_default())
    }

    async fn add_favorite(&self, user_id: &UserId, listing_id: &ListingId) -> anyhow::Result<()> {
        let mut entry = self.favorites.entry(user_id.clone()).or_default();
        if !entry.contains(listing_id) {
            entry.push(listing_id.clone());
        }
        Ok(())
    }

    async fn remove_favorite(&self, user_id: &UserId, listing_id: &ListingId) -> anyhow::Result<()> {
        if let Some(mut entry) = self.favorites.get_mut(user_id) {
            entry.retain(|id| id != listing_id);
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteCartRepo for MemoryBackend {
    async fn load_cart(&self, user_id: &UserId) -> anyhow::Result<Vec<CartLineItem>> {
        Ok(self.stored_cart(user_id))
    }

    async fn replace_cart(&self, user_id: &UserId, items: &[CartLineItem]) -> anyhow::Result<()> {
        self.carts.insert(user_id.clone(), items.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{compile, FilterCriteria, PageWindow};

    #[tokio::test]
    async fn test_local_storage_overwrites_and_removes() {
        let storage = MemoryLocalStorage::new();
        storage.set_item("cart", "[]").await.unwrap();
        storage.set_item("cart", "[1]").await.unwrap();
        assert_eq!(storage.get_item("cart").await.unwrap().as_deref(), Some("[1]"));

        storage.remove_item("cart").await.unwrap();
        assert_eq!(storage.get_item("cart").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_favorites_are_idempotent() {
        let backend = MemoryBackend::new();
        let user = UserId::from("u-1");
        let ad = ListingId::from("ad-1");

        backend.add_favorite(&user, &ad).await.unwrap();
        backend.add_favorite(&user, &ad).await.unwrap();
        assert_eq!(backend.favorite_count(&user), 1);

        backend.remove_favorite(&user, &ad).await.unwrap();
        backend.remove_favorite(&user, &ad).await.unwrap();
        assert_eq!(backend.favorite_count(&user), 0);
    }

    #[tokio::test]
    async fn test_query_scans_listings() {
        let backend = MemoryBackend::new();
        backend.insert_listing(Listing::sample("Phone X", Some(150_000)));
        backend.insert_listing(Listing::sample("Sofa", Some(90_000)));

        let query = compile(&FilterCriteria::new().with_search("phone"), PageWindow::default());
        let rows = backend.query_listings(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Phone X");
    }
}
