//! Catalog reads: browsing, detail pages and the small listing rails around them.

use std::sync::Arc;
use std::time::Duration;

use domains::{
    compile, from_url_params, listings_by_ids, CatalogParams, CategoryId, CategoryTree, FilterCriteria, Listing,
    ListingField, ListingId, ListingRepo, MarketError, PageWindow, Predicate, QueryBuilder, QuerySpec, Result,
};
use tracing::{debug, warn};

use crate::bounded::bounded;

pub const RELATED_LIMIT: u32 = 4;
pub const RECENT_LIMIT: u32 = 8;

pub struct CatalogService {
    listings: Arc<dyn ListingRepo>,
    timeout: Duration,
    page_size: u32,
    max_page_size: u32,
}

impl CatalogService {
    pub fn new(listings: Arc<dyn ListingRepo>, timeout: Duration) -> Self {
        Self {
            listings,
            timeout,
            page_size: PageWindow::DEFAULT_LIMIT,
            max_page_size: 100,
        }
    }

    /// Overrides the default page size; `max_page_size` caps it.
    pub fn with_page_size(mut self, page_size: u32, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size.max(1);
        self.page_size = page_size.clamp(1, self.max_page_size);
        self
    }

    /// Window for a one-based page number.
    pub fn window(&self, page: u32) -> PageWindow {
        PageWindow::page(page, self.page_size)
    }

    async fn run(&self, operation: &'static str, query: &QuerySpec) -> Result<Vec<Listing>> {
        bounded(self.timeout, operation, self.listings.query_listings(query))
            .await
            .map_err(|e| {
                warn!(operation, error = %e, "catalog query failed");
                MarketError::CatalogUnavailable(e.to_string())
            })
    }

    pub async fn browse(&self, criteria: &FilterCriteria, window: PageWindow) -> Result<Vec<Listing>> {
        let query = compile(criteria, window);
        debug!(predicates = query.predicates.len(), offset = window.offset, "browse");
        self.run("browse listings", &query).await
    }

    /// Decodes a catalog query string and browses the given page.
    pub async fn browse_params(&self, query_string: &str, page: u32) -> Result<Vec<Listing>> {
        let params = CatalogParams::from_query_string(query_string)?;
        self.browse(&from_url_params(&params), self.window(page)).await
    }

    /// An active listing by id, with its view counter bumped.
    pub async fn listing_detail(&self, id: &ListingId) -> Result<Option<Listing>> {
        let listing = bounded(self.timeout, "read listing", self.listings.get_listing(id))
            .await
            .map_err(|e| MarketError::CatalogUnavailable(e.to_string()))?;

        let Some(listing) = listing.filter(Listing::is_active) else {
            return Ok(None);
        };

        if let Err(e) = bounded(self.timeout, "increment views", self.listings.increment_views(id)).await {
            debug!(listing_id = %id, error = %e, "view counter not updated");
        }
        Ok(Some(listing))
    }

    /// Other active listings in the same category, newest first.
    pub async fn related_listings(&self, listing: &Listing) -> Result<Vec<Listing>> {
        let query = QueryBuilder::active_listings()
            .filter(Predicate::Equals {
                field: ListingField::CategoryId,
                value: listing.category_id.to_string(),
            })
            .filter(Predicate::NotEquals {
                field: ListingField::Id,
                value: listing.id.to_string(),
            })
            .window(PageWindow::first(RELATED_LIMIT))
            .build();
        self.run("related listings", &query).await
    }

    /// Newest active listings that are not featured.
    pub async fn recent_listings(&self) -> Result<Vec<Listing>> {
        let query = QueryBuilder::active_listings()
            .filter(Predicate::Flag {
                field: ListingField::IsFeatured,
                value: false,
            })
            .window(PageWindow::first(RECENT_LIMIT))
            .build();
        self.run("recent listings", &query).await
    }

    pub async fn favorite_listings(&self, ids: &[ListingId]) -> Result<Vec<Listing>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let limit = u32::try_from(ids.len()).unwrap_or(u32::MAX);
        self.run("favorite listings", &listings_by_ids(ids, PageWindow::first(limit)))
            .await
    }

    pub async fn category_tree(&self) -> Result<CategoryTree> {
        let categories = bounded(self.timeout, "list categories", self.listings.list_categories())
            .await
            .map_err(|e| MarketError::CatalogUnavailable(e.to_string()))?;
        Ok(CategoryTree::build(categories))
    }

    pub async fn resolve_category(&self, slug: &str, sub_slug: Option<&str>) -> Result<Option<CategoryId>> {
        Ok(self.category_tree().await?.resolve(slug, sub_slug))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use domains::{ListingStatus, MockListingRepo};

    fn service(repo: MockListingRepo) -> CatalogService {
        CatalogService::new(Arc::new(repo), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_detail_hides_inactive_listings() {
        let mut sold = Listing::sample("Table", Some(9_000));
        sold.status = ListingStatus::Sold;
        let mut repo = MockListingRepo::new();
        repo.expect_get_listing().returning(move |_| Ok(Some(sold.clone())));
        repo.expect_increment_views().never();

        let found = service(repo).listing_detail(&ListingId::from("x")).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_detail_ignores_view_counter_failure() {
        let listing = Listing::sample("Table", Some(9_000));
        let expected = listing.clone();
        let mut repo = MockListingRepo::new();
        repo.expect_get_listing().returning(move |_| Ok(Some(listing.clone())));
        repo.expect_increment_views()
            .times(1)
            .returning(|_| Err(anyhow!("rpc missing")));

        let found = service(repo).listing_detail(&expected.id).await.unwrap();
        assert_eq!(found, Some(expected));
    }

    #[tokio::test]
    async fn test_related_excludes_self() {
        let listing = Listing::sample("Chaise", Some(3_000));
        let own_id = listing.id.to_string();
        let mut repo = MockListingRepo::new();
        repo.expect_query_listings()
            .withf(move |q| {
                q.window.limit == RELATED_LIMIT
                    && q.predicates.contains(&Predicate::NotEquals {
                        field: ListingField::Id,
                        value: own_id.clone(),
                    })
            })
            .returning(|_| Ok(vec![]));

        service(repo).related_listings(&listing).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_favorites_skip_backend() {
        let mut repo = MockListingRepo::new();
        repo.expect_query_listings().never();
        let rows = service(repo).favorite_listings(&[]).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_maps_to_catalog_unavailable() {
        let mut repo = MockListingRepo::new();
        repo.expect_query_listings()
            .returning(|_| Err(anyhow!("connection refused")));
        let err = service(repo).recent_listings().await.unwrap_err();
        assert!(matches!(err, MarketError::CatalogUnavailable(_)));
    }

    #[tokio::test]
    async fn test_browse_params_pages_with_configured_size() {
        let mut repo = MockListingRepo::new();
        repo.expect_query_listings()
            .withf(|q| q.window == PageWindow::new(20, 10))
            .returning(|_| Ok(vec![]));
        let catalog = service(repo).with_page_size(10, 50);
        catalog.browse_params("?q=phone&sort=price_asc", 3).await.unwrap();
    }
}
