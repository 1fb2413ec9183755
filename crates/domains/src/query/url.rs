//! URL state for the catalog view.
//!
//! `to_url_params` / `from_url_params` round-trip every reachable criteria value.
//! Defaults canonicalize to absence: the `newest` sort and the full price range
//! are never written.

use serde::{Deserialize, Serialize};

use crate::criteria::{FilterCriteria, PriceRange, SortKey};
use crate::error::{MarketError, Result};

/// Query parameters of the catalog browsing view, as they appear in the URL.
///
/// Every field is kept as raw text so that a hand-edited URL never fails to
/// parse; malformed values simply fall back to their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<String>,
    /// Comma-separated condition tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

impl CatalogParams {
    /// Parses a raw query string (with or without the leading `?`).
    pub fn from_query_string(raw: &str) -> Result<Self> {
        serde_urlencoded::from_str(raw.trim_start_matches('?'))
            .map_err(|e| MarketError::InvalidQuery(e.to_string()))
    }

    pub fn to_query_string(&self) -> Result<String> {
        serde_urlencoded::to_string(self).map_err(|e| MarketError::InvalidQuery(e.to_string()))
    }

    /// The set parameters as ordered key/value pairs.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        [
            ("q", &self.q),
            ("category", &self.category),
            ("sort", &self.sort),
            ("min_price", &self.min_price),
            ("max_price", &self.max_price),
            ("condition", &self.condition),
            ("city", &self.city),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.clone().map(|v| (key, v)))
        .collect()
    }
}

fn parse_price(raw: Option<&String>) -> Option<i64> {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
}

pub fn to_url_params(criteria: &FilterCriteria) -> CatalogParams {
    let price = criteria.price();
    let conditions = criteria.conditions();

    CatalogParams {
        q: criteria.search().map(str::to_string),
        category: criteria.category().map(ToString::to_string),
        sort: (criteria.sort() != SortKey::Newest).then(|| criteria.sort().as_url_value().to_string()),
        min_price: price.narrowed_min().map(|v| v.to_string()),
        max_price: price.narrowed_max().map(|v| v.to_string()),
        condition: (!conditions.is_empty())
            .then(|| conditions.iter().cloned().collect::<Vec<_>>().join(",")),
        city: criteria.location().map(str::to_string),
    }
}

pub fn from_url_params(params: &CatalogParams) -> FilterCriteria {
    let conditions = params
        .condition
        .as_deref()
        .map(|raw| raw.split(',').collect::<Vec<_>>())
        .unwrap_or_default();

    FilterCriteria::new()
        .with_search(params.q.as_deref().unwrap_or(""))
        .with_category(params.category.as_deref())
        .with_sort_param(params.sort.as_deref().unwrap_or(""))
        .with_price(PriceRange::from_bounds(
            parse_price(params.min_price.as_ref()),
            parse_price(params.max_price.as_ref()),
        ))
        .with_conditions(conditions)
        .with_location(params.city.as_deref().unwrap_or(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<FilterCriteria> {
        vec![
            FilterCriteria::new(),
            FilterCriteria::new().with_search("iphone 15"),
            FilterCriteria::new()
                .with_category(Some("phones"))
                .with_sort(SortKey::PriceAsc)
                .with_price_range(100_000, 500_000),
            FilterCriteria::new()
                .with_sort(SortKey::TitleAsc)
                .with_conditions(["Neuf", "Comme neuf"])
                .with_location("Saint-Louis")
                .with_price_range(5, 5),
            FilterCriteria::new().with_sort(SortKey::PriceDesc).with_price_range(0, 20),
            FilterCriteria::new().with_search("a&b=c, d").with_price_range(7, i64::MAX),
            FilterCriteria::new().with_conditions(["Bon état, peu servi", "Neuf"]),
        ]
    }

    #[test]
    fn test_round_trip_through_params() {
        for criteria in samples() {
            assert_eq!(from_url_params(&to_url_params(&criteria)), criteria);
        }
    }

    #[test]
    fn test_round_trip_through_query_string() {
        for criteria in samples() {
            let qs = to_url_params(&criteria).to_query_string().unwrap();
            let back = from_url_params(&CatalogParams::from_query_string(&qs).unwrap());
            assert_eq!(back, criteria, "query string {qs}");
        }
    }

    #[test]
    fn test_defaults_are_omitted() {
        assert_eq!(to_url_params(&FilterCriteria::new()), CatalogParams::default());
        let explicit_full = FilterCriteria::new().with_price_range(0, i64::MAX);
        assert!(to_url_params(&explicit_full).to_pairs().is_empty());
    }

    #[test]
    fn test_legacy_sort_spellings() {
        let params = CatalogParams::from_query_string("?q=velo&category=bikes&sort=title").unwrap();
        let criteria = from_url_params(&params);
        assert_eq!(criteria.search(), Some("velo"));
        assert_eq!(criteria.category().map(|c| c.as_str()), Some("bikes"));
        assert_eq!(criteria.sort(), SortKey::TitleAsc);
        assert_eq!(to_url_params(&criteria).sort.as_deref(), Some("title"));
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let params = CatalogParams::from_query_string("min_price=cheap&max_price=10&sort=hot").unwrap();
        let criteria = from_url_params(&params);
        assert_eq!(criteria.price().min(), 0);
        assert_eq!(criteria.price().max(), 10);
        assert_eq!(criteria.sort(), SortKey::Newest);
    }

    #[test]
    fn test_pairs_keep_parameter_order() {
        let criteria = FilterCriteria::new()
            .with_location("Dakar")
            .with_search("tv")
            .with_sort(SortKey::PriceDesc);
        let keys: Vec<_> = to_url_params(&criteria).to_pairs().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["q", "sort", "city"]);
    }
}
