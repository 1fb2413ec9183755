//! # Filter Criteria
//!
//! The value object describing the current catalog view. Every mutator consumes
//! the criteria and hands back a fully valid one: blank strings become "unset",
//! price bounds are clamped and put in order, unknown sort keys fall back to
//! [`SortKey::Newest`]. Fields are independent predicates, so no combination is
//! invalid.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::CategoryId;

/// Lowest legal price bound.
pub const PRICE_FLOOR: i64 = 0;
/// Highest legal price bound; the default range spans `PRICE_FLOOR..=PRICE_CEILING`.
pub const PRICE_CEILING: i64 = i64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    TitleAsc,
}

impl SortKey {
    /// Lenient parse: accepts both the URL spellings (`created_at`, `title`) and
    /// the canonical ones. Anything else is `Newest`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "price_asc" => Self::PriceAsc,
            "price_desc" => Self::PriceDesc,
            "title" | "title_asc" => Self::TitleAsc,
            _ => Self::Newest,
        }
    }

    /// The `sort` URL parameter value.
    pub fn as_url_value(&self) -> &'static str {
        match self {
            Self::Newest => "created_at",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::TitleAsc => "title",
        }
    }
}

/// Inclusive price bounds with `min <= max`, both within the legal range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceRange {
    min: i64,
    max: i64,
}

impl Default for PriceRange {
    fn default() -> Self {
        Self::full()
    }
}

impl PriceRange {
    /// Clamps both bounds into the legal range and swaps them if out of order.
    pub fn new(min: i64, max: i64) -> Self {
        let a = min.clamp(PRICE_FLOOR, PRICE_CEILING);
        let b = max.clamp(PRICE_FLOOR, PRICE_CEILING);
        if a <= b {
            Self { min: a, max: b }
        } else {
            Self { min: b, max: a }
        }
    }

    pub fn full() -> Self {
        Self {
            min: PRICE_FLOOR,
            max: PRICE_CEILING,
        }
    }

    /// Builds a range from optional bounds, an absent bound meaning "no limit".
    pub fn from_bounds(min: Option<i64>, max: Option<i64>) -> Self {
        Self::new(min.unwrap_or(PRICE_FLOOR), max.unwrap_or(PRICE_CEILING))
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    /// True when no bound is narrower than the default.
    pub fn is_full(&self) -> bool {
        self.min == PRICE_FLOOR && self.max == PRICE_CEILING
    }

    /// Lower bound if it narrows the default range.
    pub fn narrowed_min(&self) -> Option<i64> {
        (self.min != PRICE_FLOOR).then_some(self.min)
    }

    /// Upper bound if it narrows the default range.
    pub fn narrowed_max(&self) -> Option<i64> {
        (self.max != PRICE_CEILING).then_some(self.max)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    search: Option<String>,
    category: Option<CategoryId>,
    price: PriceRange,
    conditions: BTreeSet<String>,
    location: Option<String>,
    sort: SortKey,
}

fn non_blank(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Condition tags never contain a comma: `"a, b"` is the two tags `a` and `b`.
fn condition_tags(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(',').filter_map(non_blank)
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, term: &str) -> Self {
        self.search = non_blank(term);
        self
    }

    pub fn with_category(mut self, category: Option<&str>) -> Self {
        self.category = category.and_then(non_blank).map(CategoryId::from);
        self
    }

    pub fn with_price_range(mut self, min: i64, max: i64) -> Self {
        self.price = PriceRange::new(min, max);
        self
    }

    pub fn with_price(mut self, price: PriceRange) -> Self {
        self.price = price;
        self
    }

    /// Replaces the accepted condition set. Blank tags are ignored and a
    /// comma separates tags.
    pub fn with_conditions<I, S>(mut self, conditions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.conditions = conditions
            .into_iter()
            .flat_map(|c| condition_tags(c.as_ref()).collect::<Vec<_>>())
            .collect();
        self
    }

    /// Checkbox semantics: adds the tag if absent, removes it if present.
    pub fn with_condition_toggled(mut self, condition: &str) -> Self {
        for tag in condition_tags(condition) {
            if !self.conditions.remove(&tag) {
                self.conditions.insert(tag);
            }
        }
        self
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = non_blank(location);
        self
    }

    pub fn with_sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_sort_param(self, raw: &str) -> Self {
        self.with_sort(SortKey::parse(raw))
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn category(&self) -> Option<&CategoryId> {
        self.category.as_ref()
    }

    pub fn price(&self) -> PriceRange {
        self.price
    }

    pub fn conditions(&self) -> &BTreeSet<String> {
        &self.conditions
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn sort(&self) -> SortKey {
        self.sort
    }

    /// True when nothing narrows the catalog (sorting aside).
    pub fn is_unfiltered(&self) -> bool {
        self.search.is_none()
            && self.category.is_none()
            && self.price.is_full()
            && self.conditions.is_empty()
            && self.location.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_price_bounds_are_swapped() {
        let c = FilterCriteria::new().with_price_range(500_000, 100_000);
        assert_eq!(c.price().min(), 100_000);
        assert_eq!(c.price().max(), 500_000);
    }

    #[test]
    fn test_negative_bounds_are_clamped() {
        let range = PriceRange::new(-50, -10);
        assert_eq!((range.min(), range.max()), (0, 0));
        assert!(!range.is_full());
    }

    #[test]
    fn test_blank_strings_unset_fields() {
        let c = FilterCriteria::new()
            .with_search("  phone ")
            .with_location("   ")
            .with_category(Some(""));
        assert_eq!(c.search(), Some("phone"));
        assert_eq!(c.location(), None);
        assert_eq!(c.category(), None);
    }

    #[test]
    fn test_unknown_sort_falls_back_to_newest() {
        assert_eq!(SortKey::parse("popularity"), SortKey::Newest);
        assert_eq!(SortKey::parse("title"), SortKey::TitleAsc);
        assert_eq!(SortKey::parse("PRICE_DESC"), SortKey::PriceDesc);
    }

    #[test]
    fn test_condition_toggle() {
        let c = FilterCriteria::new()
            .with_condition_toggled("Neuf")
            .with_condition_toggled("Bon état")
            .with_condition_toggled("Neuf");
        assert_eq!(c.conditions().iter().collect::<Vec<_>>(), ["Bon état"]);
    }

    #[test]
    fn test_commas_separate_condition_tags() {
        let c = FilterCriteria::new().with_conditions(["Bon état, peu servi", " ,"]);
        assert_eq!(c.conditions().iter().collect::<Vec<_>>(), ["Bon état", "peu servi"]);

        let c = c.with_condition_toggled("peu servi,Neuf");
        assert_eq!(c.conditions().iter().collect::<Vec<_>>(), ["Bon état", "Neuf"]);
    }
}
