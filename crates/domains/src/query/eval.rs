//! In-memory evaluation of a compiled query. Used by the memory backend and as
//! the reference semantics the SQL rendering has to agree with.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::{Direction, ListingField, Missing, Predicate, QuerySpec, SortClause};
use crate::models::Listing;

enum FieldValue<'a> {
    Text(&'a str),
    Number(Option<i64>),
    Time(DateTime<Utc>),
    Flag(bool),
}

fn field_value(listing: &Listing, field: ListingField) -> FieldValue<'_> {
    match field {
        ListingField::Id => FieldValue::Text(listing.id.as_str()),
        ListingField::Status => FieldValue::Text(listing.status.as_str()),
        ListingField::Title => FieldValue::Text(&listing.title),
        ListingField::Description => FieldValue::Text(&listing.description),
        ListingField::CategoryId => FieldValue::Text(listing.category_id.as_str()),
        ListingField::Condition => FieldValue::Text(listing.condition.as_deref().unwrap_or("")),
        ListingField::City => FieldValue::Text(&listing.city),
        ListingField::Price => FieldValue::Number(listing.price),
        ListingField::CreatedAt => FieldValue::Time(listing.created_at),
        ListingField::IsFeatured => FieldValue::Flag(listing.is_featured),
    }
}

fn text<'a>(listing: &'a Listing, field: ListingField) -> Option<&'a str> {
    match field_value(listing, field) {
        FieldValue::Text(value) => Some(value),
        _ => None,
    }
}

fn bounded(listing: &Listing, field: ListingField, missing: Missing, test: impl Fn(i64) -> bool) -> bool {
    match field_value(listing, field) {
        FieldValue::Number(Some(value)) => test(value),
        FieldValue::Number(None) => missing == Missing::Include,
        _ => false,
    }
}

impl Predicate {
    pub fn matches(&self, listing: &Listing) -> bool {
        match self {
            Self::Equals { field, value } => text(listing, *field) == Some(value.as_str()),
            Self::NotEquals { field, value } => text(listing, *field) != Some(value.as_str()),
            Self::Contains { field, needle } => text(listing, *field)
                .map(|haystack| haystack.to_lowercase().contains(&needle.to_lowercase()))
                .unwrap_or(false),
            Self::OneOf { field, values } => match field {
                // An unset condition is not a member of any condition set.
                ListingField::Condition if listing.condition.is_none() => false,
                _ => text(listing, *field)
                    .map(|v| values.iter().any(|candidate| candidate == v))
                    .unwrap_or(false),
            },
            Self::AtLeast {
                field,
                bound,
                missing,
            } => bounded(listing, *field, *missing, |v| v >= *bound),
            Self::AtMost {
                field,
                bound,
                missing,
            } => bounded(listing, *field, *missing, |v| v <= *bound),
            Self::Flag { field, value } => {
                matches!(field_value(listing, *field), FieldValue::Flag(flag) if flag == *value)
            }
            Self::AnyOf(inner) => inner.iter().any(|p| p.matches(listing)),
        }
    }
}

fn compare_by(clause: &SortClause, a: &Listing, b: &Listing) -> Ordering {
    match (field_value(a, clause.field), field_value(b, clause.field)) {
        // Missing numbers sort last whatever the direction.
        (FieldValue::Number(x), FieldValue::Number(y)) => match (x, y) {
            (Some(x), Some(y)) => directed(clause.direction, x.cmp(&y)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        (FieldValue::Text(x), FieldValue::Text(y)) if clause.case_insensitive => {
            directed(clause.direction, x.to_lowercase().cmp(&y.to_lowercase()))
        }
        (FieldValue::Text(x), FieldValue::Text(y)) => directed(clause.direction, x.cmp(y)),
        (FieldValue::Time(x), FieldValue::Time(y)) => directed(clause.direction, x.cmp(&y)),
        (FieldValue::Flag(x), FieldValue::Flag(y)) => directed(clause.direction, x.cmp(&y)),
        _ => Ordering::Equal,
    }
}

fn directed(direction: Direction, ordering: Ordering) -> Ordering {
    match direction {
        Direction::Asc => ordering,
        Direction::Desc => ordering.reverse(),
    }
}

impl QuerySpec {
    /// True when the listing satisfies every predicate.
    pub fn matches(&self, listing: &Listing) -> bool {
        self.predicates.iter().all(|p| p.matches(listing))
    }

    pub fn compare(&self, a: &Listing, b: &Listing) -> Ordering {
        self.order
            .iter()
            .map(|clause| compare_by(clause, a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Filters, sorts and windows `listings`.
    pub fn execute<'a, I>(&self, listings: I) -> Vec<Listing>
    where
        I: IntoIterator<Item = &'a Listing>,
    {
        let mut hits: Vec<&Listing> = listings.into_iter().filter(|l| self.matches(l)).collect();
        hits.sort_by(|a, b| self.compare(a, b));
        hits.into_iter()
            .skip(self.window.offset as usize)
            .take(self.window.limit as usize)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::criteria::{FilterCriteria, SortKey};
    use crate::models::{CategoryId, Listing, ListingStatus};
    use crate::query::{compile, PageWindow};

    fn phone(title: &str, price: Option<i64>, age_minutes: i64) -> Listing {
        let mut listing = Listing::sample(title, price);
        listing.category_id = CategoryId::from("phones");
        listing.created_at = chrono::Utc::now() - Duration::minutes(age_minutes);
        listing
    }

    #[test]
    fn test_inactive_listings_never_match() {
        let mut sold = phone("Nokia", Some(10), 1);
        sold.status = ListingStatus::Sold;
        let spec = compile(&FilterCriteria::new(), PageWindow::default());
        assert!(!spec.matches(&sold));
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let mut listing = phone("Samsung Galaxy", Some(10), 1);
        listing.description = "Écran intact".into();
        let by_title = compile(&FilterCriteria::new().with_search("GALAX"), PageWindow::default());
        let by_description = compile(&FilterCriteria::new().with_search("écran"), PageWindow::default());
        let miss = compile(&FilterCriteria::new().with_search("iphone"), PageWindow::default());
        assert!(by_title.matches(&listing));
        assert!(by_description.matches(&listing));
        assert!(!miss.matches(&listing));
    }

    #[test]
    fn test_unpriced_listing_only_matches_default_range() {
        let unpriced = phone("Contact me", None, 1);
        let open = compile(&FilterCriteria::new(), PageWindow::default());
        let narrowed = compile(&FilterCriteria::new().with_price_range(0, 1_000), PageWindow::default());
        assert!(open.matches(&unpriced));
        assert!(!narrowed.matches(&unpriced));
    }

    #[test]
    fn test_price_desc_puts_unpriced_last() {
        let listings = vec![
            phone("a", None, 1),
            phone("b", Some(5), 2),
            phone("c", Some(9), 3),
        ];
        let spec = compile(&FilterCriteria::new().with_sort(SortKey::PriceDesc), PageWindow::default());
        let titles: Vec<_> = spec.execute(&listings).into_iter().map(|l| l.title).collect();
        assert_eq!(titles, ["c", "b", "a"]);
    }

    #[test]
    fn test_equal_prices_break_ties_by_newest() {
        let listings = vec![phone("old", Some(5), 10), phone("new", Some(5), 1)];
        let spec = compile(&FilterCriteria::new().with_sort(SortKey::PriceAsc), PageWindow::default());
        let titles: Vec<_> = spec.execute(&listings).into_iter().map(|l| l.title).collect();
        assert_eq!(titles, ["new", "old"]);
    }

    #[test]
    fn test_title_sort_ignores_case() {
        let listings = vec![phone("banane", None, 1), phone("Abricot", None, 2), phone("cerise", None, 3)];
        let spec = compile(&FilterCriteria::new().with_sort(SortKey::TitleAsc), PageWindow::default());
        let titles: Vec<_> = spec.execute(&listings).into_iter().map(|l| l.title).collect();
        assert_eq!(titles, ["Abricot", "banane", "cerise"]);
    }
}
