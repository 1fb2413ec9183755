//! # Catalog Query Compiler
//!
//! Turns [`FilterCriteria`] into a backend-neutral [`QuerySpec`]: an ordered
//! conjunction of typed predicates, a sort clause list and a result window.
//! Storage adapters render a `QuerySpec` into whatever their backend speaks
//! (SQL, an in-memory scan, ...). Compilation is pure and stateless.

mod eval;
mod url;

pub use url::{from_url_params, to_url_params, CatalogParams};

use serde::Serialize;

use crate::criteria::{FilterCriteria, SortKey};
use crate::models::{ListingId, ListingStatus};

/// Listing fields a query may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingField {
    Id,
    Status,
    Title,
    Description,
    CategoryId,
    Condition,
    City,
    Price,
    CreatedAt,
    IsFeatured,
}

impl ListingField {
    /// Column / attribute name in the backend listing collection.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Status => "status",
            Self::Title => "title",
            Self::Description => "description",
            Self::CategoryId => "category_id",
            Self::Condition => "condition",
            Self::City => "city",
            Self::Price => "price",
            Self::CreatedAt => "created_at",
            Self::IsFeatured => "is_featured",
        }
    }
}

/// How a bound treats listings that have no value for the field (unpriced ads).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Missing {
    Include,
    Exclude,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum Predicate {
    /// Exact text equality.
    Equals { field: ListingField, value: String },
    NotEquals { field: ListingField, value: String },
    /// Case-insensitive substring match, anywhere in the field.
    Contains { field: ListingField, needle: String },
    /// Set membership. An empty set matches nothing.
    OneOf {
        field: ListingField,
        values: Vec<String>,
    },
    /// `field >= bound`, inclusive.
    AtLeast {
        field: ListingField,
        bound: i64,
        missing: Missing,
    },
    /// `field <= bound`, inclusive.
    AtMost {
        field: ListingField,
        bound: i64,
        missing: Missing,
    },
    Flag { field: ListingField, value: bool },
    /// Disjunction of the inner predicates.
    AnyOf(Vec<Predicate>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SortClause {
    pub field: ListingField,
    pub direction: Direction,
    pub case_insensitive: bool,
}

impl SortClause {
    pub fn asc(field: ListingField) -> Self {
        Self {
            field,
            direction: Direction::Asc,
            case_insensitive: false,
        }
    }

    pub fn desc(field: ListingField) -> Self {
        Self {
            field,
            direction: Direction::Desc,
            case_insensitive: false,
        }
    }

    pub fn ignoring_case(mut self) -> Self {
        self.case_insensitive = true;
        self
    }
}

/// Result window: `limit` rows starting at `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PageWindow {
    pub offset: u32,
    pub limit: u32,
}

impl PageWindow {
    pub const DEFAULT_LIMIT: u32 = 24;

    /// A zero limit is bumped to 1; a window always returns something if rows exist.
    pub fn new(offset: u32, limit: u32) -> Self {
        Self {
            offset,
            limit: limit.max(1),
        }
    }

    /// One-based page numbers; page 0 is treated as page 1.
    pub fn page(page: u32, page_size: u32) -> Self {
        let size = page_size.max(1);
        Self::new(page.saturating_sub(1).saturating_mul(size), size)
    }

    pub fn first(limit: u32) -> Self {
        Self::new(0, limit)
    }
}

impl Default for PageWindow {
    fn default() -> Self {
        Self::first(Self::DEFAULT_LIMIT)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuerySpec {
    /// ANDed together, in compilation order.
    pub predicates: Vec<Predicate>,
    /// Primary key first, tie-breakers last.
    pub order: Vec<SortClause>,
    pub window: PageWindow,
}

/// Typed builder for [`QuerySpec`]. Always scoped to active listings and always
/// closed with deterministic tie-breakers (`created_at DESC, id ASC`) so that
/// pagination over equal sort values is stable.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    predicates: Vec<Predicate>,
    primary: Option<SortClause>,
    window: PageWindow,
}

impl QueryBuilder {
    pub fn active_listings() -> Self {
        Self {
            predicates: vec![Predicate::Equals {
                field: ListingField::Status,
                value: ListingStatus::Active.as_str().to_string(),
            }],
            primary: None,
            window: PageWindow::default(),
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn order_by(mut self, clause: SortClause) -> Self {
        self.primary = Some(clause);
        self
    }

    pub fn window(mut self, window: PageWindow) -> Self {
        self.window = window;
        self
    }

    pub fn build(self) -> QuerySpec {
        let primary = self
            .primary
            .unwrap_or_else(|| SortClause::desc(ListingField::CreatedAt));
        let mut order = vec![primary];
        for tie_breaker in [
            SortClause::desc(ListingField::CreatedAt),
            SortClause::asc(ListingField::Id),
        ] {
            if !order.iter().any(|c| c.field == tie_breaker.field) {
                order.push(tie_breaker);
            }
        }
        QuerySpec {
            predicates: self.predicates,
            order,
            window: self.window,
        }
    }
}

fn sort_clause(sort: SortKey) -> SortClause {
    match sort {
        SortKey::Newest => SortClause::desc(ListingField::CreatedAt),
        SortKey::PriceAsc => SortClause::asc(ListingField::Price),
        SortKey::PriceDesc => SortClause::desc(ListingField::Price),
        SortKey::TitleAsc => SortClause::asc(ListingField::Title).ignoring_case(),
    }
}

/// Compiles criteria into a query over active listings.
pub fn compile(criteria: &FilterCriteria, window: PageWindow) -> QuerySpec {
    let mut builder = QueryBuilder::active_listings().window(window);

    if let Some(term) = criteria.search() {
        builder = builder.filter(Predicate::AnyOf(vec![
            Predicate::Contains {
                field: ListingField::Title,
                needle: term.to_string(),
            },
            Predicate::Contains {
                field: ListingField::Description,
                needle: term.to_string(),
            },
        ]));
    }

    if let Some(category) = criteria.category() {
        builder = builder.filter(Predicate::Equals {
            field: ListingField::CategoryId,
            value: category.to_string(),
        });
    }

    if !criteria.conditions().is_empty() {
        builder = builder.filter(Predicate::OneOf {
            field: ListingField::Condition,
            values: criteria.conditions().iter().cloned().collect(),
        });
    }

    if let Some(city) = criteria.location() {
        builder = builder.filter(Predicate::Contains {
            field: ListingField::City,
            needle: city.to_string(),
        });
    }

    // Unpriced listings only survive the untouched default range.
    let price = criteria.price();
    let missing = if price.is_full() {
        Missing::Include
    } else {
        Missing::Exclude
    };
    builder = builder
        .filter(Predicate::AtLeast {
            field: ListingField::Price,
            bound: price.min(),
            missing,
        })
        .filter(Predicate::AtMost {
            field: ListingField::Price,
            bound: price.max(),
            missing,
        });

    builder.order_by(sort_clause(criteria.sort())).build()
}

/// Active listings whose id is in `ids`, newest first.
pub fn listings_by_ids(ids: &[ListingId], window: PageWindow) -> QuerySpec {
    QueryBuilder::active_listings()
        .filter(Predicate::OneOf {
            field: ListingField::Id,
            values: ids.iter().map(ToString::to_string).collect(),
        })
        .window(window)
        .build()
}
