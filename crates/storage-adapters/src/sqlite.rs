//! # SQLite backend
//!
//! Maps the listing, category, favorite and cart collections onto SQLite and
//! renders compiled [`QuerySpec`]s into SQL with `sqlx::QueryBuilder`.
//!
//! Timestamps are stored as `*_ms` integer columns (milliseconds since the
//! epoch), image lists as JSON text, ids as text.
//!
//! SQLite's `LOWER()` and `NOCASE` fold ASCII only. Searchable text columns
//! therefore carry a `*_fold` shadow column written with [`str::to_lowercase`]
//! on every upsert; case-insensitive matching and sorting read those.

use std::str::FromStr;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    CartLineItem, Category, CategoryId, Direction, FavoritesRepo, Listing, ListingField, ListingId, ListingRepo,
    ListingStatus, Missing, Predicate, QuerySpec, RemoteCartRepo, SortClause, UserId,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder as SqlBuilder, Row, Sqlite};
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA: [&str; 6] = [
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE,
        parent_id TEXT,
        display_order INTEGER NOT NULL DEFAULT 0,
        is_active INTEGER NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS listings (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        price INTEGER,
        currency TEXT NOT NULL DEFAULT 'XOF',
        category_id TEXT NOT NULL,
        city TEXT NOT NULL DEFAULT '',
        location TEXT NOT NULL DEFAULT '',
        images TEXT NOT NULL DEFAULT '[]',
        "condition" TEXT,
        status TEXT NOT NULL DEFAULT 'active',
        created_at_ms INTEGER NOT NULL,
        views_count INTEGER NOT NULL DEFAULT 0,
        is_featured INTEGER NOT NULL DEFAULT 0,
        is_urgent INTEGER NOT NULL DEFAULT 0,
        is_negotiable INTEGER NOT NULL DEFAULT 0,
        title_fold TEXT NOT NULL DEFAULT '',
        description_fold TEXT NOT NULL DEFAULT '',
        city_fold TEXT NOT NULL DEFAULT '',
        condition_fold TEXT NOT NULL DEFAULT ''
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_listings_status_created ON listings(status, created_at_ms)",
    r#"
    CREATE TABLE IF NOT EXISTS favorites (
        user_id TEXT NOT NULL,
        listing_id TEXT NOT NULL,
        created_at_ms INTEGER NOT NULL,
        UNIQUE(user_id, listing_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cart_items (
        user_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        id TEXT NOT NULL,
        listing_id TEXT NOT NULL,
        quantity INTEGER NOT NULL,
        unit_price INTEGER NOT NULL,
        title TEXT NOT NULL,
        images TEXT NOT NULL DEFAULT '[]',
        PRIMARY KEY (user_id, position)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_cart_items_user ON cart_items(user_id)",
];

pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Opens (creating if needed) the database at `url` and applies the schema.
    ///
    /// `sqlite::memory:` databases live in a single connection that is never
    /// recycled; every other connection would see its own empty database.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| "invalid sqlite url")?
            .create_if_missing(true);

        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .context("connect to sqlite")?;
        let backend = Self { pool };
        backend.migrate().await?;
        Ok(backend)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("sqlite schema ready");
        Ok(())
    }

    pub async fn upsert_category(&self, category: &Category) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO categories (id, name, slug, parent_id, display_order, is_active) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(category.id.as_str())
        .bind(&category.name)
        .bind(&category.slug)
        .bind(category.parent_id.as_ref().map(CategoryId::as_str))
        .bind(category.display_order)
        .bind(category.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_listing(&self, listing: &Listing) -> anyhow::Result<()> {
        sqlx::query(
            r#"INSERT OR REPLACE INTO listings
               (id, user_id, title, description, price, currency, category_id, city, location, images,
                "condition", status, created_at_ms, views_count, is_featured, is_urgent, is_negotiable,
                title_fold, description_fold, city_fold, condition_fold)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(listing.id.as_str())
        .bind(listing.user_id.as_str())
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(listing.price)
        .bind(&listing.currency)
        .bind(listing.category_id.as_str())
        .bind(&listing.city)
        .bind(&listing.location)
        .bind(serde_json::to_string(&listing.images)?)
        .bind(listing.condition.as_deref())
        .bind(listing.status.as_str())
        .bind(listing.created_at.timestamp_millis())
        .bind(listing.views_count)
        .bind(listing.is_featured)
        .bind(listing.is_urgent)
        .bind(listing.is_negotiable)
        .bind(listing.title.to_lowercase())
        .bind(listing.description.to_lowercase())
        .bind(listing.city.to_lowercase())
        .bind(listing.condition.as_deref().unwrap_or_default().to_lowercase())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn from_millis(ms: i64) -> anyhow::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).with_context(|| format!("timestamp out of range: {ms}"))
}

fn listing_from_row(row: &SqliteRow) -> anyhow::Result<Listing> {
    Ok(Listing {
        id: ListingId::new(row.try_get::<String, _>("id")?),
        user_id: UserId::new(row.try_get::<String, _>("user_id")?),
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        price: row.try_get("price")?,
        currency: row.try_get("currency")?,
        category_id: CategoryId::new(row.try_get::<String, _>("category_id")?),
        city: row.try_get("city")?,
        location: row.try_get("location")?,
        images: serde_json::from_str(&row.try_get::<String, _>("images")?).unwrap_or_default(),
        condition: row.try_get("condition")?,
        status: ListingStatus::parse(&row.try_get::<String, _>("status")?),
        created_at: from_millis(row.try_get("created_at_ms")?)?,
        views_count: row.try_get("views_count")?,
        is_featured: row.try_get("is_featured")?,
        is_urgent: row.try_get("is_urgent")?,
        is_negotiable: row.try_get("is_negotiable")?,
    })
}

fn category_from_row(row: &SqliteRow) -> anyhow::Result<Category> {
    Ok(Category {
        id: CategoryId::new(row.try_get::<String, _>("id")?),
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        parent_id: row.try_get::<Option<String>, _>("parent_id")?.map(CategoryId::new),
        display_order: row.try_get("display_order")?,
        is_active: row.try_get("is_active")?,
    })
}

fn line_item_from_row(row: &SqliteRow) -> anyhow::Result<CartLineItem> {
    let quantity: i64 = row.try_get("quantity")?;
    Ok(CartLineItem {
        id: Uuid::parse_str(&row.try_get::<String, _>("id")?)?,
        listing_id: ListingId::new(row.try_get::<String, _>("listing_id")?),
        quantity: u32::try_from(quantity).context("cart quantity out of range")?,
        unit_price: row.try_get("unit_price")?,
        title: row.try_get("title")?,
        images: serde_json::from_str(&row.try_get::<String, _>("images")?).unwrap_or_default(),
    })
}

// ============================================================================
// Query rendering
// ============================================================================

fn column(field: ListingField) -> &'static str {
    match field {
        ListingField::CreatedAt => "created_at_ms",
        ListingField::Condition => "\"condition\"",
        other => other.column(),
    }
}

fn is_text(field: ListingField) -> bool {
    !matches!(
        field,
        ListingField::Price | ListingField::CreatedAt | ListingField::IsFeatured
    )
}

/// Text view of a column. An unset condition reads as the empty string.
fn text_expr(field: ListingField) -> String {
    match field {
        ListingField::Condition => "COALESCE(\"condition\", '')".to_string(),
        other => column(other).to_string(),
    }
}

/// Lowercased copy of a text column, if the schema keeps one.
fn fold_column(field: ListingField) -> Option<&'static str> {
    match field {
        ListingField::Title => Some("title_fold"),
        ListingField::Description => Some("description_fold"),
        ListingField::City => Some("city_fold"),
        ListingField::Condition => Some("condition_fold"),
        _ => None,
    }
}

/// Case-folded text view of a column.
fn folded_expr(field: ListingField) -> String {
    match fold_column(field) {
        Some(col) => col.to_string(),
        None => format!("LOWER({})", text_expr(field)),
    }
}

fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn push_predicate(sql: &mut SqlBuilder<'_, Sqlite>, predicate: &Predicate) {
    match predicate {
        Predicate::Equals { field, value } if is_text(*field) => {
            sql.push(text_expr(*field)).push(" = ").push_bind(value.clone());
        }
        Predicate::NotEquals { field, value } if is_text(*field) => {
            sql.push(text_expr(*field)).push(" <> ").push_bind(value.clone());
        }
        Predicate::Contains { field, needle } if is_text(*field) => {
            sql.push(folded_expr(*field))
                .push(" LIKE ")
                .push_bind(like_pattern(needle))
                .push(" ESCAPE '\\'");
        }
        Predicate::OneOf { field, values } if is_text(*field) && !values.is_empty() => {
            // Raw column: an unset condition is NULL and never a member.
            sql.push(column(*field)).push(" IN (");
            let mut list = sql.separated(", ");
            for value in values {
                list.push_bind(value.clone());
            }
            list.push_unseparated(")");
        }
        Predicate::AtLeast { field: ListingField::Price, bound, missing } => {
            push_bound(sql, ">=", *bound, *missing);
        }
        Predicate::AtMost { field: ListingField::Price, bound, missing } => {
            push_bound(sql, "<=", *bound, *missing);
        }
        Predicate::Flag { field: ListingField::IsFeatured, value } => {
            sql.push("is_featured = ").push_bind(*value);
        }
        Predicate::AnyOf(inner) if !inner.is_empty() => {
            sql.push("(");
            for (i, p) in inner.iter().enumerate() {
                if i > 0 {
                    sql.push(" OR ");
                }
                push_predicate(sql, p);
            }
            sql.push(")");
        }
        // A non-text field never equals a text value.
        Predicate::NotEquals { .. } => {
            sql.push("1 = 1");
        }
        _ => {
            sql.push("0 = 1");
        }
    }
}

fn push_bound(sql: &mut SqlBuilder<'_, Sqlite>, op: &str, bound: i64, missing: Missing) {
    let guard = match missing {
        Missing::Include => "(price IS NULL OR price ",
        Missing::Exclude => "(price IS NOT NULL AND price ",
    };
    sql.push(guard).push(op).push(" ").push_bind(bound).push(")");
}

fn order_term(clause: &SortClause) -> String {
    let direction = match clause.direction {
        Direction::Asc => "ASC",
        Direction::Desc => "DESC",
    };
    let col = column(clause.field);
    match clause.field {
        // Unpriced listings last in either direction.
        ListingField::Price => format!("{col} IS NULL, {col} {direction}"),
        field if clause.case_insensitive => format!("{} {direction}", folded_expr(field)),
        _ => format!("{col} {direction}"),
    }
}

/// Renders a compiled query into a `SELECT` over `listings`.
pub fn render(query: &QuerySpec) -> SqlBuilder<'static, Sqlite> {
    let mut sql = SqlBuilder::new("SELECT * FROM listings WHERE 1 = 1");
    for predicate in &query.predicates {
        sql.push(" AND ");
        push_predicate(&mut sql, predicate);
    }

    let order: Vec<String> = query.order.iter().map(order_term).collect();
    if !order.is_empty() {
        sql.push(" ORDER BY ").push(order.join(", "));
    }

    sql.push(" LIMIT ")
        .push_bind(i64::from(query.window.limit))
        .push(" OFFSET ")
        .push_bind(i64::from(query.window.offset));
    sql
}

// ============================================================================
// Ports
// ============================================================================

#[async_trait]
impl ListingRepo for SqliteBackend {
    async fn get_listing(&self, id: &ListingId) -> anyhow::Result<Option<Listing>> {
        let row = sqlx::query("SELECT * FROM listings WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(listing_from_row).transpose()
    }

    async fn query_listings(&self, query: &QuerySpec) -> anyhow::Result<Vec<Listing>> {
        let mut sql = render(query);
        debug!(sql = sql.sql(), "query listings");
        let rows = sql.build().fetch_all(&self.pool).await?;
        rows.iter().map(listing_from_row).collect()
    }

    async fn increment_views(&self, id: &ListingId) -> anyhow::Result<()> {
        sqlx::query("UPDATE listings SET views_count = views_count + 1 WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_categories(&self) -> anyhow::Result<Vec<Category>> {
        let rows = sqlx::query("SELECT * FROM categories")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(category_from_row).collect()
    }
}

#[async_trait]
impl FavoritesRepo for SqliteBackend {
    async fn list_favorites(&self, user_id: &UserId) -> anyhow::Result<Vec<ListingId>> {
        let rows = sqlx::query("SELECT listing_id FROM favorites WHERE user_id = ? ORDER BY rowid")
            .bind(user_id.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| -> anyhow::Result<ListingId> { Ok(ListingId::new(row.try_get::<String, _>("listing_id")?)) })
            .collect()
    }

    async fn add_favorite(&self, user_id: &UserId, listing_id: &ListingId) -> anyhow::Result<()> {
        sqlx::query("INSERT OR IGNORE INTO favorites (user_id, listing_id, created_at_ms) VALUES (?, ?, ?)")
            .bind(user_id.as_str())
            .bind(listing_id.as_str())
            .bind(Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_favorite(&self, user_id: &UserId, listing_id: &ListingId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM favorites WHERE user_id = ? AND listing_id = ?")
            .bind(user_id.as_str())
            .bind(listing_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteCartRepo for SqliteBackend {
    async fn load_cart(&self, user_id: &UserId) -> anyhow::Result<Vec<CartLineItem>> {
        let rows = sqlx::query("SELECT * FROM cart_items WHERE user_id = ? ORDER BY position")
            .bind(user_id.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(line_item_from_row).collect()
    }

    /// Delete-then-insert inside one transaction, so readers see either the old
    /// cart or the new one.
    async fn replace_cart(&self, user_id: &UserId, items: &[CartLineItem]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cart_items WHERE user_id = ?")
            .bind(user_id.as_str())
            .execute(&mut *tx)
            .await?;

        for (position, item) in items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO cart_items (user_id, position, id, listing_id, quantity, unit_price, title, images) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(user_id.as_str())
            .bind(i64::try_from(position)?)
            .bind(item.id.to_string())
            .bind(item.listing_id.as_str())
            .bind(i64::from(item.quantity))
            .bind(item.unit_price)
            .bind(&item.title)
            .bind(serde_json::to_string(&item.images)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
