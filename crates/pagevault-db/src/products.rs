//! Reads over the `products` table: point lookups and filtered search.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use pagevault_core::{substring_pattern, Pagination, Product, SearchFilters, SearchPage};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::DbError;

/// Column list shared by every `SELECT` that materializes a [`ProductRow`].
pub(crate) const PRODUCT_COLUMNS: &str = "id, snapshot_id, position, url, name, price, \
     old_price, discount, weight, unit, source, element_text, image, page_title, page_url, \
     observed_at, created_at, updated_at";

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: Uuid,
    pub snapshot_id: Uuid,
    /// Index within the owning snapshot's submitted product list.
    pub position: i32,
    pub url: String,
    pub name: String,
    pub price: Decimal,
    pub old_price: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub weight: Option<String>,
    pub unit: String,
    pub source: String,
    pub element_text: String,
    pub image: String,
    pub page_title: String,
    pub page_url: String,
    pub observed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            snapshot_id: row.snapshot_id,
            url: row.url,
            name: row.name,
            price: row.price,
            old_price: row.old_price,
            discount: row.discount,
            weight: row.weight,
            unit: row.unit,
            source: row.source,
            element_text: row.element_text,
            image: row.image,
            page_title: row.page_title,
            page_url: row.page_url,
            timestamp: row.observed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Loads the products currently owned by each of `snapshot_ids`, keyed by
/// snapshot and ordered by submission position.
pub(crate) async fn products_for_snapshots(
    conn: &mut PgConnection,
    snapshot_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<Product>>, DbError> {
    if snapshot_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM products \
         WHERE snapshot_id = ANY($1) \
         ORDER BY snapshot_id, position, id"
    );
    let rows = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(snapshot_ids)
        .fetch_all(conn)
        .await?;

    let mut grouped: HashMap<Uuid, Vec<Product>> = HashMap::new();
    for row in rows {
        grouped
            .entry(row.snapshot_id)
            .or_default()
            .push(Product::from(row));
    }
    Ok(grouped)
}

/// Fetch a single product by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no product has this id, or
/// [`DbError::Sqlx`] on query failure.
pub async fn get_product_by_id(pool: &PgPool, id: Uuid) -> Result<Product, DbError> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
    sqlx::query_as::<_, ProductRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(Product::from)
        .ok_or(DbError::NotFound)
}

/// Fetch a single product by its canonical URL.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the URL is unknown, or [`DbError::Sqlx`]
/// on query failure.
pub async fn get_product_by_url(pool: &PgPool, url: &str) -> Result<Product, DbError> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE url = $1");
    sqlx::query_as::<_, ProductRow>(&sql)
        .bind(url)
        .fetch_optional(pool)
        .await?
        .map(Product::from)
        .ok_or(DbError::NotFound)
}

// $1 pattern, $2 floor, $3 ceiling, $4 source, $5 discount-only
const SEARCH_WHERE: &str = "(LOWER(name) LIKE $1 ESCAPE '\\' OR LOWER(element_text) LIKE $1 ESCAPE '\\') \
     AND ($2::numeric IS NULL OR price >= $2) \
     AND ($3::numeric IS NULL OR price <= $3) \
     AND ($4::text IS NULL OR source = $4) \
     AND (NOT $5::boolean OR (discount IS NOT NULL AND discount > 0))";

/// Case-insensitive substring search over product name and element text.
///
/// The page and the total are read inside one repeatable-read transaction,
/// so `total` always agrees with the rows that could appear on any page.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure.
pub async fn search_products(
    pool: &PgPool,
    query: &str,
    pagination: Pagination,
    filters: &SearchFilters,
) -> Result<SearchPage, DbError> {
    let pattern = substring_pattern(query);
    let floor = filters.price_floor();
    let ceiling = filters.price_ceiling();

    let mut tx = crate::begin_read(pool).await?;

    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM products WHERE {SEARCH_WHERE}"
    ))
    .bind(&pattern)
    .bind(floor)
    .bind(ceiling)
    .bind(filters.source.as_deref())
    .bind(filters.with_discount)
    .fetch_one(&mut *tx)
    .await?;

    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE {SEARCH_WHERE} \
         ORDER BY created_at DESC, id DESC \
         LIMIT $6 OFFSET $7"
    ))
    .bind(&pattern)
    .bind(floor)
    .bind(ceiling)
    .bind(filters.source.as_deref())
    .bind(filters.with_discount)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(SearchPage {
        query: query.trim().to_string(),
        items: rows.into_iter().map(Product::from).collect(),
        total,
        page: pagination.page(),
        per_page: pagination.per_page(),
        filters: filters.clone(),
    })
}
