//! Reads over `page_snapshots`: point fetch, latest-by-URL, and history.

use chrono::{DateTime, Utc};
use pagevault_core::{
    HistoryFilters, HistoryPage, PageSignals, PageSnapshot, Pagination, SnapshotSummary, Stats,
    MAX_LATEST_LIMIT,
};
use sqlx::{types::Json, PgConnection, PgPool};
use uuid::Uuid;

use crate::{products::products_for_snapshots, DbError};

pub(crate) const SNAPSHOT_COLUMNS: &str = "id, url, page_title, page_info, stats, success, \
     client_timestamp, user_agent, created_at, updated_at";

/// A row from the `page_snapshots` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PageSnapshotRow {
    pub id: Uuid,
    pub url: String,
    pub page_title: String,
    pub page_info: Json<PageSignals>,
    pub stats: Json<Stats>,
    pub success: bool,
    /// Crawler-supplied timestamp string, stored verbatim.
    pub client_timestamp: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PageSnapshotRow {
    fn into_snapshot(self, products: Vec<pagevault_core::Product>) -> PageSnapshot {
        PageSnapshot {
            id: self.id,
            url: self.url,
            page_title: self.page_title,
            page_info: self.page_info.0,
            stats: self.stats.0,
            success: self.success,
            timestamp: self.client_timestamp,
            user_agent: self.user_agent,
            created_at: self.created_at,
            updated_at: self.updated_at,
            products,
        }
    }
}

impl From<PageSnapshotRow> for SnapshotSummary {
    fn from(row: PageSnapshotRow) -> Self {
        Self {
            id: row.id,
            url: row.url,
            page_title: row.page_title,
            success: row.success,
            timestamp: row.client_timestamp,
            stats: row.stats.0,
            created_at: row.created_at,
        }
    }
}

/// Pairs each snapshot row with the products it currently owns, keeping the
/// row order.
async fn attach_products(
    conn: &mut PgConnection,
    rows: Vec<PageSnapshotRow>,
) -> Result<Vec<PageSnapshot>, DbError> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut products = products_for_snapshots(conn, &ids).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let owned = products.remove(&row.id).unwrap_or_default();
            row.into_snapshot(owned)
        })
        .collect())
}

/// Fetch one snapshot with the products it currently owns.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no snapshot has this id, or
/// [`DbError::Sqlx`] on query failure.
pub async fn get_snapshot_by_id(pool: &PgPool, id: Uuid) -> Result<PageSnapshot, DbError> {
    let mut tx = crate::begin_read(pool).await?;

    let row = sqlx::query_as::<_, PageSnapshotRow>(&format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM page_snapshots WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(DbError::NotFound)?;

    let mut snapshots = attach_products(&mut *tx, vec![row]).await?;
    tx.commit().await?;

    snapshots.pop().ok_or(DbError::NotFound)
}

/// Fetch up to `limit` most recent snapshots of `url`, newest first.
///
/// `limit` is clamped to `1..=MAX_LATEST_LIMIT`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the URL has never been scraped, or
/// [`DbError::Sqlx`] on query failure.
pub async fn get_latest_snapshots(
    pool: &PgPool,
    url: &str,
    limit: i64,
) -> Result<Vec<PageSnapshot>, DbError> {
    let limit = limit.clamp(1, MAX_LATEST_LIMIT);
    let mut tx = crate::begin_read(pool).await?;

    let rows = sqlx::query_as::<_, PageSnapshotRow>(&format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM page_snapshots \
         WHERE url = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2"
    ))
    .bind(url)
    .bind(limit)
    .fetch_all(&mut *tx)
    .await?;

    if rows.is_empty() {
        return Err(DbError::NotFound);
    }

    let snapshots = attach_products(&mut *tx, rows).await?;
    tx.commit().await?;
    Ok(snapshots)
}

/// Fetch the most recent snapshot of `url`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the URL has never been scraped, or
/// [`DbError::Sqlx`] on query failure.
pub async fn get_latest_snapshot(pool: &PgPool, url: &str) -> Result<PageSnapshot, DbError> {
    get_latest_snapshots(pool, url, 1)
        .await?
        .into_iter()
        .next()
        .ok_or(DbError::NotFound)
}

// $1 url, $2 source, $3 from, $4 to, $5 success-only
const HISTORY_WHERE: &str = "s.url = $1 \
     AND ($2::text IS NULL OR EXISTS ( \
         SELECT 1 FROM products p WHERE p.snapshot_id = s.id AND p.source = $2)) \
     AND ($3::timestamptz IS NULL OR s.created_at >= $3) \
     AND ($4::timestamptz IS NULL OR s.created_at <= $4) \
     AND (NOT $5::boolean OR s.success)";

/// One page of `url`'s scrape history, newest first.
///
/// `total` counts every matching snapshot regardless of pagination. Both
/// reads share one repeatable-read transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure. An unknown URL yields an
/// empty page rather than an error.
pub async fn get_history(
    pool: &PgPool,
    url: &str,
    pagination: Pagination,
    filters: &HistoryFilters,
) -> Result<HistoryPage, DbError> {
    let mut tx = crate::begin_read(pool).await?;

    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM page_snapshots s WHERE {HISTORY_WHERE}"
    ))
    .bind(url)
    .bind(filters.source.as_deref())
    .bind(filters.date_from)
    .bind(filters.date_to)
    .bind(filters.success_only)
    .fetch_one(&mut *tx)
    .await?;

    let rows = sqlx::query_as::<_, PageSnapshotRow>(&format!(
        "SELECT {cols} FROM page_snapshots s WHERE {HISTORY_WHERE} \
         ORDER BY s.created_at DESC, s.id DESC \
         LIMIT $6 OFFSET $7",
        cols = qualified_snapshot_columns(),
    ))
    .bind(url)
    .bind(filters.source.as_deref())
    .bind(filters.date_from)
    .bind(filters.date_to)
    .bind(filters.success_only)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&mut *tx)
    .await?;

    let items = attach_products(&mut *tx, rows).await?;
    tx.commit().await?;

    Ok(HistoryPage {
        url: url.to_string(),
        items,
        total,
        page: pagination.page(),
        per_page: pagination.per_page(),
        filters: filters.clone(),
    })
}

/// [`SNAPSHOT_COLUMNS`] prefixed with the `s.` alias.
pub(crate) fn qualified_snapshot_columns() -> String {
    SNAPSHOT_COLUMNS
        .split(',')
        .map(|c| format!("s.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}
