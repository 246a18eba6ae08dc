//! On-read rollups over snapshots and products.

use chrono::{DateTime, Duration, Utc};
use pagevault_core::{
    GlobalOverview, GlobalStatistics, SnapshotSummary, SourceSummary, Stats, StatsPeriod,
    UrlStatistics, RECENT_SNAPSHOTS_LIMIT, TOP_SOURCES_LIMIT,
};
use rust_decimal::Decimal;
use sqlx::{types::Json, PgPool};

use crate::{
    snapshots::{PageSnapshotRow, SNAPSHOT_COLUMNS},
    DbError,
};

#[derive(Debug, sqlx::FromRow)]
struct ScrapeCounts {
    total_scrapes: i64,
    successful_scrapes: i64,
    first_scraped_at: Option<DateTime<Utc>>,
    last_scraped_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct UrlProductRollup {
    total_products: i64,
    unique_products: i64,
    min_price: Decimal,
    avg_price: Decimal,
    max_price: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRollup {
    total_products: i64,
    min_price: Decimal,
    avg_price: Decimal,
    max_price: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct OverviewCounts {
    total_scrapes: i64,
    successful_scrapes: i64,
    unique_urls: i64,
    last_24_hours: i64,
    last_7_days: i64,
    last_30_days: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct SourceRow {
    source: String,
    product_count: i64,
    avg_price: Decimal,
}

/// Statistics for one URL over `period`, measured back from now.
///
/// Every figure is scoped to snapshots of `url` created inside the window.
/// A URL with no scrapes in the window yields zero counts and prices.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure.
pub async fn get_url_statistics(
    pool: &PgPool,
    url: &str,
    period: StatsPeriod,
) -> Result<UrlStatistics, DbError> {
    let window_start = period.window_start(Utc::now());
    let mut tx = crate::begin_read(pool).await?;

    let counts = sqlx::query_as::<_, ScrapeCounts>(
        "SELECT COUNT(*) AS total_scrapes, \
                COUNT(*) FILTER (WHERE success) AS successful_scrapes, \
                MIN(created_at) AS first_scraped_at, \
                MAX(created_at) AS last_scraped_at \
         FROM page_snapshots \
         WHERE url = $1 AND created_at >= $2",
    )
    .bind(url)
    .bind(window_start)
    .fetch_one(&mut *tx)
    .await?;

    let last_stats: Option<Json<Stats>> = sqlx::query_scalar(
        "SELECT stats FROM page_snapshots \
         WHERE url = $1 AND created_at >= $2 \
         ORDER BY created_at DESC, id DESC \
         LIMIT 1",
    )
    .bind(url)
    .bind(window_start)
    .fetch_optional(&mut *tx)
    .await?;

    let prices = sqlx::query_as::<_, UrlProductRollup>(
        "SELECT COUNT(p.id) AS total_products, \
                COUNT(DISTINCT p.url) AS unique_products, \
                COALESCE(MIN(p.price), 0) AS min_price, \
                COALESCE(ROUND(AVG(p.price), 2), 0) AS avg_price, \
                COALESCE(MAX(p.price), 0) AS max_price \
         FROM products p \
         JOIN page_snapshots s ON s.id = p.snapshot_id \
         WHERE s.url = $1 AND s.created_at >= $2",
    )
    .bind(url)
    .bind(window_start)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(UrlStatistics {
        url: url.to_string(),
        period,
        window_start,
        total_scrapes: counts.total_scrapes,
        successful_scrapes: counts.successful_scrapes,
        first_scraped_at: counts.first_scraped_at,
        last_scraped_at: counts.last_scraped_at,
        last_stats: last_stats.map(|s| s.0),
        total_products: prices.total_products,
        unique_products: prices.unique_products,
        min_price: prices.min_price,
        avg_price: prices.avg_price,
        max_price: prices.max_price,
    })
}

/// Store-wide overview, top sources, and the most recent snapshots.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure.
pub async fn get_global_statistics(pool: &PgPool) -> Result<GlobalStatistics, DbError> {
    let now = Utc::now();
    let mut tx = crate::begin_read(pool).await?;

    let counts = sqlx::query_as::<_, OverviewCounts>(
        "SELECT COUNT(*) AS total_scrapes, \
                COUNT(*) FILTER (WHERE success) AS successful_scrapes, \
                COUNT(DISTINCT url) AS unique_urls, \
                COUNT(*) FILTER (WHERE created_at >= $1) AS last_24_hours, \
                COUNT(*) FILTER (WHERE created_at >= $2) AS last_7_days, \
                COUNT(*) FILTER (WHERE created_at >= $3) AS last_30_days \
         FROM page_snapshots",
    )
    .bind(now - Duration::hours(24))
    .bind(now - Duration::days(7))
    .bind(now - Duration::days(30))
    .fetch_one(&mut *tx)
    .await?;

    let prices = sqlx::query_as::<_, ProductRollup>(
        "SELECT COUNT(*) AS total_products, \
                COALESCE(MIN(price), 0) AS min_price, \
                COALESCE(ROUND(AVG(price), 2), 0) AS avg_price, \
                COALESCE(MAX(price), 0) AS max_price \
         FROM products",
    )
    .fetch_one(&mut *tx)
    .await?;

    let top_sources = sqlx::query_as::<_, SourceRow>(
        "SELECT source, \
                COUNT(*) AS product_count, \
                ROUND(AVG(price), 2) AS avg_price \
         FROM products \
         WHERE source <> '' \
         GROUP BY source \
         ORDER BY product_count DESC, source ASC \
         LIMIT $1",
    )
    .bind(TOP_SOURCES_LIMIT)
    .fetch_all(&mut *tx)
    .await?;

    let recent = sqlx::query_as::<_, PageSnapshotRow>(&format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM page_snapshots \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1"
    ))
    .bind(RECENT_SNAPSHOTS_LIMIT)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(GlobalStatistics {
        overview: GlobalOverview {
            total_scrapes: counts.total_scrapes,
            successful_scrapes: counts.successful_scrapes,
            total_products: prices.total_products,
            unique_urls: counts.unique_urls,
            last_24_hours: counts.last_24_hours,
            last_7_days: counts.last_7_days,
            last_30_days: counts.last_30_days,
            min_price: prices.min_price,
            avg_price: prices.avg_price,
            max_price: prices.max_price,
        },
        top_sources: top_sources
            .into_iter()
            .map(|row| SourceSummary {
                source: row.source,
                product_count: row.product_count,
                avg_price: row.avg_price,
            })
            .collect(),
        recent: recent.into_iter().map(SnapshotSummary::from).collect(),
    })
}
