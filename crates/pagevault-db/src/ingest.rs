//! The write path: transactional snapshot ingest with product dedup, and
//! snapshot deletion.

use std::time::Duration;

use chrono::{DateTime, Utc};
use pagevault_core::{IngestReceipt, NewPageSnapshot, NewProduct};
use sqlx::{types::Json, PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::DbError;

/// Attempts per ingest when Postgres aborts it over a lock conflict.
const MAX_INGEST_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Persist one scrape event and upsert its products, all-or-nothing.
///
/// Products are written in input order. A product whose `url` already
/// exists is updated in place: every submitted field is refreshed and the
/// row is reassigned to the new snapshot, while its `id` and `created_at`
/// are kept. A URL repeated within one submission is written twice, and the
/// later entry wins.
///
/// Two ingests that touch the same product URLs in different orders can
/// deadlock. The loser is rolled back and rerun, up to three attempts in
/// total.
///
/// # Errors
///
/// Returns [`DbError::Validation`] when the snapshot fails
/// [`NewPageSnapshot::validate`] (nothing is written), [`DbError::Conflict`]
/// on a unique violation, or [`DbError::Sqlx`] on any other failure. Every
/// error rolls the transaction back.
pub async fn ingest_snapshot(
    pool: &PgPool,
    snapshot: &NewPageSnapshot,
) -> Result<IngestReceipt, DbError> {
    stage_ingest(pool, snapshot).await?.commit().await
}

/// A fully written ingest whose transaction is still open.
///
/// Dropping it rolls everything back.
pub(crate) struct StagedIngest {
    tx: Transaction<'static, Postgres>,
    url: String,
    receipt: IngestReceipt,
}

impl StagedIngest {
    pub(crate) async fn commit(self) -> Result<IngestReceipt, DbError> {
        self.tx.commit().await?;
        tracing::debug!(
            snapshot_id = %self.receipt.id,
            url = %self.url,
            products_created = self.receipt.products_created,
            products_updated = self.receipt.products_updated,
            "ingested page snapshot"
        );
        Ok(self.receipt)
    }
}

/// Writes the snapshot and its products without committing, retrying the
/// whole transaction on deadlock or serialization failure.
pub(crate) async fn stage_ingest(
    pool: &PgPool,
    snapshot: &NewPageSnapshot,
) -> Result<StagedIngest, DbError> {
    snapshot.validate()?;

    let mut attempt = 1;
    loop {
        match write_snapshot(pool, snapshot).await {
            Err(error) if attempt < MAX_INGEST_ATTEMPTS && is_lock_conflict(&error) => {
                tracing::warn!(
                    attempt,
                    url = %snapshot.url,
                    %error,
                    "ingest aborted by lock conflict, retrying"
                );
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// `40P01` is `deadlock_detected`, `40001` is `serialization_failure`.
fn is_lock_conflict(error: &DbError) -> bool {
    matches!(
        error,
        DbError::Sqlx(sqlx::Error::Database(db))
            if matches!(db.code().as_deref(), Some("40P01" | "40001"))
    )
}

async fn write_snapshot(
    pool: &PgPool,
    snapshot: &NewPageSnapshot,
) -> Result<StagedIngest, DbError> {
    let id = Uuid::new_v4();
    let mut tx = pool.begin().await?;

    let created_at: DateTime<Utc> = sqlx::query_scalar(
        "INSERT INTO page_snapshots \
             (id, url, page_title, page_info, stats, success, client_timestamp, user_agent) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING created_at",
    )
    .bind(id)
    .bind(snapshot.url.trim())
    .bind(&snapshot.page_title)
    .bind(Json(&snapshot.page_info))
    .bind(Json(&snapshot.stats))
    .bind(snapshot.success)
    .bind(&snapshot.timestamp)
    .bind(&snapshot.user_agent)
    .fetch_one(&mut *tx)
    .await?;

    let mut products_created: u64 = 0;
    let mut products_updated: u64 = 0;
    for (position, product) in snapshot.products.iter().enumerate() {
        let position = i32::try_from(position).unwrap_or(i32::MAX);
        if upsert_product(&mut *tx, id, position, product).await? {
            products_created += 1;
        } else {
            products_updated += 1;
        }
    }

    Ok(StagedIngest {
        tx,
        url: snapshot.url.clone(),
        receipt: IngestReceipt {
            id,
            created_at,
            products_created,
            products_updated,
        },
    })
}

/// Insert or refresh one product row keyed by URL.
///
/// Returns `true` when a new row was inserted, `false` when an existing row
/// was updated.
async fn upsert_product(
    conn: &mut PgConnection,
    snapshot_id: Uuid,
    position: i32,
    product: &NewProduct,
) -> Result<bool, DbError> {
    let is_new: bool = sqlx::query_scalar(
        "INSERT INTO products \
             (id, snapshot_id, position, url, name, price, old_price, discount, weight, \
              unit, source, element_text, image, page_title, page_url, observed_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
         ON CONFLICT (url) DO UPDATE SET \
             snapshot_id  = EXCLUDED.snapshot_id, \
             position     = EXCLUDED.position, \
             name         = EXCLUDED.name, \
             price        = EXCLUDED.price, \
             old_price    = EXCLUDED.old_price, \
             discount     = EXCLUDED.discount, \
             weight       = EXCLUDED.weight, \
             unit         = EXCLUDED.unit, \
             source       = EXCLUDED.source, \
             element_text = EXCLUDED.element_text, \
             image        = EXCLUDED.image, \
             page_title   = EXCLUDED.page_title, \
             page_url     = EXCLUDED.page_url, \
             observed_at  = EXCLUDED.observed_at, \
             updated_at   = NOW() \
         RETURNING (xmax = 0) AS is_new",
    )
    .bind(Uuid::new_v4())
    .bind(snapshot_id)
    .bind(position)
    .bind(product.url.trim())
    .bind(product.name.trim())
    .bind(product.price)
    .bind(product.old_price)
    .bind(product.discount)
    .bind(product.weight.as_deref())
    .bind(&product.unit)
    .bind(&product.source)
    .bind(&product.element_text)
    .bind(&product.image)
    .bind(&product.page_title)
    .bind(&product.page_url)
    .bind(product.timestamp)
    .fetch_one(conn)
    .await?;

    Ok(is_new)
}

/// Delete a snapshot and the products it currently owns.
///
/// Products that a later snapshot has since reassigned to itself are left
/// alone. Returns the number of product rows removed.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no snapshot has this id, or
/// [`DbError::Sqlx`] on query failure.
pub async fn delete_snapshot(pool: &PgPool, id: Uuid) -> Result<u64, DbError> {
    let mut tx = pool.begin().await?;

    let products_removed = sqlx::query("DELETE FROM products WHERE snapshot_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let snapshots_removed = sqlx::query("DELETE FROM page_snapshots WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if snapshots_removed == 0 {
        // Dropping `tx` rolls back the product delete.
        return Err(DbError::NotFound);
    }

    tx.commit().await?;

    tracing::info!(snapshot_id = %id, products_removed, "deleted page snapshot");
    Ok(products_removed)
}
