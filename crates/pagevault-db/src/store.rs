use pagevault_core::{
    GlobalStatistics, HistoryFilters, HistoryPage, IngestReceipt, NewPageSnapshot, PageSnapshot,
    Pagination, Product, SearchFilters, SearchPage, StatsPeriod, UrlStatistics,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{ingest, products, snapshots, statistics, Deadline, DbError};

/// Handle to the snapshot store.
///
/// Cheap to clone; every clone shares the same pool. Each operation runs
/// under a caller-supplied [`Deadline`].
#[derive(Debug, Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Writes happen under `deadline`; the final commit does not. Once the
    /// writes are staged the commit always runs to completion, so
    /// [`DbError::DeadlineExceeded`] means nothing was stored and the ingest
    /// is safe to resubmit.
    ///
    /// # Errors
    ///
    /// See [`ingest::ingest_snapshot`]; also [`DbError::DeadlineExceeded`].
    pub async fn ingest(
        &self,
        snapshot: &NewPageSnapshot,
        deadline: Deadline,
    ) -> Result<IngestReceipt, DbError> {
        let staged = deadline
            .run(ingest::stage_ingest(&self.pool, snapshot))
            .await?;
        staged.commit().await
    }

    /// # Errors
    ///
    /// [`DbError::NotFound`], [`DbError::DeadlineExceeded`], or storage failure.
    pub async fn snapshot_by_id(&self, id: Uuid, deadline: Deadline) -> Result<PageSnapshot, DbError> {
        deadline
            .run(snapshots::get_snapshot_by_id(&self.pool, id))
            .await
    }

    /// # Errors
    ///
    /// [`DbError::NotFound`], [`DbError::DeadlineExceeded`], or storage failure.
    pub async fn latest_by_url(&self, url: &str, deadline: Deadline) -> Result<PageSnapshot, DbError> {
        deadline
            .run(snapshots::get_latest_snapshot(&self.pool, url))
            .await
    }

    /// # Errors
    ///
    /// [`DbError::NotFound`], [`DbError::DeadlineExceeded`], or storage failure.
    pub async fn latest_n_by_url(
        &self,
        url: &str,
        limit: i64,
        deadline: Deadline,
    ) -> Result<Vec<PageSnapshot>, DbError> {
        deadline
            .run(snapshots::get_latest_snapshots(&self.pool, url, limit))
            .await
    }

    /// # Errors
    ///
    /// [`DbError::DeadlineExceeded`] or storage failure.
    pub async fn history(
        &self,
        url: &str,
        pagination: Pagination,
        filters: &HistoryFilters,
        deadline: Deadline,
    ) -> Result<HistoryPage, DbError> {
        deadline
            .run(snapshots::get_history(&self.pool, url, pagination, filters))
            .await
    }

    /// # Errors
    ///
    /// [`DbError::DeadlineExceeded`] or storage failure.
    pub async fn search_products(
        &self,
        query: &str,
        pagination: Pagination,
        filters: &SearchFilters,
        deadline: Deadline,
    ) -> Result<SearchPage, DbError> {
        deadline
            .run(products::search_products(&self.pool, query, pagination, filters))
            .await
    }

    /// # Errors
    ///
    /// [`DbError::DeadlineExceeded`] or storage failure.
    pub async fn url_statistics(
        &self,
        url: &str,
        period: StatsPeriod,
        deadline: Deadline,
    ) -> Result<UrlStatistics, DbError> {
        deadline
            .run(statistics::get_url_statistics(&self.pool, url, period))
            .await
    }

    /// # Errors
    ///
    /// [`DbError::DeadlineExceeded`] or storage failure.
    pub async fn global_statistics(&self, deadline: Deadline) -> Result<GlobalStatistics, DbError> {
        deadline
            .run(statistics::get_global_statistics(&self.pool))
            .await
    }

    /// # Errors
    ///
    /// [`DbError::NotFound`], [`DbError::DeadlineExceeded`], or storage failure.
    pub async fn delete_snapshot(&self, id: Uuid, deadline: Deadline) -> Result<(), DbError> {
        deadline
            .run(ingest::delete_snapshot(&self.pool, id))
            .await
            .map(|_| ())
    }

    /// # Errors
    ///
    /// [`DbError::NotFound`], [`DbError::DeadlineExceeded`], or storage failure.
    pub async fn product_by_id(&self, id: Uuid, deadline: Deadline) -> Result<Product, DbError> {
        deadline
            .run(products::get_product_by_id(&self.pool, id))
            .await
    }

    /// # Errors
    ///
    /// [`DbError::NotFound`], [`DbError::DeadlineExceeded`], or storage failure.
    pub async fn product_by_url(&self, url: &str, deadline: Deadline) -> Result<Product, DbError> {
        deadline
            .run(products::get_product_by_url(&self.pool, url))
            .await
    }

    /// # Errors
    ///
    /// [`DbError::DeadlineExceeded`] or storage failure.
    pub async fn health_check(&self, deadline: Deadline) -> Result<(), DbError> {
        deadline.run(crate::health_check(&self.pool)).await
    }
}
