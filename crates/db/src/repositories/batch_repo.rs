//! Repository for the `batch_jobs` and `batch_items` tables (RF-33).

use sqlx::PgPool;

use reelforge_core::lifecycle::{BatchStatus, ItemStatus};
use reelforge_core::types::DbId;

use crate::models::batch::{BatchItem, BatchJob, NewBatch};

/// Column list for `batch_jobs` queries.
const BATCH_COLUMNS: &str = "\
    id, owner_id, status_id, item_count, reserved_credits, error_message, \
    created_at, updated_at";

/// Column list for `batch_items` queries.
const ITEM_COLUMNS: &str = "\
    id, batch_id, source_url, style, duration_secs, status_id, job_id, \
    error_message, created_at, updated_at";

/// Provides CRUD operations for batches and their items.
pub struct BatchRepo;

impl BatchRepo {
    /// Create a batch and its items in one transaction.
    pub async fn create(pool: &PgPool, input: &NewBatch) -> Result<BatchJob, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let batch_query = format!(
            "INSERT INTO batch_jobs (owner_id, status_id, item_count, reserved_credits)
             VALUES ($1, $2, $3, $4)
             RETURNING {BATCH_COLUMNS}"
        );
        let batch = sqlx::query_as::<_, BatchJob>(&batch_query)
            .bind(input.owner_id)
            .bind(BatchStatus::Pending.id())
            .bind(input.items.len() as i32)
            .bind(input.reserved_credits)
            .fetch_one(&mut *tx)
            .await?;

        for item in &input.items {
            sqlx::query(
                "INSERT INTO batch_items
                    (batch_id, source_url, style, duration_secs, status_id)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(batch.id)
            .bind(&item.source_url)
            .bind(&item.style)
            .bind(item.duration_secs)
            .bind(ItemStatus::Pending.id())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(batch)
    }

    /// Find a batch by its primary key.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<BatchJob>, sqlx::Error> {
        let query = format!("SELECT {BATCH_COLUMNS} FROM batch_jobs WHERE id = $1");
        sqlx::query_as::<_, BatchJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a batch's items in creation order.
    pub async fn list_items(pool: &PgPool, batch_id: DbId) -> Result<Vec<BatchItem>, sqlx::Error> {
        let query = format!(
            "SELECT {ITEM_COLUMNS} FROM batch_items
             WHERE batch_id = $1
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, BatchItem>(&query)
            .bind(batch_id)
            .fetch_all(pool)
            .await
    }

    /// Move a batch to `running`.
    pub async fn mark_running(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE batch_jobs SET status_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(BatchStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Finalize a batch once every item is terminal.
    pub async fn finalize(
        pool: &PgPool,
        id: DbId,
        status: BatchStatus,
        error_message: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE batch_jobs
             SET status_id = $2, error_message = $3, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.id())
        .bind(error_message)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark an item as processing.
    pub async fn mark_item_processing(pool: &PgPool, item_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE batch_items SET status_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(item_id)
        .bind(ItemStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Attach the lazily-created generation job to its item.
    pub async fn set_item_job(
        pool: &PgPool,
        item_id: DbId,
        job_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE batch_items SET job_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(item_id)
        .bind(job_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark an item completed.
    pub async fn mark_item_completed(pool: &PgPool, item_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE batch_items SET status_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(item_id)
        .bind(ItemStatus::Completed.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record an item's failure without touching its siblings.
    pub async fn mark_item_failed(
        pool: &PgPool,
        item_id: DbId,
        error_message: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE batch_items
             SET status_id = $2, error_message = $3, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(item_id)
        .bind(ItemStatus::Failed.id())
        .bind(error_message)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Delete a not-yet-dispatched item.
    ///
    /// The guard is in the WHERE clause: only `pending` items without a job
    /// row can be deleted, so deletion is a ledger no-op by construction.
    /// Returns `false` when the item was already dispatched (or debited),
    /// in which case the caller must let the job reach a terminal state.
    pub async fn delete_item_if_pending(
        pool: &PgPool,
        item_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE batch_items
             SET status_id = $2, updated_at = NOW()
             WHERE id = $1 AND status_id = $3 AND job_id IS NULL",
        )
        .bind(item_id)
        .bind(ItemStatus::Deleted.id())
        .bind(ItemStatus::Pending.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
