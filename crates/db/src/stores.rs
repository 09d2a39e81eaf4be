//! Store traits consumed by the pipeline, plus their Postgres
//! implementation (RF-34).
//!
//! The pipeline never touches SQL: it talks to these traits, the
//! repositories supply the Postgres behavior, and tests supply in-memory
//! doubles. The traits carry exactly the operations the saga, the
//! completion poller, and the batch orchestrator need — atomic single-row
//! inserts/updates and simple equality queries.

use async_trait::async_trait;
use sqlx::PgPool;

use reelforge_core::ledger::EntryKind;
use reelforge_core::lifecycle::BatchStatus;
use reelforge_core::types::DbId;

use crate::models::batch::{BatchItem, BatchJob, NewBatch};
use crate::models::generation_job::{GenerationJob, NewGenerationJob};
use crate::models::ledger_entry::LedgerEntry;
use crate::repositories::ledger_repo::DebitOutcome;
use crate::repositories::{BatchRepo, GenerationJobRepo, LedgerRepo};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors surfaced by the store traits.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A debit was refused because the balance could not cover it.
    #[error("Insufficient balance: need {needed} credits, have {available}")]
    InsufficientBalance { needed: i64, available: i64 },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Persistence operations on generation jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(&self, input: &NewGenerationJob) -> Result<GenerationJob, StoreError>;

    /// Remove a job row that never got a ledger entry (debit-insert
    /// failure rollback). Jobs with a ledger trail are never deleted.
    async fn delete_job(&self, id: DbId) -> Result<(), StoreError>;

    async fn find_job(&self, id: DbId) -> Result<Option<GenerationJob>, StoreError>;

    async fn set_task_handle(&self, id: DbId, task_handle: &str) -> Result<(), StoreError>;

    async fn mark_completed(
        &self,
        id: DbId,
        result_url: &str,
        storage_path: Option<&str>,
        quality_score: f64,
        quality_issues: &[String],
    ) -> Result<(), StoreError>;

    /// Terminal failure. `quality` carries the score and issues when the
    /// failure came from the quality gate.
    async fn mark_failed(
        &self,
        id: DbId,
        reason: &str,
        quality: Option<(f64, Vec<String>)>,
    ) -> Result<(), StoreError>;

    async fn mark_superseded(
        &self,
        id: DbId,
        reason: &str,
        quality_score: f64,
        quality_issues: &[String],
    ) -> Result<(), StoreError>;

    async fn list_processing(&self) -> Result<Vec<GenerationJob>, StoreError>;
}

/// Append-only ledger operations.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn balance(&self, owner_id: DbId) -> Result<i64, StoreError>;

    /// Atomic balance-checked debit. Returns
    /// [`StoreError::InsufficientBalance`] without writing anything when
    /// the balance cannot cover the amount.
    async fn debit(
        &self,
        owner_id: DbId,
        credits: i64,
        job_id: DbId,
    ) -> Result<LedgerEntry, StoreError>;

    async fn credit(
        &self,
        owner_id: DbId,
        credits: i64,
        kind: EntryKind,
        job_id: Option<DbId>,
    ) -> Result<LedgerEntry, StoreError>;

    async fn entries_for_job(&self, job_id: DbId) -> Result<Vec<LedgerEntry>, StoreError>;
}

/// Persistence operations on batches and their items.
#[async_trait]
pub trait BatchStore: Send + Sync {
    async fn create_batch(
        &self,
        input: &NewBatch,
    ) -> Result<(BatchJob, Vec<BatchItem>), StoreError>;

    async fn mark_batch_running(&self, id: DbId) -> Result<(), StoreError>;

    async fn finalize_batch(
        &self,
        id: DbId,
        status: BatchStatus,
        error_message: Option<&str>,
    ) -> Result<(), StoreError>;

    async fn mark_item_processing(&self, item_id: DbId) -> Result<(), StoreError>;

    async fn set_item_job(&self, item_id: DbId, job_id: DbId) -> Result<(), StoreError>;

    async fn mark_item_completed(&self, item_id: DbId) -> Result<(), StoreError>;

    async fn mark_item_failed(&self, item_id: DbId, error: &str) -> Result<(), StoreError>;

    /// Delete an item before dispatch. Returns `Ok(false)` when the item
    /// already has a job (deletion is blocked until the job is terminal).
    async fn delete_item_if_pending(&self, item_id: DbId) -> Result<bool, StoreError>;

    async fn list_items(&self, batch_id: DbId) -> Result<Vec<BatchItem>, StoreError>;
}

// ---------------------------------------------------------------------------
// Postgres implementation
// ---------------------------------------------------------------------------

/// Store implementation over a shared [`PgPool`]. Cheap to clone into
/// long-lived tasks.
#[derive(Clone)]
pub struct PgStores {
    pool: PgPool,
}

impl PgStores {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn issues_json(issues: &[String]) -> serde_json::Value {
    serde_json::Value::Array(
        issues
            .iter()
            .map(|i| serde_json::Value::String(i.clone()))
            .collect(),
    )
}

#[async_trait]
impl JobStore for PgStores {
    async fn create_job(&self, input: &NewGenerationJob) -> Result<GenerationJob, StoreError> {
        Ok(GenerationJobRepo::create(&self.pool, input).await?)
    }

    async fn delete_job(&self, id: DbId) -> Result<(), StoreError> {
        let deleted = GenerationJobRepo::delete(&self.pool, id).await?;
        if !deleted {
            return Err(StoreError::NotFound {
                entity: "generation_job",
                id,
            });
        }
        Ok(())
    }

    async fn find_job(&self, id: DbId) -> Result<Option<GenerationJob>, StoreError> {
        Ok(GenerationJobRepo::find_by_id(&self.pool, id).await?)
    }

    async fn set_task_handle(&self, id: DbId, task_handle: &str) -> Result<(), StoreError> {
        Ok(GenerationJobRepo::set_task_handle(&self.pool, id, task_handle).await?)
    }

    async fn mark_completed(
        &self,
        id: DbId,
        result_url: &str,
        storage_path: Option<&str>,
        quality_score: f64,
        quality_issues: &[String],
    ) -> Result<(), StoreError> {
        Ok(GenerationJobRepo::mark_completed(
            &self.pool,
            id,
            result_url,
            storage_path,
            quality_score,
            &issues_json(quality_issues),
        )
        .await?)
    }

    async fn mark_failed(
        &self,
        id: DbId,
        reason: &str,
        quality: Option<(f64, Vec<String>)>,
    ) -> Result<(), StoreError> {
        let (score, issues) = match quality {
            Some((score, issues)) => (Some(score), Some(issues_json(&issues))),
            None => (None, None),
        };
        Ok(GenerationJobRepo::mark_failed(&self.pool, id, reason, score, issues.as_ref()).await?)
    }

    async fn mark_superseded(
        &self,
        id: DbId,
        reason: &str,
        quality_score: f64,
        quality_issues: &[String],
    ) -> Result<(), StoreError> {
        Ok(GenerationJobRepo::mark_superseded(
            &self.pool,
            id,
            reason,
            quality_score,
            &issues_json(quality_issues),
        )
        .await?)
    }

    async fn list_processing(&self) -> Result<Vec<GenerationJob>, StoreError> {
        Ok(GenerationJobRepo::list_processing(&self.pool).await?)
    }
}

#[async_trait]
impl LedgerStore for PgStores {
    async fn balance(&self, owner_id: DbId) -> Result<i64, StoreError> {
        Ok(LedgerRepo::balance(&self.pool, owner_id).await?)
    }

    async fn debit(
        &self,
        owner_id: DbId,
        credits: i64,
        job_id: DbId,
    ) -> Result<LedgerEntry, StoreError> {
        match LedgerRepo::debit(&self.pool, owner_id, credits, job_id).await? {
            DebitOutcome::Admitted(entry) => Ok(entry),
            DebitOutcome::InsufficientBalance { available } => {
                Err(StoreError::InsufficientBalance {
                    needed: credits,
                    available,
                })
            }
        }
    }

    async fn credit(
        &self,
        owner_id: DbId,
        credits: i64,
        kind: EntryKind,
        job_id: Option<DbId>,
    ) -> Result<LedgerEntry, StoreError> {
        Ok(LedgerRepo::credit(&self.pool, owner_id, credits, kind, job_id).await?)
    }

    async fn entries_for_job(&self, job_id: DbId) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(LedgerRepo::entries_for_job(&self.pool, job_id).await?)
    }
}

#[async_trait]
impl BatchStore for PgStores {
    async fn create_batch(
        &self,
        input: &NewBatch,
    ) -> Result<(BatchJob, Vec<BatchItem>), StoreError> {
        let batch = BatchRepo::create(&self.pool, input).await?;
        let items = BatchRepo::list_items(&self.pool, batch.id).await?;
        Ok((batch, items))
    }

    async fn mark_batch_running(&self, id: DbId) -> Result<(), StoreError> {
        Ok(BatchRepo::mark_running(&self.pool, id).await?)
    }

    async fn finalize_batch(
        &self,
        id: DbId,
        status: BatchStatus,
        error_message: Option<&str>,
    ) -> Result<(), StoreError> {
        Ok(BatchRepo::finalize(&self.pool, id, status, error_message).await?)
    }

    async fn mark_item_processing(&self, item_id: DbId) -> Result<(), StoreError> {
        Ok(BatchRepo::mark_item_processing(&self.pool, item_id).await?)
    }

    async fn set_item_job(&self, item_id: DbId, job_id: DbId) -> Result<(), StoreError> {
        Ok(BatchRepo::set_item_job(&self.pool, item_id, job_id).await?)
    }

    async fn mark_item_completed(&self, item_id: DbId) -> Result<(), StoreError> {
        Ok(BatchRepo::mark_item_completed(&self.pool, item_id).await?)
    }

    async fn mark_item_failed(&self, item_id: DbId, error: &str) -> Result<(), StoreError> {
        Ok(BatchRepo::mark_item_failed(&self.pool, item_id, error).await?)
    }

    async fn delete_item_if_pending(&self, item_id: DbId) -> Result<bool, StoreError> {
        Ok(BatchRepo::delete_item_if_pending(&self.pool, item_id).await?)
    }

    async fn list_items(&self, batch_id: DbId) -> Result<Vec<BatchItem>, StoreError> {
        Ok(BatchRepo::list_items(&self.pool, batch_id).await?)
    }
}
