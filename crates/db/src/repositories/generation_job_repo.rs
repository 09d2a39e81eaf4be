//! Repository for the `generation_jobs` table (RF-31).

use sqlx::PgPool;

use reelforge_core::lifecycle::JobStatus;
use reelforge_core::types::{DbId, Timestamp};

use crate::models::generation_job::{GenerationJob, NewGenerationJob};

/// Column list for `generation_jobs` queries.
const COLUMNS: &str = "\
    id, owner_id, status_id, backend_id, style, script, image_urls, \
    aspect_ratio, requested_duration_secs, dispatched_duration_secs, \
    cost_credits, cost_usd, risk_level, quality_tier, auto_regenerate, \
    provider_task_handle, result_url, storage_path, failure_reason, \
    quality_score, quality_issues, \
    regeneration_count, regenerated_from_job_id, \
    created_at, updated_at, completed_at";

/// Provides CRUD operations for generation jobs.
pub struct GenerationJobRepo;

impl GenerationJobRepo {
    /// Create a new job in `processing` state with its full selection
    /// metadata. Returns the created row.
    pub async fn create(
        pool: &PgPool,
        input: &NewGenerationJob,
    ) -> Result<GenerationJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO generation_jobs
                (owner_id, status_id, backend_id, style, script, image_urls,
                 aspect_ratio, requested_duration_secs, dispatched_duration_secs,
                 cost_credits, cost_usd, risk_level, quality_tier,
                 auto_regenerate, regeneration_count, regenerated_from_job_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                     $12, $13, $14, $15, $16)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(input.owner_id)
            .bind(JobStatus::Processing.id())
            .bind(&input.backend_id)
            .bind(&input.style)
            .bind(&input.script)
            .bind(&input.image_urls)
            .bind(&input.aspect_ratio)
            .bind(input.requested_duration_secs)
            .bind(input.dispatched_duration_secs)
            .bind(input.cost_credits)
            .bind(input.cost_usd)
            .bind(&input.risk_level)
            .bind(&input.quality_tier)
            .bind(input.auto_regenerate)
            .bind(input.regeneration_count)
            .bind(input.regenerated_from_job_id)
            .fetch_one(pool)
            .await
    }

    /// Find a job by its primary key.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<GenerationJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generation_jobs WHERE id = $1");
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Delete a job row. Only used by the saga when the debit insert failed
    /// and the row would otherwise be an orphan without a ledger trail.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM generation_jobs WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Store the provider task handle after a successful dispatch.
    pub async fn set_task_handle(
        pool: &PgPool,
        id: DbId,
        task_handle: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE generation_jobs
             SET provider_task_handle = $2, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(task_handle)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a job completed with its result location and quality report.
    ///
    /// The `status_id` guard makes terminal states immutable: a second
    /// settlement attempt matches zero rows instead of rewriting history.
    pub async fn mark_completed(
        pool: &PgPool,
        id: DbId,
        result_url: &str,
        storage_path: Option<&str>,
        quality_score: f64,
        quality_issues: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE generation_jobs
             SET status_id = $2, result_url = $3, storage_path = $4,
                 quality_score = $5, quality_issues = $6,
                 completed_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND status_id = $7",
        )
        .bind(id)
        .bind(JobStatus::Completed.id())
        .bind(result_url)
        .bind(storage_path)
        .bind(quality_score)
        .bind(quality_issues)
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a job failed with a human-readable reason and, when the failure
    /// came from the quality gate, the score and issues that caused it.
    pub async fn mark_failed(
        pool: &PgPool,
        id: DbId,
        reason: &str,
        quality_score: Option<f64>,
        quality_issues: Option<&serde_json::Value>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE generation_jobs
             SET status_id = $2, failure_reason = $3,
                 quality_score = COALESCE($4, quality_score),
                 quality_issues = COALESCE($5, quality_issues),
                 completed_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND status_id = $6",
        )
        .bind(id)
        .bind(JobStatus::Failed.id())
        .bind(reason)
        .bind(quality_score)
        .bind(quality_issues)
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a quality-failed job superseded by a regeneration.
    pub async fn mark_superseded(
        pool: &PgPool,
        id: DbId,
        reason: &str,
        quality_score: f64,
        quality_issues: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE generation_jobs
             SET status_id = $2, failure_reason = $3,
                 quality_score = $4, quality_issues = $5,
                 completed_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND status_id = $6",
        )
        .bind(id)
        .bind(JobStatus::Superseded.id())
        .bind(reason)
        .bind(quality_score)
        .bind(quality_issues)
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// List jobs still in `processing`, oldest first. The completion poller
    /// walks this set every tick.
    pub async fn list_processing(pool: &PgPool) -> Result<Vec<GenerationJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generation_jobs
             WHERE status_id = $1
             ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(JobStatus::Processing.id())
            .fetch_all(pool)
            .await
    }

    /// List `processing` jobs created before `cutoff` — candidates for the
    /// timeout force-fail.
    pub async fn list_processing_older_than(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<Vec<GenerationJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generation_jobs
             WHERE status_id = $1 AND created_at < $2
             ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(JobStatus::Processing.id())
            .bind(cutoff)
            .fetch_all(pool)
            .await
    }
}
