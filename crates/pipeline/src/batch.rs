//! Windowed batch orchestration (RF-45).
//!
//! Fans a batch out over fixed-size concurrency windows. Inside a window
//! each item runs the full scrape -> script -> saga chain as its own task,
//! staggered by a small per-item delay; an inter-window delay separates
//! windows as a second backpressure layer on top of the per-dependency
//! rate limits. One item's failure is recorded on that item alone and
//! never aborts its siblings.

use std::sync::Arc;

use tokio::task::JoinSet;

use reelforge_core::batching::{self, stagger_delay};
use reelforge_core::lifecycle::BatchStatus;
use reelforge_core::pricing;
use reelforge_core::selection::{select_backend, Format, QualityTier, Style};
use reelforge_core::types::DbId;
use reelforge_db::models::batch::{BatchItem, BatchJob, NewBatch, NewBatchItem};
use reelforge_db::stores::BatchStore;
use reelforge_provider::rate_limit::{Dependency, DependencyLimiters};

use crate::error::PipelineError;
use crate::saga::{GenerationSaga, SubmitRequest};
use crate::traits::{ContentSource, ScriptGenerator};

// ---------------------------------------------------------------------------
// Request & outcome
// ---------------------------------------------------------------------------

/// A batch submission: N source URLs to turn into videos.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub owner_id: DbId,
    pub quality_tier: QualityTier,
    pub auto_regenerate: bool,
    pub items: Vec<NewBatchItem>,
}

/// Aggregate result of a batch run.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub batch: BatchJob,
    pub succeeded: usize,
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs batches against the shared saga. Clone-cheap: every field is an
/// `Arc` or `Copy` data.
#[derive(Clone)]
pub struct BatchOrchestrator {
    batches: Arc<dyn BatchStore>,
    content_source: Arc<dyn ContentSource>,
    script_generator: Arc<dyn ScriptGenerator>,
    limiters: Arc<DependencyLimiters>,
    saga: GenerationSaga,
}

impl BatchOrchestrator {
    pub fn new(
        batches: Arc<dyn BatchStore>,
        content_source: Arc<dyn ContentSource>,
        script_generator: Arc<dyn ScriptGenerator>,
        limiters: Arc<DependencyLimiters>,
        saga: GenerationSaga,
    ) -> Self {
        Self {
            batches,
            content_source,
            script_generator,
            limiters,
            saga,
        }
    }

    /// Validate, persist, and run a batch to item-level completion.
    pub async fn run_batch(&self, request: BatchRequest) -> Result<BatchOutcome, PipelineError> {
        batching::validate_batch_size(request.items.len()).map_err(PipelineError::from)?;
        for item in &request.items {
            Style::parse(&item.style)?;
            if item.duration_secs <= 0 {
                return Err(PipelineError::Validation(format!(
                    "Item '{}' has a non-positive duration",
                    item.source_url
                )));
            }
        }

        let reserved_credits = self.quote(&request)?;
        let (batch, items) = self
            .batches
            .create_batch(&NewBatch {
                owner_id: request.owner_id,
                reserved_credits,
                items: request.items.clone(),
            })
            .await?;
        self.batches.mark_batch_running(batch.id).await?;
        tracing::info!(
            batch_id = batch.id,
            owner_id = request.owner_id,
            item_count = items.len(),
            reserved_credits,
            "Batch started",
        );

        let window_size = self.saga.config().batch_window_size.max(1);
        let mut succeeded = 0usize;
        let mut failed = 0usize;

        let windows: Vec<&[BatchItem]> = items.chunks(window_size).collect();
        let window_total = windows.len();
        for (window_index, window) in windows.into_iter().enumerate() {
            let mut tasks: JoinSet<bool> = JoinSet::new();
            for (offset, item) in window.iter().enumerate() {
                let this = self.clone();
                let item = item.clone();
                let owner_id = request.owner_id;
                let quality_tier = request.quality_tier;
                let auto_regenerate = request.auto_regenerate;
                let delay = stagger_delay(offset, self.saga.config().item_stagger.as_millis() as u64);
                tasks.spawn(async move {
                    tokio::time::sleep(delay).await;
                    this.process_item(owner_id, quality_tier, auto_regenerate, &item)
                        .await
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(true) => succeeded += 1,
                    Ok(false) => failed += 1,
                    Err(e) => {
                        // A panicked item task counts as that item's failure;
                        // siblings keep running.
                        tracing::error!(batch_id = batch.id, error = %e, "Item task panicked");
                        failed += 1;
                    }
                }
            }

            if window_index + 1 < window_total {
                tokio::time::sleep(self.saga.config().inter_window_delay).await;
            }
        }

        let status = if succeeded == 0 && failed > 0 {
            BatchStatus::Failed
        } else {
            BatchStatus::Completed
        };
        let error_message = (failed > 0).then(|| format!("{failed} of {} items failed", items.len()));
        self.batches
            .finalize_batch(batch.id, status, error_message.as_deref())
            .await?;
        tracing::info!(
            batch_id = batch.id,
            succeeded,
            failed,
            status = status.as_str(),
            "Batch finished",
        );

        let batch = BatchJob {
            status_id: status.id(),
            error_message,
            ..batch
        };
        Ok(BatchOutcome {
            batch,
            succeeded,
            failed,
        })
    }

    /// One item: scrape, generate a script, run the saga. Returns whether
    /// the item succeeded; every failure path records the reason on the
    /// item and nothing else.
    async fn process_item(
        &self,
        owner_id: DbId,
        quality_tier: QualityTier,
        auto_regenerate: bool,
        item: &BatchItem,
    ) -> bool {
        if let Err(e) = self.batches.mark_item_processing(item.id).await {
            tracing::error!(item_id = item.id, error = %e, "Failed to mark item processing");
            return false;
        }

        match self
            .run_item_chain(owner_id, quality_tier, auto_regenerate, item)
            .await
        {
            Ok(job_id) => {
                let linked = self.batches.set_item_job(item.id, job_id).await;
                let completed = self.batches.mark_item_completed(item.id).await;
                if let Err(e) = linked.and(completed) {
                    tracing::error!(item_id = item.id, error = %e, "Failed to finalize item");
                    return false;
                }
                true
            }
            Err(e) => {
                tracing::warn!(
                    item_id = item.id,
                    source_url = %item.source_url,
                    error = %e,
                    "Batch item failed",
                );
                if let Err(store_err) = self
                    .batches
                    .mark_item_failed(item.id, &e.to_string())
                    .await
                {
                    tracing::error!(
                        item_id = item.id,
                        error = %store_err,
                        "Failed to record item failure",
                    );
                }
                false
            }
        }
    }

    async fn run_item_chain(
        &self,
        owner_id: DbId,
        quality_tier: QualityTier,
        auto_regenerate: bool,
        item: &BatchItem,
    ) -> Result<DbId, PipelineError> {
        let style = Style::parse(&item.style)?;

        self.limiters.acquire(Dependency::ContentSource).await;
        let content = self
            .content_source
            .fetch(&item.source_url)
            .await
            .map_err(|e| PipelineError::Dependency {
                dependency: "content_source",
                reason: e.to_string(),
            })?;

        self.limiters.acquire(Dependency::ScriptGenerator).await;
        let script = self
            .script_generator
            .generate(
                &content.title,
                &content.description,
                style,
                item.duration_secs as u32,
            )
            .await
            .map_err(|e| PipelineError::Dependency {
                dependency: "script_generator",
                reason: e.to_string(),
            })?;

        self.saga
            .submit(SubmitRequest {
                owner_id,
                script,
                image_urls: content.images,
                style,
                duration_secs: item.duration_secs as u32,
                quality_tier,
                auto_regenerate,
                aspect_ratio: "9:16".to_string(),
            })
            .await
    }

    /// Delete a not-yet-dispatched item. Deletion is a ledger no-op by
    /// construction; once the item has a job (and therefore a debit) it is
    /// blocked until the job reaches a terminal state.
    pub async fn delete_item(&self, item_id: DbId) -> Result<(), PipelineError> {
        if self.batches.delete_item_if_pending(item_id).await? {
            tracing::info!(item_id, "Batch item deleted before dispatch");
            Ok(())
        } else {
            Err(PipelineError::Conflict(
                "Item already dispatched; it can only be deleted once its job is terminal"
                    .to_string(),
            ))
        }
    }

    /// Quote the credits a batch will reserve, using the capped
    /// single-call price per item under the pure format selection.
    fn quote(&self, request: &BatchRequest) -> Result<i64, PipelineError> {
        let mut total = 0i64;
        for item in &request.items {
            let style = Style::parse(&item.style)?;
            let format = Format::new(style, item.duration_secs as u32);
            let backend = select_backend(self.saga.catalog(), format).backend;
            let plan = pricing::dispatch_plan(backend, item.duration_secs as u32)?;
            total += plan.credits;
        }
        Ok(total)
    }
}
