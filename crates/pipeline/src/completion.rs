//! Completion poller: provider status polling, the timeout force-fail,
//! the quality gate, and the bounded auto-regeneration controller (RF-44).
//!
//! Per job:
//!
//! `PROCESSING -> (provider success) -> [validate] -> COMPLETED`
//! `PROCESSING -> (validate fails)   -> SUPERSEDED -> new PROCESSING job`
//!                                   `-> FAILED (refunded)` when no
//!                                       regeneration is available
//! `PROCESSING -> (provider failure | timeout) -> FAILED (refunded)`
//!
//! Jobs complete out of order; every tick walks the processing set and
//! handles whatever the provider reports. A dispatched task cannot be
//! cancelled — the only exits are completion, failure, and the timeout
//! force-fail that bounds exposure to a provider silently dropping tasks.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use reelforge_core::quality::{self, QualityVerdict, RegenDecision};
use reelforge_core::selection::{QualityTier, Style};
use reelforge_db::models::generation_job::GenerationJob;
use reelforge_db::stores::JobStore;
use reelforge_provider::rate_limit::{Dependency, DependencyLimiters};
use reelforge_provider::wire::TaskStatus;

use crate::error::PipelineError;
use crate::saga::{GenerationSaga, RegenerationLink, SubmitRequest};
use crate::traits::{ObjectStore, QualityScorer, VideoProvider};

/// Polls processing jobs until cancelled.
#[derive(Clone)]
pub struct CompletionPoller {
    jobs: Arc<dyn JobStore>,
    provider: Arc<dyn VideoProvider>,
    object_store: Arc<dyn ObjectStore>,
    scorer: Arc<dyn QualityScorer>,
    limiters: Arc<DependencyLimiters>,
    saga: GenerationSaga,
}

impl CompletionPoller {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        provider: Arc<dyn VideoProvider>,
        object_store: Arc<dyn ObjectStore>,
        scorer: Arc<dyn QualityScorer>,
        limiters: Arc<DependencyLimiters>,
        saga: GenerationSaga,
    ) -> Self {
        Self {
            jobs,
            provider,
            object_store,
            scorer,
            limiters,
            saga,
        }
    }

    /// Run the poll loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.saga.config().poll_interval);
        tracing::info!(
            poll_interval_ms = self.saga.config().poll_interval.as_millis() as u64,
            "Completion poller started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Completion poller shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        tracing::error!(error = %e, "Poll cycle failed");
                    }
                }
            }
        }
    }

    /// One poll cycle over every processing job. A job whose handling
    /// fails is logged and retried next tick; it never stalls the rest of
    /// the set.
    pub async fn poll_once(&self) -> Result<(), PipelineError> {
        let processing = self.jobs.list_processing().await?;
        for job in processing {
            if let Err(e) = self.process_job(&job).await {
                tracing::error!(job_id = job.id, error = %e, "Failed to process job");
            }
        }
        Ok(())
    }

    async fn process_job(&self, job: &GenerationJob) -> Result<(), PipelineError> {
        // Timeout first, independent of provider state: a silently dropped
        // task must not hold credits hostage forever.
        let age = chrono::Utc::now() - job.created_at;
        let timeout = self.saga.config().processing_timeout;
        if age.to_std().unwrap_or_default() >= timeout {
            let reason = format!(
                "Generation timed out after {} minutes",
                timeout.as_secs() / 60
            );
            tracing::warn!(job_id = job.id, "Job exceeded processing ceiling");
            // Terminal status before the refund: once the job leaves the
            // processing set, no later tick can refund it twice.
            self.jobs.mark_failed(job.id, &reason, None).await?;
            self.saga.refund(job).await?;
            return Ok(());
        }

        let Some(task_handle) = job.provider_task_handle.as_deref() else {
            // Dispatch confirmed but the handle write raced a crash. The
            // timeout above is the backstop; nothing to poll yet.
            tracing::warn!(job_id = job.id, "Processing job has no task handle");
            return Ok(());
        };

        self.limiters.acquire(Dependency::VideoProvider).await;
        let status = match self.provider.poll_status(task_handle).await {
            Ok(status) => status,
            Err(e) => {
                // A failed poll is transient: leave the job processing and
                // let the next tick (or the timeout) resolve it.
                tracing::warn!(job_id = job.id, error = %e, "Status poll failed");
                return Ok(());
            }
        };

        match status {
            TaskStatus::Processing => Ok(()),
            TaskStatus::Failed { error } => {
                self.jobs.mark_failed(job.id, &error, None).await?;
                self.saga.refund(job).await?;
                tracing::info!(job_id = job.id, reason = %error, "Provider reported failure");
                Ok(())
            }
            TaskStatus::Succeeded { result_url } => self.validate(job, &result_url).await,
        }
    }

    /// Quality-gate a finished render and settle the job.
    async fn validate(&self, job: &GenerationJob, result_url: &str) -> Result<(), PipelineError> {
        // Storage failures are non-fatal: fall back to the provider URL.
        let storage_path = match self
            .object_store
            .store(result_url, job.owner_id, job.id)
            .await
        {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(
                    job_id = job.id,
                    error = %e,
                    "Object storage failed, keeping provider url",
                );
                None
            }
        };

        let report = match self.scorer.score(job, result_url).await {
            Ok(report) => report,
            Err(e) => {
                // Scorer outage: retry next tick, bounded by the timeout.
                tracing::warn!(job_id = job.id, error = %e, "Quality scoring failed");
                return Ok(());
            }
        };

        let threshold = self.saga.config().quality_threshold;
        match quality::evaluate(report.score, threshold) {
            QualityVerdict::Pass => {
                self.jobs
                    .mark_completed(
                        job.id,
                        result_url,
                        storage_path.as_deref(),
                        report.score,
                        &report.issues,
                    )
                    .await?;
                tracing::info!(
                    job_id = job.id,
                    score = report.score,
                    "Generation completed",
                );
                Ok(())
            }
            QualityVerdict::Fail => {
                let reason = quality::quality_failure_reason(&report, threshold);
                let decision = quality::regeneration_decision(
                    job.auto_regenerate,
                    job.regeneration_count,
                    self.saga.config().max_auto_regenerations,
                );
                match decision {
                    RegenDecision::Regenerate => self.regenerate(job, &report, &reason).await,
                    RegenDecision::Refund => {
                        self.jobs
                            .mark_failed(
                                job.id,
                                &reason,
                                Some((report.score, report.issues.clone())),
                            )
                            .await?;
                        self.saga.refund(job).await?;
                        tracing::info!(
                            job_id = job.id,
                            score = report.score,
                            "Quality failure refunded",
                        );
                        Ok(())
                    }
                }
            }
        }
    }

    /// Supersede a quality-failed job with one premium-tier retry.
    ///
    /// The original debit is refunded at supersession and the new attempt
    /// is billed as an ordinary saga, so each job's ledger entries settle
    /// independently and the owner is never double-charged.
    async fn regenerate(
        &self,
        job: &GenerationJob,
        report: &reelforge_core::quality::QualityReport,
        reason: &str,
    ) -> Result<(), PipelineError> {
        self.jobs
            .mark_superseded(job.id, reason, report.score, &report.issues)
            .await?;
        self.saga.refund(job).await?;

        let style = Style::parse(&job.style)?;
        let request = SubmitRequest {
            owner_id: job.owner_id,
            script: job.script.clone(),
            image_urls: job.image_urls_vec(),
            style,
            duration_secs: job.requested_duration_secs as u32,
            quality_tier: QualityTier::Premium,
            auto_regenerate: job.auto_regenerate,
            aspect_ratio: job.aspect_ratio.clone(),
        };
        let link = RegenerationLink {
            from_job_id: job.id,
            count: job.regeneration_count + 1,
        };

        match self.saga.submit_regeneration(request, link).await {
            Ok(new_job_id) => {
                tracing::info!(
                    job_id = job.id,
                    new_job_id,
                    score = report.score,
                    "Quality failure triggered auto-regeneration",
                );
                Ok(())
            }
            Err(e) => {
                // The original is already superseded and refunded; the
                // regeneration's own saga cleaned up after itself.
                tracing::warn!(
                    job_id = job.id,
                    error = %e,
                    "Auto-regeneration submission failed",
                );
                Err(e)
            }
        }
    }
}
