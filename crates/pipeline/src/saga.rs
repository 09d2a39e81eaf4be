//! The generation saga: classify -> select -> price -> debit -> dispatch,
//! with defined rollback at every step (RF-43).
//!
//! Guarantees either a durable job row plus exactly one generation debit,
//! or full credit restoration. The one failure it cannot heal — a refund
//! insert failing after a successful debit — is logged above ordinary
//! errors with `accounting_defect = true` and surfaced as
//! [`PipelineError::Accounting`] for manual reconciliation.

use std::sync::Arc;

use reelforge_core::catalog::Catalog;
use reelforge_core::ledger::EntryKind;
use reelforge_core::pricing;
use reelforge_core::risk::{self, RiskLevel};
use reelforge_core::selection::{
    select_backend_risk_aware, Format, QualityTier, SelectionRung, Style,
};
use reelforge_core::types::DbId;
use reelforge_db::models::generation_job::{GenerationJob, NewGenerationJob};
use reelforge_db::stores::{JobStore, LedgerStore, StoreError};
use reelforge_provider::api::DispatchRequest;
use reelforge_provider::breaker::CircuitBreaker;
use reelforge_provider::rate_limit::{Dependency, DependencyLimiters};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::traits::VideoProvider;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A single-item generation request.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub owner_id: DbId,
    pub script: String,
    pub image_urls: Vec<String>,
    pub style: Style,
    pub duration_secs: u32,
    pub quality_tier: QualityTier,
    /// Owner's auto-regeneration opt-in, snapshotted onto the job.
    pub auto_regenerate: bool,
    pub aspect_ratio: String,
}

/// Link carried by a regeneration submission to its quality-failed
/// predecessor.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RegenerationLink {
    pub from_job_id: DbId,
    /// Regeneration count for the new job: predecessor's count plus one.
    pub count: i32,
}

// ---------------------------------------------------------------------------
// Saga
// ---------------------------------------------------------------------------

/// Executes generation sagas against injected collaborators. Cheap to
/// clone; the breaker and rate limiters are process-wide shared instances.
#[derive(Clone)]
pub struct GenerationSaga {
    catalog: Catalog,
    jobs: Arc<dyn JobStore>,
    ledger: Arc<dyn LedgerStore>,
    provider: Arc<dyn VideoProvider>,
    breaker: Arc<CircuitBreaker>,
    limiters: Arc<DependencyLimiters>,
    config: PipelineConfig,
}

impl GenerationSaga {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Catalog,
        jobs: Arc<dyn JobStore>,
        ledger: Arc<dyn LedgerStore>,
        provider: Arc<dyn VideoProvider>,
        breaker: Arc<CircuitBreaker>,
        limiters: Arc<DependencyLimiters>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            catalog,
            jobs,
            ledger,
            provider,
            breaker,
            limiters,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Submit a generation request. Returns the job id once the provider
    /// has accepted the dispatch.
    pub async fn submit(&self, request: SubmitRequest) -> Result<DbId, PipelineError> {
        self.submit_inner(request, None).await
    }

    /// Submit a regeneration for a quality-failed job. Forced to the
    /// premium tier; billed as an ordinary new saga.
    pub(crate) async fn submit_regeneration(
        &self,
        mut request: SubmitRequest,
        link: RegenerationLink,
    ) -> Result<DbId, PipelineError> {
        request.quality_tier = QualityTier::Premium;
        self.submit_inner(request, Some(link)).await
    }

    async fn submit_inner(
        &self,
        request: SubmitRequest,
        regen: Option<RegenerationLink>,
    ) -> Result<DbId, PipelineError> {
        validate_request(&request)?;

        // Step 1: classify, select, price. Pure; nothing persisted yet.
        // A regeneration keeps the re-classified risk in its metadata but
        // selects as if the content were high risk, forcing the highest
        // quality bar the premium tier allows.
        let risk_level = risk::classify(&request.script, request.image_urls.len());
        let selection_risk = if regen.is_some() {
            RiskLevel::High
        } else {
            risk_level
        };
        let format = Format::new(request.style, request.duration_secs);
        let selection =
            select_backend_risk_aware(&self.catalog, format, selection_risk, request.quality_tier);
        if selection.rung != SelectionRung::Primary {
            tracing::info!(
                style = request.style.as_str(),
                backend_id = selection.backend.id,
                rung = ?selection.rung,
                "Backend selection fell back from the primary mapping",
            );
        }
        let backend = selection.backend;
        let plan = pricing::dispatch_plan(backend, request.duration_secs)?;

        // Step 2: durable job row in processing state, full metadata up
        // front. The row is the audit trail even if later steps fail.
        let quality_tier_label = match request.quality_tier {
            QualityTier::Standard => "standard",
            QualityTier::Premium => "premium",
        };
        let job = self
            .jobs
            .create_job(&NewGenerationJob {
                owner_id: request.owner_id,
                backend_id: backend.id.to_string(),
                style: request.style.as_str().to_string(),
                script: request.script.clone(),
                image_urls: serde_json::json!(request.image_urls),
                aspect_ratio: request.aspect_ratio.clone(),
                requested_duration_secs: request.duration_secs as i32,
                dispatched_duration_secs: plan.dispatched_secs as i32,
                cost_credits: plan.credits,
                cost_usd: plan.usd,
                risk_level: risk_level.as_str().to_string(),
                quality_tier: quality_tier_label.to_string(),
                auto_regenerate: request.auto_regenerate,
                regeneration_count: regen.map_or(0, |r| r.count),
                regenerated_from_job_id: regen.map(|r| r.from_job_id),
            })
            .await?;

        // Step 3: balance-checked debit. On any failure the job row is
        // removed so no orphan survives without a ledger trail.
        if let Err(err) = self
            .ledger
            .debit(request.owner_id, plan.credits, job.id)
            .await
        {
            if let Err(delete_err) = self.jobs.delete_job(job.id).await {
                tracing::error!(
                    job_id = job.id,
                    error = %delete_err,
                    "Failed to remove job row after refused debit",
                );
            }
            return Err(match err {
                StoreError::InsufficientBalance { needed, available } => {
                    tracing::info!(
                        owner_id = request.owner_id,
                        needed,
                        available,
                        "Generation rejected: insufficient credits",
                    );
                    PipelineError::InsufficientCredits { needed, available }
                }
                other => other.into(),
            });
        }

        // Step 4: provider dispatch through the breaker.
        match self.dispatch_through_breaker(&request, backend, plan.dispatched_secs, risk_level)
            .await
        {
            Ok(task_handle) => {
                self.jobs.set_task_handle(job.id, &task_handle).await?;
                tracing::info!(
                    job_id = job.id,
                    owner_id = request.owner_id,
                    backend_id = backend.id,
                    cost_credits = plan.credits,
                    task_handle = %task_handle,
                    "Generation dispatched",
                );
                Ok(job.id)
            }
            Err(dispatch_err) => {
                // Terminal status first, then the refund: once the job has
                // left the processing set no later poll tick can refund it
                // a second time.
                let reason = dispatch_err.to_string();
                self.jobs.mark_failed(job.id, &reason, None).await?;
                self.refund(&job).await?;
                Err(dispatch_err)
            }
        }
    }

    /// Call the provider once, guarded by the breaker and the provider
    /// rate limit. Breaker-open failures never reach the network.
    async fn dispatch_through_breaker(
        &self,
        request: &SubmitRequest,
        backend: &reelforge_core::catalog::GenerationBackend,
        dispatched_secs: u32,
        risk_level: RiskLevel,
    ) -> Result<String, PipelineError> {
        let _permit = self.breaker.guard().map_err(|open| {
            tracing::warn!(
                retry_after_secs = open.retry_after.as_secs(),
                "Dispatch refused: upstream known-unhealthy (breaker open)",
            );
            PipelineError::BreakerOpen {
                retry_after: open.retry_after,
            }
        })?;

        self.limiters.acquire(Dependency::VideoProvider).await;

        let dispatch = DispatchRequest {
            model: backend.provider_model.to_string(),
            script: request.script.clone(),
            image_urls: request.image_urls.clone(),
            aspect_ratio: request.aspect_ratio.clone(),
            duration_secs: dispatched_secs,
            risk_hint: Some(risk_level.as_str().to_string()),
            tier_hint: match request.quality_tier {
                QualityTier::Premium => Some("premium".to_string()),
                QualityTier::Standard => None,
            },
        };

        match self.provider.dispatch(&dispatch).await {
            Ok(handle) => {
                self.breaker.record_success();
                Ok(handle)
            }
            Err(err) => {
                self.breaker.record_failure();
                tracing::warn!(error = %err, "Upstream provider call failed");
                Err(PipelineError::Dependency {
                    dependency: "video_provider",
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Insert the refund offsetting a job's debit. A failure here is the
    /// accounting defect: credits are lost, not just a job, so it is
    /// logged distinctly for alerting and manual reconciliation.
    pub(crate) async fn refund(&self, job: &GenerationJob) -> Result<(), PipelineError> {
        match self
            .ledger
            .credit(
                job.owner_id,
                job.cost_credits,
                EntryKind::Refund,
                Some(job.id),
            )
            .await
        {
            Ok(_) => {
                tracing::info!(
                    job_id = job.id,
                    owner_id = job.owner_id,
                    credits = job.cost_credits,
                    "Refund issued",
                );
                Ok(())
            }
            Err(err) => {
                tracing::error!(
                    accounting_defect = true,
                    job_id = job.id,
                    owner_id = job.owner_id,
                    credits = job.cost_credits,
                    error = %err,
                    "Refund insert failed after debit; manual reconciliation required",
                );
                Err(PipelineError::Accounting {
                    job_id: job.id,
                    reason: err.to_string(),
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_request(request: &SubmitRequest) -> Result<(), PipelineError> {
    if request.script.trim().is_empty() {
        return Err(PipelineError::Validation(
            "Script must not be empty".to_string(),
        ));
    }
    if request.image_urls.is_empty() {
        return Err(PipelineError::Validation(
            "At least one reference image is required".to_string(),
        ));
    }
    if request.duration_secs == 0 {
        return Err(PipelineError::Validation(
            "Requested duration must be at least 1 second".to_string(),
        ));
    }
    Ok(())
}
