//! Behavioral tests for the completion poller: settlement, timeout
//! force-fail, the quality gate, and the bounded auto-regeneration.

mod support;

use reelforge_core::lifecycle::JobStatus;
use reelforge_core::quality::ISSUE_ARTIFACTS;
use reelforge_provider::wire::TaskStatus;

use support::{submit_request, Harness, REQUEST_CREDITS};

const OWNER: i64 = 11;
const RESULT_URL: &str = "https://cdn.provider.example/render.mp4";

/// Submit the standard request and return (job id, task handle).
async fn dispatched_job(h: &Harness, auto_regenerate: bool) -> (i64, String) {
    h.stores.grant(OWNER, 10_000);
    let mut request = submit_request(OWNER);
    request.auto_regenerate = auto_regenerate;
    let job_id = h.saga.submit(request).await.unwrap();
    let handle = h.stores.job(job_id).provider_task_handle.unwrap();
    (job_id, handle)
}

#[tokio::test]
async fn provider_success_passing_quality_completes() {
    let h = Harness::new();
    let (job_id, handle) = dispatched_job(&h, false).await;

    h.provider.push_poll(
        &handle,
        TaskStatus::Succeeded {
            result_url: RESULT_URL.to_string(),
        },
    );
    h.poller.poll_once().await.unwrap();

    let job = h.stores.job(job_id);
    assert_eq!(job.status_id, JobStatus::Completed.id());
    assert_eq!(job.result_url.as_deref(), Some(RESULT_URL));
    assert_eq!(
        job.storage_path.as_deref(),
        Some(format!("owners/{OWNER}/jobs/{job_id}.mp4").as_str()),
    );
    assert_eq!(job.quality_score, Some(1.0));

    // Completed work keeps its single debit.
    assert_eq!(h.stores.job_entry_amounts(job_id), vec![-REQUEST_CREDITS]);
}

#[tokio::test]
async fn still_processing_jobs_are_left_alone() {
    let h = Harness::new();
    let (job_id, _handle) = dispatched_job(&h, false).await;

    // Default poll answer is Processing.
    h.poller.poll_once().await.unwrap();

    let job = h.stores.job(job_id);
    assert_eq!(job.status_id, JobStatus::Processing.id());
    assert_eq!(h.stores.job_entry_amounts(job_id), vec![-REQUEST_CREDITS]);
}

#[tokio::test]
async fn provider_failure_refunds_and_fails() {
    let h = Harness::new();
    let (job_id, handle) = dispatched_job(&h, false).await;

    h.provider.push_poll(
        &handle,
        TaskStatus::Failed {
            error: "render node crashed".to_string(),
        },
    );
    h.poller.poll_once().await.unwrap();

    let job = h.stores.job(job_id);
    assert_eq!(job.status_id, JobStatus::Failed.id());
    assert_eq!(job.failure_reason.as_deref(), Some("render node crashed"));
    assert_eq!(h.stores.job_entry_amounts(job_id).iter().sum::<i64>(), 0);
    assert_eq!(h.stores.balance_of(OWNER), 10_000);
}

#[tokio::test]
async fn stale_processing_job_is_force_failed_and_refunded() {
    let h = Harness::new();
    let (job_id, _handle) = dispatched_job(&h, false).await;

    // Backdate past the 60-minute ceiling. No provider answer needed: the
    // timeout applies independent of provider state.
    h.stores
        .set_job_created_at(job_id, chrono::Utc::now() - chrono::Duration::hours(2));
    h.poller.poll_once().await.unwrap();

    let job = h.stores.job(job_id);
    assert_eq!(job.status_id, JobStatus::Failed.id());
    assert!(job.failure_reason.as_deref().unwrap().contains("timed out"));
    assert_eq!(h.stores.job_entry_amounts(job_id).iter().sum::<i64>(), 0);
    assert_eq!(h.stores.balance_of(OWNER), 10_000);
}

#[tokio::test]
async fn quality_failure_without_opt_in_refunds_with_details() {
    let h = Harness::new();
    let (job_id, handle) = dispatched_job(&h, false).await;

    h.provider.push_poll(
        &handle,
        TaskStatus::Succeeded {
            result_url: RESULT_URL.to_string(),
        },
    );
    h.scorer.push_report(0.42, &[ISSUE_ARTIFACTS]);
    h.poller.poll_once().await.unwrap();

    let job = h.stores.job(job_id);
    assert_eq!(job.status_id, JobStatus::Failed.id());
    let reason = job.failure_reason.unwrap();
    assert!(reason.contains("0.42"), "reason should carry the score");
    assert!(reason.contains(ISSUE_ARTIFACTS));
    assert_eq!(job.quality_score, Some(0.42));
    assert_eq!(h.stores.job_entry_amounts(job_id).iter().sum::<i64>(), 0);
    assert_eq!(h.stores.job_count(), 1, "no regeneration without opt-in");
}

#[tokio::test]
async fn quality_failure_with_opt_in_regenerates_at_premium() {
    let h = Harness::new();
    let (job_id, handle) = dispatched_job(&h, true).await;

    h.provider.push_poll(
        &handle,
        TaskStatus::Succeeded {
            result_url: RESULT_URL.to_string(),
        },
    );
    h.scorer.push_report(0.42, &[ISSUE_ARTIFACTS]);
    h.poller.poll_once().await.unwrap();

    // Original: superseded, refunded.
    let original = h.stores.job(job_id);
    assert_eq!(original.status_id, JobStatus::Superseded.id());
    assert_eq!(h.stores.job_entry_amounts(job_id).iter().sum::<i64>(), 0);

    // Regeneration: new processing job, premium tier, flagship backend,
    // linked back to the original, billed as its own saga.
    let jobs = h.stores.all_jobs();
    assert_eq!(jobs.len(), 2);
    let regen = jobs.iter().find(|j| j.id != job_id).unwrap();
    assert_eq!(regen.status_id, JobStatus::Processing.id());
    assert_eq!(regen.quality_tier, "premium");
    assert_eq!(regen.backend_id, "aurora-max");
    assert_eq!(regen.regeneration_count, 1);
    assert_eq!(regen.regenerated_from_job_id, Some(job_id));
    assert_eq!(
        h.stores.job_entry_amounts(regen.id),
        vec![-regen.cost_credits],
    );

    // Net owner effect: only the regeneration's debit is outstanding.
    assert_eq!(h.stores.balance_of(OWNER), 10_000 - regen.cost_credits);
}

#[tokio::test]
async fn regenerated_job_failing_quality_goes_straight_to_refund() {
    let h = Harness::new();
    let (job_id, handle) = dispatched_job(&h, true).await;

    // First quality failure triggers the regeneration.
    h.provider.push_poll(
        &handle,
        TaskStatus::Succeeded {
            result_url: RESULT_URL.to_string(),
        },
    );
    h.scorer.push_report(0.42, &[ISSUE_ARTIFACTS]);
    h.poller.poll_once().await.unwrap();

    let regen = h
        .stores
        .all_jobs()
        .into_iter()
        .find(|j| j.id != job_id)
        .unwrap();
    let regen_handle = regen.provider_task_handle.clone().unwrap();

    // The regeneration also renders badly.
    h.provider.push_poll(
        &regen_handle,
        TaskStatus::Succeeded {
            result_url: RESULT_URL.to_string(),
        },
    );
    h.scorer.push_report(0.35, &[ISSUE_ARTIFACTS]);
    h.poller.poll_once().await.unwrap();

    // Cap of one: the second failure refunds instead of regenerating.
    let settled = h.stores.job(regen.id);
    assert_eq!(settled.status_id, JobStatus::Failed.id());
    assert_eq!(h.stores.job_count(), 2, "no second regeneration");
    assert_eq!(h.stores.job_entry_amounts(regen.id).iter().sum::<i64>(), 0);

    // Every debit has been offset; the owner is fully restored.
    assert_eq!(h.stores.balance_of(OWNER), 10_000);
}

#[tokio::test]
async fn storage_failure_falls_back_to_provider_url() {
    let h = Harness::new();
    let (job_id, handle) = dispatched_job(&h, false).await;

    h.object_store.fail_stores();
    h.provider.push_poll(
        &handle,
        TaskStatus::Succeeded {
            result_url: RESULT_URL.to_string(),
        },
    );
    h.poller.poll_once().await.unwrap();

    let job = h.stores.job(job_id);
    assert_eq!(job.status_id, JobStatus::Completed.id());
    assert_eq!(job.result_url.as_deref(), Some(RESULT_URL));
    assert!(job.storage_path.is_none());
}

#[tokio::test]
async fn out_of_order_completions_settle_independently() {
    let h = Harness::new();
    h.stores.grant(OWNER, 10_000);

    let first = h.saga.submit(submit_request(OWNER)).await.unwrap();
    let second = h.saga.submit(submit_request(OWNER)).await.unwrap();
    let second_handle = h.stores.job(second).provider_task_handle.unwrap();

    // The later job completes first; the earlier one is still rendering.
    h.provider.push_poll(
        &second_handle,
        TaskStatus::Succeeded {
            result_url: RESULT_URL.to_string(),
        },
    );
    h.poller.poll_once().await.unwrap();

    assert_eq!(h.stores.job(second).status_id, JobStatus::Completed.id());
    assert_eq!(h.stores.job(first).status_id, JobStatus::Processing.id());
}
