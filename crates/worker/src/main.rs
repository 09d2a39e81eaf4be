//! Completion worker: polls processing jobs, runs the quality gate, and
//! settles the ledger.

mod collaborators;

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reelforge_core::catalog::Catalog;
use reelforge_db::stores::PgStores;
use reelforge_pipeline::completion::CompletionPoller;
use reelforge_pipeline::config::PipelineConfig;
use reelforge_pipeline::saga::GenerationSaga;
use reelforge_provider::api::VideoApi;
use reelforge_provider::breaker::{BreakerConfig, CircuitBreaker};
use reelforge_provider::rate_limit::{DependencyLimiters, RateLimitConfig};

use crate::collaborators::{LocalObjectStore, SizeHeuristicScorer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reelforge_worker=debug,reelforge_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let provider_base_url = std::env::var("PROVIDER_BASE_URL")
        .unwrap_or_else(|_| "https://api.pixelwave.example".into());
    let provider_api_key =
        std::env::var("PROVIDER_API_KEY").expect("PROVIDER_API_KEY must be set");
    let storage_root = std::env::var("RESULT_STORAGE_ROOT")
        .unwrap_or_else(|_| "/var/lib/reelforge/results".into());

    let pool = reelforge_db::create_pool(&database_url).await?;
    reelforge_db::health_check(&pool).await?;

    let stores = Arc::new(PgStores::new(pool));
    let provider = Arc::new(VideoApi::new(provider_base_url, provider_api_key));
    let breaker = Arc::new(CircuitBreaker::new(BreakerConfig::default()));
    let limiters = Arc::new(DependencyLimiters::new(&RateLimitConfig::default()));
    let config = PipelineConfig::from_env();

    let saga = GenerationSaga::new(
        Catalog::builtin(),
        stores.clone(),
        stores.clone(),
        provider.clone(),
        breaker,
        limiters.clone(),
        config,
    );

    let poller = CompletionPoller::new(
        stores,
        provider,
        Arc::new(LocalObjectStore::new(PathBuf::from(storage_root))),
        Arc::new(SizeHeuristicScorer::new()),
        limiters,
        saga,
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            shutdown.cancel();
        }
    });

    tracing::info!("Completion worker starting");
    poller.run(cancel).await;
    Ok(())
}
