//! Persistence layer: sqlx/Postgres models, repositories, and the store
//! traits consumed by the pipeline.

use sqlx::postgres::PgPoolOptions;

pub mod models;
pub mod repositories;
pub mod stores;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Cheap connectivity check for readiness probes.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
