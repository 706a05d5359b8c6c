//! Persistence for analysis job records.
//!
//! The pipeline depends only on the [`JobStore`] trait. Two backends are
//! provided: [`InMemoryJobStore`] for development and tests, and
//! [`PgJobStore`] backed by PostgreSQL via `sqlx`.

use sqlx::postgres::PgPoolOptions;

pub mod memory;
pub mod repositories;
pub mod store;

pub use memory::InMemoryJobStore;
pub use repositories::PgJobStore;
pub use store::{clamp_limit, clamp_offset, JobStore, StoreError};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Run a trivial query to verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply any pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
