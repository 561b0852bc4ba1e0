//! Database repositories
//!
//! Each repository owns one table and implements the matching store trait.

pub mod entity;
pub mod media;
pub mod traits;
pub mod workflow;

pub use entity::EntityRepository;
pub use media::MediaRepository;
pub use workflow::{WorkflowExecutionRepository, WorkflowRuleRepository};

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await
        .context("Failed to connect to database")
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");
    Ok(())
}
