use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::resumes::repository::ensure_schema;

/// Creates a PostgreSQL connection pool and makes sure the schema exists.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    ensure_schema(&pool)
        .await
        .context("Failed to create the resumes schema")?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}
