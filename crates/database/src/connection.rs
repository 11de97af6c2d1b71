use crate::error::DbError;
use configuration::DatabaseSettings;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::env;

/// Establishes a connection pool to the PostgreSQL database.
///
/// The URL comes from `database.url` in the configuration, falling back to the
/// `DATABASE_URL` environment variable (the binary loads `.env` beforehand).
pub async fn connect(settings: &DatabaseSettings) -> Result<PgPool, DbError> {
    let database_url = match &settings.url {
        Some(url) => url.clone(),
        None => env::var("DATABASE_URL").map_err(|_e| {
            DbError::ConnectionConfigError("DATABASE_URL must be set.".to_string())
        })?,
    };

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout())
        .connect(&database_url)
        .await?;

    tracing::info!(
        max_connections = settings.max_connections,
        isolation = ?settings.isolation,
        "Connected to PostgreSQL."
    );
    Ok(pool)
}

/// Applies the embedded migrations from `crates/database/migrations`.
///
/// Called by `serve` when `database.run_migrations` is set and by `migrate`.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied.");
    Ok(())
}
