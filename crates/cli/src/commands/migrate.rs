//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! tidepool-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back
//!   to `DATABASE_URL`)
//!
//! Migrations live in `crates/storefront/migrations/` and are embedded into
//! the storefront library at build time.

use thiserror::Error;
use tracing::info;

use tidepool_storefront::config::{ConfigError, StorefrontConfig};
use tidepool_storefront::db::{self, postgres::MIGRATOR};

/// Errors from running migrations.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("no database configured (set STOREFRONT_DATABASE_URL or DATABASE_URL)")]
    NoDatabase,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns `MigrationError` if no database is configured, the connection
/// fails or a migration fails to apply.
pub async fn storefront() -> Result<(), MigrationError> {
    let config = StorefrontConfig::from_env()?;
    let database_url = config.database_url.ok_or(MigrationError::NoDatabase)?;

    info!("Connecting to storefront database...");
    let pool = db::create_pool(&database_url).await?;

    info!(migrations = MIGRATOR.iter().count(), "Running storefront migrations...");
    MIGRATOR.run(&pool).await?;

    info!("Storefront migrations complete!");
    Ok(())
}
