//! Seed the catalog from a YAML file.
//!
//! Products go through the admin service, so seed data obeys the same
//! validation as products created over HTTP. The whole file is validated
//! before anything is written.
//!
//! # File Format
//!
//! ```yaml
//! products:
//!   - name: Sea Salt Candle
//!     price: "19.99"
//!     stock: 12
//!     category: home
//!     image_url: https://cdn.example.com/candle.png
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use tidepool_core::{ProductId, UserId};
use tidepool_storefront::config::StorefrontConfig;
use tidepool_storefront::db::{self, PgStore};
use tidepool_storefront::models::ProductInput;
use tidepool_storefront::services::catalog::validate_product;
use tidepool_storefront::services::{Principal, ServiceSettings, Services, ShopError};

/// Top-level seed file.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    pub products: Vec<ProductInput>,
}

/// A product entry that failed validation.
#[derive(Debug)]
pub struct InvalidEntry {
    /// Zero-based position in the file.
    pub index: usize,
    pub name: String,
    pub error: ShopError,
}

/// Errors from seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0} invalid product entries")]
    Invalid(usize),

    #[error("no database configured (set STOREFRONT_DATABASE_URL or DATABASE_URL)")]
    NoDatabase,
}

/// Parse a seed file.
///
/// # Errors
///
/// Returns `SeedError::Yaml` if the content is not a valid seed file.
pub fn parse(content: &str) -> Result<SeedFile, SeedError> {
    Ok(serde_yaml::from_str(content)?)
}

/// Validate every entry, collecting all failures.
#[must_use]
pub fn validate(file: &SeedFile) -> Vec<InvalidEntry> {
    file.products
        .iter()
        .enumerate()
        .filter_map(|(index, input)| {
            validate_product(ProductId::generate(), input.clone())
                .err()
                .map(|error| InvalidEntry {
                    index,
                    name: input.name.clone(),
                    error,
                })
        })
        .collect()
}

/// Seed catalog products from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, any entry is
/// invalid, no database is configured, or an insert fails.
pub async fn products(file_path: &str, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(SeedError::NotFound(file_path.to_string()).into());
    }

    info!(path = %file_path, "Loading catalog seed file");
    let content = tokio::fs::read_to_string(path).await?;
    let file = parse(&content)?;
    info!(products = file.products.len(), "Parsed seed file");

    let invalid = validate(&file);
    if !invalid.is_empty() {
        error!("Seed validation failed:");
        for entry in &invalid {
            error!("  - #{} ({}): {}", entry.index, entry.name, entry.error);
        }
        return Err(SeedError::Invalid(invalid.len()).into());
    }
    info!("Seed file validated successfully");

    if dry_run {
        info!("Dry run, nothing written");
        return Ok(());
    }

    let config = StorefrontConfig::from_env()?;
    let database_url = config.database_url.as_ref().ok_or(SeedError::NoDatabase)?;
    let pool = db::create_pool(database_url).await?;
    info!("Connected to database");

    let services = Services::new(Arc::new(PgStore::new(pool)), ServiceSettings::default());
    let operator = Principal::admin(UserId::generate());

    let mut created = 0_usize;
    for input in file.products {
        let product = services.admin.create_product(&operator, input).await?;
        info!(product_id = %product.id, name = %product.name, "Created product");
        created += 1;
    }

    info!("Seeding complete!");
    info!("  Products created: {created}");
    Ok(())
}
