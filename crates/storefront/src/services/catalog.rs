//! Catalog reads and product validation.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::instrument;

use tidepool_core::{Price, ProductId};

use super::error::{ShopError, ShopResult};
use crate::db::Store;
use crate::models::{Product, ProductInput};

/// Minimum product name length after trimming.
const MIN_NAME_CHARS: usize = 2;

/// Highest unit price the catalog accepts.
pub const MAX_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Public, unauthenticated catalog access.
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
}

impl CatalogService {
    /// Create a new catalog service.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// All products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::BackendUnavailable` if the store fails.
    #[instrument(skip(self))]
    pub async fn list(&self) -> ShopResult<Vec<Product>> {
        Ok(self.store.list_products().await?)
    }

    /// A single product.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` if the product does not exist.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get(&self, id: ProductId) -> ShopResult<Product> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| ShopError::NotFound(format!("product {id}")))
    }
}

/// Validate submitted product fields and build a product.
///
/// Fields are checked in order (name, price, stock, image URL) and the first
/// failure is reported. Blank optional text fields become `None`.
///
/// # Errors
///
/// Returns `ShopError::Validation` naming the offending field.
pub fn validate_product(id: ProductId, input: ProductInput) -> ShopResult<Product> {
    let name = input.name.trim();
    if name.chars().count() < MIN_NAME_CHARS {
        return Err(ShopError::validation(
            "name",
            format!("must be at least {MIN_NAME_CHARS} characters"),
        ));
    }

    let price = Price::new(input.price)
        .ok()
        .filter(Price::is_positive)
        .ok_or_else(|| ShopError::validation("price", "must be greater than zero"))?;
    if price.amount() > MAX_PRICE {
        return Err(ShopError::validation(
            "price",
            format!("must be at most {MAX_PRICE}"),
        ));
    }

    if input.stock < 0 {
        return Err(ShopError::validation("stock", "cannot be negative"));
    }
    // Stored as a signed 32-bit column.
    let stock = i32::try_from(input.stock)
        .ok()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| ShopError::validation("stock", "is too large"))?;

    let image_url = non_blank(input.image_url)
        .map(|raw| validate_image_url(&raw).map(|()| raw))
        .transpose()?;

    Ok(Product {
        id,
        name: name.to_string(),
        description: non_blank(input.description),
        price,
        stock,
        category: non_blank(input.category),
        image_url,
        created_at: Utc::now(),
    })
}

fn validate_image_url(raw: &str) -> ShopResult<()> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| ShopError::validation("image_url", format!("invalid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ShopError::validation(
            "image_url",
            format!("unsupported scheme: {other}"),
        )),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::InMemoryStore;

    fn input() -> ProductInput {
        ProductInput {
            name: "Sea Salt Candle".to_string(),
            description: Some("  ".to_string()),
            price: Decimal::new(1999, 2),
            stock: 5,
            category: Some("home".to_string()),
            image_url: Some("https://cdn.example.com/candle.png".to_string()),
        }
    }

    fn field_of(err: ShopError) -> &'static str {
        match err {
            ShopError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_product() {
        let product = validate_product(ProductId::generate(), input()).unwrap();
        assert_eq!(product.name, "Sea Salt Candle");
        assert_eq!(product.description, None);
        assert_eq!(product.price.amount(), Decimal::new(1999, 2));
        assert_eq!(product.stock, 5);
        assert_eq!(product.category.as_deref(), Some("home"));
    }

    #[test]
    fn test_short_name_rejected() {
        let mut bad = input();
        bad.name = " x ".to_string();
        assert_eq!(field_of(validate_product(ProductId::generate(), bad).unwrap_err()), "name");
    }

    #[test]
    fn test_zero_and_negative_price_rejected() {
        for price in [Decimal::ZERO, Decimal::new(-1, 0)] {
            let mut bad = input();
            bad.price = price;
            assert_eq!(
                field_of(validate_product(ProductId::generate(), bad).unwrap_err()),
                "price"
            );
        }
    }

    #[test]
    fn test_price_upper_bound() {
        let mut at_cap = input();
        at_cap.price = MAX_PRICE;
        assert!(validate_product(ProductId::generate(), at_cap).is_ok());

        for price in [MAX_PRICE + Decimal::new(1, 2), Decimal::MAX] {
            let mut bad = input();
            bad.price = price;
            assert_eq!(
                field_of(validate_product(ProductId::generate(), bad).unwrap_err()),
                "price"
            );
        }
    }

    #[test]
    fn test_stock_bounds() {
        let mut bad = input();
        bad.stock = -1;
        assert_eq!(field_of(validate_product(ProductId::generate(), bad).unwrap_err()), "stock");

        let mut huge = input();
        huge.stock = i64::from(i32::MAX) + 1;
        assert_eq!(field_of(validate_product(ProductId::generate(), huge).unwrap_err()), "stock");

        let mut largest = input();
        largest.stock = i64::from(i32::MAX);
        assert_eq!(
            validate_product(ProductId::generate(), largest).unwrap().stock,
            i32::MAX.unsigned_abs()
        );

        let mut zero = input();
        zero.stock = 0;
        assert!(validate_product(ProductId::generate(), zero).is_ok());
    }

    #[test]
    fn test_image_url_rules() {
        let mut bad = input();
        bad.image_url = Some("not a url".to_string());
        assert_eq!(
            field_of(validate_product(ProductId::generate(), bad).unwrap_err()),
            "image_url"
        );

        let mut ftp = input();
        ftp.image_url = Some("ftp://example.com/a.png".to_string());
        assert_eq!(
            field_of(validate_product(ProductId::generate(), ftp).unwrap_err()),
            "image_url"
        );

        let mut blank = input();
        blank.image_url = Some(String::new());
        assert_eq!(
            validate_product(ProductId::generate(), blank).unwrap().image_url,
            None
        );
    }

    #[test]
    fn test_first_failing_field_wins() {
        let mut bad = input();
        bad.name = String::new();
        bad.price = Decimal::ZERO;
        assert_eq!(field_of(validate_product(ProductId::generate(), bad).unwrap_err()), "name");
    }

    #[tokio::test]
    async fn test_get_missing_product() {
        let catalog = CatalogService::new(Arc::new(InMemoryStore::new()));
        assert!(matches!(
            catalog.get(ProductId::generate()).await,
            Err(ShopError::NotFound(_))
        ));
        assert!(catalog.list().await.unwrap().is_empty());
    }
}
