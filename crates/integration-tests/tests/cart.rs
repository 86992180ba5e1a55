//! Cart behavior across services.

#![allow(clippy::unwrap_used)]

use tidepool_core::CartItemId;
use tidepool_integration_tests::{TestShop, dec, shopper};
use tidepool_storefront::db::Store;
use tidepool_storefront::models::ProductInput;
use tidepool_storefront::services::ShopError;

#[tokio::test]
async fn test_repeated_add_keeps_one_row() {
    let shop = TestShop::new();
    let candle = shop.product("Sea Salt Candle", "19.99", 10).await;
    let buyer = shopper();

    shop.add(&buyer, &candle, 3).await;

    let rows = shop
        .store
        .list_cart_items(buyer.user_id().unwrap())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].quantity.get(), 3);
}

#[tokio::test]
async fn test_set_quantity_zero_equals_remove() {
    let shop = TestShop::new();
    let a = shop.product("Product A", "1.00", 5).await;
    let b = shop.product("Product B", "2.00", 5).await;
    let buyer = shopper();
    shop.add(&buyer, &a, 1).await;
    shop.add(&buyer, &b, 1).await;

    let lines = shop.services.cart.snapshot(&buyer).await.unwrap();
    let (first, second) = (lines[0].item.id, lines[1].item.id);

    shop.services
        .cart
        .set_quantity(&buyer, first, 0)
        .await
        .unwrap();
    shop.services.cart.remove(&buyer, second).await.unwrap();

    assert!(shop.services.cart.snapshot(&buyer).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_snapshot_is_oldest_first() {
    let shop = TestShop::new();
    let buyer = shopper();
    let mut ids = Vec::new();
    for name in ["First", "Second", "Third"] {
        let product = shop.product(name, "3.00", 5).await;
        shop.add(&buyer, &product, 1).await;
        ids.push(product.id);
    }

    let lines = shop.services.cart.snapshot(&buyer).await.unwrap();
    let order: Vec<_> = lines.iter().map(|l| l.product.id).collect();
    assert_eq!(order, ids);
}

#[tokio::test]
async fn test_live_total_tracks_catalog_and_rounds_on_display() {
    let shop = TestShop::new();
    let oil = shop.product("Bath Oil", "3.335", 10).await;
    let buyer = shopper();
    shop.add(&buyer, &oil, 3).await;

    let total = shop.services.cart.total(&buyer).await.unwrap();
    assert_eq!(total.amount(), dec("10.005"));
    assert_eq!(total.display(), "$10.01");

    shop.services
        .admin
        .update_product(
            &shop.admin,
            oil.id,
            ProductInput {
                name: "Bath Oil".to_string(),
                price: dec("4.00"),
                stock: 10,
                ..ProductInput::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(
        shop.services.cart.total(&buyer).await.unwrap().amount(),
        dec("12.00")
    );
}

#[tokio::test]
async fn test_out_of_stock_product_cannot_be_added() {
    let shop = TestShop::new();
    let sold_out = shop.product("Sold Out", "8.00", 0).await;
    let err = shop
        .services
        .cart
        .add_or_increment(&shopper(), sold_out.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::Validation { field: "stock", .. }));
}

#[tokio::test]
async fn test_unknown_product_not_found() {
    let shop = TestShop::new();
    let missing = TestShop::new().product("Elsewhere", "1.00", 1).await;
    assert!(matches!(
        shop.services.cart.add_or_increment(&shopper(), missing.id).await,
        Err(ShopError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_admin_delete_drops_cart_rows() {
    let shop = TestShop::new();
    let towel = shop.product("Beach Towel", "22.00", 5).await;
    let buyer = shopper();
    shop.add(&buyer, &towel, 2).await;

    shop.services
        .admin
        .delete_product(&shop.admin, towel.id)
        .await
        .unwrap();

    let view = shop.services.cart.view(&buyer).await.unwrap();
    assert!(view.lines.is_empty());
    assert_eq!(view.item_count, 0);
}

#[tokio::test]
async fn test_missing_line_quantity_rules() {
    let shop = TestShop::new();
    let buyer = shopper();
    let ghost = CartItemId::generate();

    assert!(
        shop.services
            .cart
            .set_quantity(&buyer, ghost, 0)
            .await
            .unwrap()
            .is_none()
    );
    assert!(matches!(
        shop.services.cart.set_quantity(&buyer, ghost, 2).await,
        Err(ShopError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_total_out_of_range_is_reported_not_panicked() {
    let shop = TestShop::new();
    let buyer = shopper();
    let whale = shop.product("Whale Print", "10.00", 5).await;
    shop.reprice(&whale, "79228162514264337593543950335").await;
    shop.add(&buyer, &whale, 2).await;

    assert!(matches!(
        shop.services.cart.view(&buyer).await,
        Err(ShopError::Validation {
            field: "quantity",
            ..
        })
    ));
    assert!(matches!(
        shop.services.cart.total(&buyer).await,
        Err(ShopError::Validation { .. })
    ));

    // Lowering the quantity brings the cart back.
    let line = shop.store.list_cart_items(buyer.user_id().unwrap()).await.unwrap()[0].id;
    shop.services
        .cart
        .set_quantity(&buyer, line, 1)
        .await
        .unwrap();
    let view = shop.services.cart.view(&buyer).await.unwrap();
    assert_eq!(view.total.amount(), dec("79228162514264337593543950335"));
}

#[tokio::test]
async fn test_admin_rejects_price_above_cap() {
    let shop = TestShop::new();
    let err = shop
        .services
        .admin
        .create_product(
            &shop.admin,
            ProductInput {
                name: "Whale Print".to_string(),
                price: dec("79228162514264337593543950335"),
                stock: 2,
                ..ProductInput::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::Validation { field: "price", .. }));
    assert!(shop.services.catalog.list().await.unwrap().is_empty());
}
