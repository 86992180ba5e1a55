//! Admin guard and order lifecycle.

#![allow(clippy::unwrap_used)]

use tidepool_core::{OrderStatus, ProductId};
use tidepool_integration_tests::{ADDRESS, TestShop, dec, shopper};
use tidepool_storefront::db::{Store, StoreOp};
use tidepool_storefront::models::ProductInput;
use tidepool_storefront::services::{Principal, ShopError};

fn input(name: &str, price: &str) -> ProductInput {
    ProductInput {
        name: name.to_string(),
        price: dec(price),
        stock: 5,
        ..ProductInput::default()
    }
}

async fn placed_order(shop: &TestShop) -> (Principal, tidepool_core::OrderId) {
    let product = shop.product("Tide Chart", "15.00", 5).await;
    let buyer = shopper();
    shop.add(&buyer, &product, 1).await;
    let order_id = shop.services.checkout.checkout(&buyer, ADDRESS).await.unwrap();
    (buyer, order_id)
}

// ============================================================================
// Authorization
// ============================================================================

#[tokio::test]
async fn test_non_admin_cannot_mutate_anything() {
    let shop = TestShop::new();
    let product = shop.product("Shell Bowl", "8.00", 3).await;
    let (buyer, order_id) = placed_order(&shop).await;
    let catalog_before = shop.store.list_products().await.unwrap();
    let writes_before = (
        shop.store.call_count(StoreOp::InsertProduct).await,
        shop.store.call_count(StoreOp::UpdateProduct).await,
        shop.store.call_count(StoreOp::DeleteProduct).await,
        shop.store.call_count(StoreOp::UpdateOrderStatus).await,
    );

    for caller in [buyer, Principal::anonymous(), shopper()] {
        let admin = &shop.services.admin;
        assert!(matches!(
            admin.create_product(&caller, input("Fresh Thing", "1.00")).await,
            Err(ShopError::Forbidden(_))
        ));
        assert!(matches!(
            admin
                .update_product(&caller, product.id, input("Renamed", "2.00"))
                .await,
            Err(ShopError::Forbidden(_))
        ));
        assert!(matches!(
            admin.delete_product(&caller, product.id).await,
            Err(ShopError::Forbidden(_))
        ));
        assert!(matches!(
            admin
                .update_order_status(&caller, order_id, OrderStatus::Processing)
                .await,
            Err(ShopError::Forbidden(_))
        ));
        assert!(matches!(
            admin.list_orders(&caller).await,
            Err(ShopError::Forbidden(_))
        ));
    }

    assert_eq!(shop.store.list_products().await.unwrap(), catalog_before);
    assert_eq!(
        shop.store.get_order(order_id).await.unwrap().unwrap().status,
        OrderStatus::Pending
    );
    let writes_after = (
        shop.store.call_count(StoreOp::InsertProduct).await,
        shop.store.call_count(StoreOp::UpdateProduct).await,
        shop.store.call_count(StoreOp::DeleteProduct).await,
        shop.store.call_count(StoreOp::UpdateOrderStatus).await,
    );
    assert_eq!(writes_before, writes_after);
}

#[tokio::test]
async fn test_users_only_read_their_own_orders() {
    let shop = TestShop::new();
    let (buyer, order_id) = placed_order(&shop).await;
    let (_, other_order) = placed_order(&shop).await;

    let mine = shop.services.orders.list_for_user(&buyer).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].order.id, order_id);
    assert!(matches!(
        shop.services.orders.get(&buyer, other_order).await,
        Err(ShopError::Forbidden(_))
    ));
    assert_eq!(
        shop.services.admin.list_orders(&shop.admin).await.unwrap().len(),
        2
    );
}

// ============================================================================
// Catalog Mutations
// ============================================================================

#[tokio::test]
async fn test_validation_order_reports_first_field() {
    let shop = TestShop::new();
    let mut bad = input("A", "0");
    bad.stock = -3;
    bad.image_url = Some("nope".to_string());

    let err = shop
        .services
        .admin
        .create_product(&shop.admin, bad)
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::Validation { field: "name", .. }));
    assert!(shop.store.list_products().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_catalog_lists_newest_first() {
    let shop = TestShop::new();
    let first = shop.product("Older", "1.00", 1).await;
    let second = shop.product("Newer", "1.00", 1).await;

    let listed = shop.services.catalog.list().await.unwrap();
    assert_eq!(listed[0].id, second.id);
    assert_eq!(listed[1].id, first.id);
}

#[tokio::test]
async fn test_delete_unknown_product_is_ok() {
    let shop = TestShop::new();
    assert!(
        !shop
            .services
            .admin
            .delete_product(&shop.admin, ProductId::generate())
            .await
            .unwrap()
    );
}

// ============================================================================
// Order Lifecycle
// ============================================================================

#[tokio::test]
async fn test_full_lifecycle_then_terminal() {
    let shop = TestShop::new();
    let (_, order_id) = placed_order(&shop).await;
    let admin = &shop.services.admin;

    for next in [
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ] {
        let order = admin
            .update_order_status(&shop.admin, order_id, next)
            .await
            .unwrap();
        assert_eq!(order.status, next);
    }

    for to in OrderStatus::ALL {
        assert!(matches!(
            admin.update_order_status(&shop.admin, order_id, to).await,
            Err(ShopError::InvalidTransition {
                from: OrderStatus::Delivered,
                ..
            })
        ));
    }
}

#[tokio::test]
async fn test_cancel_and_skip_rules() {
    let shop = TestShop::new();
    let (_, order_id) = placed_order(&shop).await;
    let admin = &shop.services.admin;

    assert!(matches!(
        admin
            .update_order_status(&shop.admin, order_id, OrderStatus::Delivered)
            .await,
        Err(ShopError::InvalidTransition { .. })
    ));
    assert!(matches!(
        admin
            .update_order_status(&shop.admin, order_id, OrderStatus::Pending)
            .await,
        Err(ShopError::InvalidTransition { .. })
    ));

    admin
        .update_order_status(&shop.admin, order_id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert!(matches!(
        admin
            .update_order_status(&shop.admin, order_id, OrderStatus::Processing)
            .await,
        Err(ShopError::InvalidTransition {
            from: OrderStatus::Cancelled,
            to: OrderStatus::Processing
        })
    ));
}

#[tokio::test]
async fn test_stock_beyond_storable_range_is_rejected() {
    let shop = TestShop::new();
    let mut huge = input("Tide Clock", "45.00");
    huge.stock = 3_000_000_000;

    let err = shop
        .services
        .admin
        .create_product(&shop.admin, huge)
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::Validation { field: "stock", .. }));
    assert_eq!(shop.store.call_count(StoreOp::InsertProduct).await, 0);
}
