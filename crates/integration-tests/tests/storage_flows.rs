//! Catalog and order flows over in-memory storage.
//!
//! These exercise the services together the way the route handlers do:
//! product images land in blob storage, orders move stock and post queue
//! messages, and cart checkout is all-or-nothing on stock.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;

use cloudmart_core::{CartItemId, OrderStatus, Price};
use cloudmart_storefront::models::{CartLine, Customer, OrderNotification, Product, StockUpdate};
use cloudmart_storefront::services::{
    NewOrder, OrderError, OrderService, ProductError, ProductInput, ProductService,
};
use cloudmart_storefront::storage::{
    MemoryBackend, StorageService, UploadedFile, blob_name_from_url, names,
};

fn storage() -> (Arc<MemoryBackend>, StorageService) {
    let memory = Arc::new(MemoryBackend::new());
    let service = StorageService::new(memory.clone(), 7);
    (memory, service)
}

fn product_input(name: &str, price: &str, stock: i32) -> ProductInput {
    ProductInput {
        product_name: name.to_string(),
        description: format!("{name} description"),
        price: price.to_string(),
        stock_available: stock,
    }
}

async fn add_customer(storage: &StorageService, username: &str) -> Customer {
    let mut customer = Customer::new();
    customer.username = username.to_string();
    customer.name = "Ada".to_string();
    customer.surname = "Lovelace".to_string();
    customer.email = format!("{username}@example.com");
    storage.add_entity(&customer).await.unwrap();
    customer
}

fn cart_line(id: i32, product: &Product, quantity: i32) -> CartLine {
    CartLine {
        cart_id: CartItemId::new(id),
        product_id: product.row_key.clone(),
        product_name: product.product_name.clone(),
        unit_price: product.price,
        quantity,
        line_total: product.price.checked_mul(quantity).unwrap(),
        image_url: String::new(),
    }
}

// ============================================================================
// Products
// ============================================================================

#[tokio::test]
async fn test_product_image_lifecycle() {
    let (memory, storage) = storage();
    let products = ProductService::new(&storage);

    let image = UploadedFile::new("mug.png", "image/png", Bytes::from_static(b"\x89PNG"));
    let created = products
        .create(&product_input("Mug", "12.50", 4), Some(&image))
        .await
        .unwrap();
    assert!(created.has_image());
    let first_blob = blob_name_from_url(&created.image_url).unwrap();
    assert!(first_blob.ends_with(".png"));
    assert!(memory.blob(names::PRODUCT_IMAGES_CONTAINER, &first_blob).is_some());

    // A new image replaces the old blob.
    let replacement = UploadedFile::new("mug2.jpg", "image/jpeg", Bytes::from_static(b"jpeg"));
    let updated = products
        .update(&created.row_key, &product_input("Mug", "13.00", 4), Some(&replacement))
        .await
        .unwrap();
    assert_eq!(updated.price, Price::from_cents(1300));
    assert!(memory.blob(names::PRODUCT_IMAGES_CONTAINER, &first_blob).is_none());

    products.delete(&created.row_key).await.unwrap();
    assert!(matches!(
        products.get(&created.row_key).await,
        Err(ProductError::NotFound)
    ));
    let second_blob = blob_name_from_url(&updated.image_url).unwrap();
    assert!(memory.blob(names::PRODUCT_IMAGES_CONTAINER, &second_blob).is_none());
}

#[tokio::test]
async fn test_update_without_image_keeps_existing_url() {
    let (_memory, storage) = storage();
    let products = ProductService::new(&storage);

    let image = UploadedFile::new("lamp.webp", "image/webp", Bytes::from_static(b"webp"));
    let created = products
        .create(&product_input("Lamp", "40", 2), Some(&image))
        .await
        .unwrap();
    let updated = products
        .update(&created.row_key, &product_input("Desk Lamp", "40", 3), None)
        .await
        .unwrap();

    assert_eq!(updated.image_url, created.image_url);
    assert_eq!(updated.product_name, "Desk Lamp");
    assert_eq!(products.get(&created.row_key).await.unwrap().stock_available, 3);
}

// ============================================================================
// Admin orders
// ============================================================================

#[tokio::test]
async fn test_admin_order_moves_stock_and_posts_messages() {
    let (memory, storage) = storage();
    let product = ProductService::new(&storage)
        .create(&product_input("Keyboard", "25.00", 10), None)
        .await
        .unwrap();
    let customer = add_customer(&storage, "ada").await;

    let orders = OrderService::new(&storage);
    let order = orders
        .create_order(NewOrder {
            customer_id: customer.row_key.clone(),
            product_id: product.row_key.clone(),
            quantity: 3,
            order_date: Utc::now(),
            status: OrderStatus::Submitted,
        })
        .await
        .unwrap();

    assert_eq!(order.total_price, Price::from_cents(7500));
    assert_eq!(order.username, "ada");
    let stored = ProductService::new(&storage).get(&product.row_key).await.unwrap();
    assert_eq!(stored.stock_available, 7);

    assert_eq!(memory.queue_len(names::ORDER_NOTIFICATIONS_QUEUE), 1);
    let text = storage
        .receive_message(names::ORDER_NOTIFICATIONS_QUEUE)
        .await
        .unwrap()
        .unwrap();
    let notification: OrderNotification = serde_json::from_str(&text).unwrap();
    assert_eq!(notification.order_id, order.row_key);
    assert_eq!(notification.customer_name, "Ada Lovelace");
    assert_eq!(notification.quantity, 3);

    let text = storage
        .receive_message(names::STOCK_UPDATES_QUEUE)
        .await
        .unwrap()
        .unwrap();
    let update: StockUpdate = serde_json::from_str(&text).unwrap();
    assert_eq!((update.previous_stock, update.new_stock), (10, 7));
    assert_eq!(update.update_by, "Order System");
}

#[tokio::test]
async fn test_admin_order_rejects_short_stock_without_writing() {
    let (memory, storage) = storage();
    let product = ProductService::new(&storage)
        .create(&product_input("Monitor", "199.99", 1), None)
        .await
        .unwrap();
    let customer = add_customer(&storage, "grace").await;

    let result = OrderService::new(&storage)
        .create_order(NewOrder {
            customer_id: customer.row_key,
            product_id: product.row_key.clone(),
            quantity: 2,
            order_date: Utc::now(),
            status: OrderStatus::Submitted,
        })
        .await;

    match result {
        Err(OrderError::InsufficientStock { product, available }) => {
            assert_eq!(product, "Monitor");
            assert_eq!(available, 1);
        }
        other => panic!("expected insufficient stock, got {other:?}"),
    }
    assert!(OrderService::new(&storage).all_orders().await.unwrap().is_empty());
    assert_eq!(memory.queue_len(names::ORDER_NOTIFICATIONS_QUEUE), 0);
}

#[tokio::test]
async fn test_admin_order_with_unknown_customer_is_invalid_selection() {
    let (_memory, storage) = storage();
    let product = ProductService::new(&storage)
        .create(&product_input("Cable", "5", 10), None)
        .await
        .unwrap();

    let result = OrderService::new(&storage)
        .create_order(NewOrder {
            customer_id: "nobody".to_string(),
            product_id: product.row_key,
            quantity: 1,
            order_date: Utc::now(),
            status: OrderStatus::Submitted,
        })
        .await;
    assert!(matches!(result, Err(OrderError::InvalidSelection)));
}

#[tokio::test]
async fn test_delete_missing_order_is_not_found() {
    let (_memory, storage) = storage();
    let result = OrderService::new(&storage).delete_order("missing").await;
    assert!(matches!(result, Err(OrderError::NotFound)));
}

// ============================================================================
// Cart checkout
// ============================================================================

#[tokio::test]
async fn test_cart_checkout_checks_every_line_before_writing() {
    let (memory, storage) = storage();
    let products = ProductService::new(&storage);
    let plenty = products
        .create(&product_input("Pen", "1.50", 100), None)
        .await
        .unwrap();
    let scarce = products
        .create(&product_input("Notebook", "4.00", 1), None)
        .await
        .unwrap();

    let lines = [cart_line(1, &plenty, 5), cart_line(2, &scarce, 2)];
    let result = OrderService::new(&storage)
        .place_cart_order("ada", &lines)
        .await;

    assert!(matches!(result, Err(OrderError::InsufficientStock { .. })));
    // Nothing was written for the line that had enough stock.
    assert!(OrderService::new(&storage).all_orders().await.unwrap().is_empty());
    assert_eq!(products.get(&plenty.row_key).await.unwrap().stock_available, 100);
    assert_eq!(memory.queue_len(names::ORDER_NOTIFICATIONS_QUEUE), 0);
}

#[tokio::test]
async fn test_cart_checkout_creates_one_order_per_line() {
    let (memory, storage) = storage();
    let products = ProductService::new(&storage);
    let pen = products
        .create(&product_input("Pen", "1.50", 100), None)
        .await
        .unwrap();
    let ink = products
        .create(&product_input("Ink", "3.25", 10), None)
        .await
        .unwrap();

    let lines = [cart_line(1, &pen, 4), cart_line(2, &ink, 2)];
    let orders = OrderService::new(&storage);
    let ids = orders.place_cart_order("ada", &lines).await.unwrap();
    assert_eq!(ids.len(), 2);

    let mine = orders.orders_for_user("ada").await.unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|o| o.status == OrderStatus::Submitted));
    assert!(orders.orders_for_user("grace").await.unwrap().is_empty());

    assert_eq!(products.get(&pen.row_key).await.unwrap().stock_available, 96);
    assert_eq!(products.get(&ink.row_key).await.unwrap().stock_available, 8);
    assert_eq!(memory.queue_len(names::ORDER_NOTIFICATIONS_QUEUE), 2);
    // Customer checkouts do not post stock updates.
    assert_eq!(memory.queue_len(names::STOCK_UPDATES_QUEUE), 0);
}

#[tokio::test]
async fn test_cart_checkout_skips_deleted_products() {
    let (_memory, storage) = storage();
    let products = ProductService::new(&storage);
    let kept = products
        .create(&product_input("Stapler", "8", 3), None)
        .await
        .unwrap();
    let gone = products
        .create(&product_input("Tape", "2", 3), None)
        .await
        .unwrap();
    products.delete(&gone.row_key).await.unwrap();

    let lines = [cart_line(1, &kept, 1), cart_line(2, &gone, 1)];
    let ids = OrderService::new(&storage)
        .place_cart_order("ada", &lines)
        .await
        .unwrap();
    assert_eq!(ids.len(), 1);
}

// ============================================================================
// Dashboards
// ============================================================================

#[tokio::test]
async fn test_store_summary_counts_and_features() {
    let (_memory, storage) = storage();
    let products = ProductService::new(&storage);
    for i in 0..7 {
        products
            .create(&product_input(&format!("Item {i}"), "1", 1), None)
            .await
            .unwrap();
    }
    add_customer(&storage, "ada").await;

    let summary = OrderService::new(&storage).store_summary(5).await.unwrap();
    assert_eq!(summary.product_count, 7);
    assert_eq!(summary.featured_products.len(), 5);
    assert_eq!(summary.customer_count, 1);
    assert_eq!(summary.order_count, 0);
}
