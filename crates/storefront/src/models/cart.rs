//! Cart rows and their product-joined view.

use chrono::{DateTime, Utc};

use cloudmart_core::{CartItemId, Price};

/// A row of `storefront.cart_item`.
#[derive(Debug, Clone)]
pub struct CartItem {
    pub id: CartItemId,
    pub customer_username: String,
    pub product_id: String,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

/// A cart row joined with its product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub cart_id: CartItemId,
    pub product_id: String,
    pub product_name: String,
    pub unit_price: Price,
    pub quantity: i32,
    pub line_total: Price,
    pub image_url: String,
}
