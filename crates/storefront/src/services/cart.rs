//! Cart service.
//!
//! Cart rows live in `PostgreSQL`; product names, prices and images come
//! from table storage at read time, so a cart always shows current prices.

use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument, warn};

use cloudmart_core::CartItemId;

use crate::db::{CartRepository, RepositoryError};
use crate::models::{CartItem, CartLine, Product};
use crate::storage::{StorageError, StorageService, TableEntity};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantity to add must be at least one.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Per-user shopping cart.
pub struct CartService<'a> {
    carts: CartRepository<'a>,
    storage: &'a StorageService,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, storage: &'a StorageService) -> Self {
        Self {
            carts: CartRepository::new(pool),
            storage,
        }
    }

    /// Add `quantity` of a product, merging with an existing row.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` when `quantity < 1`.
    #[instrument(skip(self))]
    pub async fn add_to_cart(
        &self,
        username: &str,
        product_id: &str,
        quantity: i32,
    ) -> Result<CartItem, CartError> {
        if quantity < 1 {
            return Err(CartError::InvalidQuantity);
        }
        let item = self.carts.upsert(username, product_id, quantity).await?;
        info!(cart_id = %item.id, quantity = item.quantity, "Cart item saved");
        Ok(item)
    }

    /// Remove a row. Returns `false` when the user owns no such row.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the delete fails.
    pub async fn remove_from_cart(
        &self,
        cart_id: CartItemId,
        username: &str,
    ) -> Result<bool, CartError> {
        Ok(self.carts.remove(cart_id, username).await?)
    }

    /// Set a row's quantity; zero or less removes it.
    ///
    /// Returns `false` when the user owns no such row.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the update fails.
    pub async fn update_quantity(
        &self,
        cart_id: CartItemId,
        username: &str,
        quantity: i32,
    ) -> Result<bool, CartError> {
        if quantity <= 0 {
            return self.remove_from_cart(cart_id, username).await;
        }
        Ok(self.carts.set_quantity(cart_id, username, quantity).await?)
    }

    /// Cart rows joined with their products. Rows whose product no longer
    /// exists are left out.
    ///
    /// # Errors
    ///
    /// Returns an error if either store fails.
    #[instrument(skip(self))]
    pub async fn get_cart_items(&self, username: &str) -> Result<Vec<CartLine>, CartError> {
        let items = self.carts.list(username).await?;
        let mut lines = Vec::with_capacity(items.len());

        for item in items {
            let Some(product) = self
                .storage
                .get_entity::<Product>(Product::KIND, &item.product_id)
                .await?
            else {
                warn!(product_id = %item.product_id, "Cart references a missing product");
                continue;
            };
            lines.push(cart_line(&item, &product));
        }

        Ok(lines)
    }

    /// Total quantity across all rows (0 for an empty cart).
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the query fails.
    pub async fn get_cart_item_count(&self, username: &str) -> Result<i64, CartError> {
        Ok(self.carts.count(username).await?)
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the delete fails.
    pub async fn clear_cart(&self, username: &str) -> Result<(), CartError> {
        let removed = self.carts.clear(username).await?;
        info!(removed, "Cart cleared");
        Ok(())
    }
}

fn cart_line(item: &CartItem, product: &Product) -> CartLine {
    CartLine {
        cart_id: item.id,
        product_id: item.product_id.clone(),
        product_name: product.product_name.clone(),
        unit_price: product.price,
        quantity: item.quantity,
        line_total: product.price.saturating_mul(item.quantity),
        image_url: product.image_url.clone(),
    }
}

/// Sum of line totals.
#[must_use]
pub fn cart_total(lines: &[CartLine]) -> cloudmart_core::Price {
    lines.iter().map(|line| line.line_total).sum()
}
