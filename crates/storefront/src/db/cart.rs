//! Cart repository.
//!
//! Every statement is scoped by username, so a user can never touch
//! another user's rows even with a guessed cart id.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use cloudmart_core::CartItemId;

use super::RepositoryError;
use crate::models::CartItem;

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    id: i32,
    customer_username: String,
    product_id: String,
    quantity: i32,
    created_at: DateTime<Utc>,
}

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        Self {
            id: CartItemId::new(row.id),
            customer_username: row.customer_username,
            product_id: row.product_id,
            quantity: row.quantity,
            created_at: row.created_at,
        }
    }
}

/// Repository for cart rows.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a row, or add to the quantity of the existing (user, product) row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert(
        &self,
        username: &str,
        product_id: &str,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            INSERT INTO storefront.cart_item (customer_username, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (customer_username, product_id)
            DO UPDATE SET quantity = storefront.cart_item.quantity + EXCLUDED.quantity,
                          updated_at = NOW()
            RETURNING id, customer_username, product_id, quantity, created_at
            ",
        )
        .bind(username)
        .bind(product_id)
        .bind(quantity)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Delete one of the user's rows. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn remove(&self, id: CartItemId, username: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM storefront.cart_item WHERE id = $1 AND customer_username = $2",
        )
        .bind(id)
        .bind(username)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set the quantity of one of the user's rows. Returns whether a row matched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_quantity(
        &self,
        id: CartItemId,
        username: &str,
        quantity: i32,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.cart_item
            SET quantity = $1, updated_at = NOW()
            WHERE id = $2 AND customer_username = $3
            ",
        )
        .bind(quantity)
        .bind(id)
        .bind(username)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// The user's rows, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, username: &str) -> Result<Vec<CartItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartItemRow>(
            r"
            SELECT id, customer_username, product_id, quantity, created_at
            FROM storefront.cart_item
            WHERE customer_username = $1
            ORDER BY created_at, id
            ",
        )
        .bind(username)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(CartItem::from).collect())
    }

    /// Sum of quantities in the user's cart; zero when empty.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self, username: &str) -> Result<i64, RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COALESCE(SUM(quantity), 0)::BIGINT
            FROM storefront.cart_item
            WHERE customer_username = $1
            ",
        )
        .bind(username)
        .fetch_one(self.pool)
        .await?;
        Ok(total)
    }

    /// Remove every row in the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn clear(&self, username: &str) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.cart_item WHERE customer_username = $1")
            .bind(username)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
