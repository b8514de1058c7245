//! Order placement and maintenance.
//!
//! Orders live in table storage, one entity per product line. Every order
//! created here decrements the product's stock and posts a notification to
//! `order-notifications`; orders entered by an admin also post to
//! `stock-updates`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use cloudmart_core::{OrderStatus, Price};

use crate::models::{CartLine, Customer, CurrentUser, Order, OrderNotification, Product, StockUpdate};
use crate::storage::{StorageError, StorageService, TableEntity, names};

/// Name recorded on stock-update messages.
const STOCK_UPDATED_BY: &str = "Order System";

/// Pending orders listed on the admin dashboard.
const DASHBOARD_PENDING_LIMIT: usize = 10;

/// Recent orders listed on the customer dashboard.
const DASHBOARD_RECENT_LIMIT: usize = 5;

/// Errors from order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Invalid customer or product selected.")]
    InvalidSelection,

    #[error("Quantity must be at least 1.")]
    InvalidQuantity,

    #[error("Insufficient stock for {product}. Available: {available}")]
    InsufficientStock { product: String, available: i32 },

    #[error("Order total is too large.")]
    TotalTooLarge,

    #[error("order not found")]
    NotFound,

    /// The order changed between load and save.
    #[error("order was modified by someone else")]
    Conflict,

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Admin input for a new order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: String,
    pub product_id: String,
    pub quantity: i32,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
}

/// Admin changes to an existing order.
#[derive(Debug, Clone)]
pub struct OrderEdit {
    pub order_date: DateTime<Utc>,
    pub quantity: i32,
    pub unit_price: Price,
    pub status: OrderStatus,
}

/// Product details for the order form, serialized as JSON.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProductPrice {
    pub success: bool,
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
}

impl ProductPrice {
    const fn not_found() -> Self {
        Self {
            success: false,
            price: None,
            stock: None,
            product_name: None,
        }
    }
}

/// Figures shown on the admin dashboard.
#[derive(Debug, Clone, Default)]
pub struct AdminDashboard {
    pub product_count: usize,
    pub customer_count: usize,
    pub order_count: usize,
    pub pending_orders: usize,
    pub processed_orders: usize,
    /// Newest pending orders first.
    pub pending_list: Vec<Order>,
}

/// Figures shown on a customer's dashboard.
#[derive(Debug, Clone, Default)]
pub struct CustomerDashboard {
    pub order_count: usize,
    pub recent_orders: Vec<Order>,
    pub cart_item_count: i64,
}

/// Counts and featured products for the public home page.
#[derive(Debug, Clone, Default)]
pub struct StoreSummary {
    pub featured_products: Vec<Product>,
    pub product_count: usize,
    pub customer_count: usize,
    pub order_count: usize,
}

/// Order operations over table and queue storage.
pub struct OrderService<'a> {
    storage: &'a StorageService,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(storage: &'a StorageService) -> Self {
        Self { storage }
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Create an order for a customer on behalf of an admin.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::InvalidSelection` if the customer or product does
    /// not exist, `OrderError::InsufficientStock` if the product cannot cover
    /// the quantity, or `OrderError::Storage` if a write fails.
    #[instrument(skip(self, input), fields(customer_id = %input.customer_id, product_id = %input.product_id))]
    pub async fn create_order(&self, input: NewOrder) -> Result<Order, OrderError> {
        if input.quantity < 1 {
            return Err(OrderError::InvalidQuantity);
        }

        let customer = self
            .storage
            .get_entity::<Customer>(Customer::KIND, &input.customer_id)
            .await?;
        let product = self
            .storage
            .get_entity::<Product>(Product::KIND, &input.product_id)
            .await?;
        let (Some(customer), Some(mut product)) = (customer, product) else {
            return Err(OrderError::InvalidSelection);
        };

        check_stock(&product, input.quantity)?;

        let mut order = Order::new(
            product.id(),
            &product.product_name,
            input.quantity,
            product.price,
        )
        .ok_or(OrderError::TotalTooLarge)?;
        order.customer_id.clone_from(&input.customer_id);
        order.username.clone_from(&customer.username);
        order.order_date = input.order_date;
        order.status = input.status;
        order.updated_at = Some(Utc::now());

        info!(
            order_id = %order.id(),
            unit_price = %product.price,
            quantity = order.quantity,
            total = %order.total_price,
            "Creating order"
        );
        self.storage.add_entity(&order).await?;

        let previous_stock = product.stock_available;
        product.stock_available -= input.quantity;
        self.storage.update_entity(&product).await?;

        self.notify_order(&order, &customer.display_name()).await?;
        self.notify_stock(&product, previous_stock).await?;

        Ok(order)
    }

    /// Turn cart lines into submitted orders, one per line.
    ///
    /// Stock for every line is checked before anything is written. Lines
    /// whose product has disappeared are skipped. Returns the new order ids;
    /// the caller clears the cart.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::InsufficientStock` naming the first product that
    /// cannot cover its line, `OrderError::TotalTooLarge` if a line total
    /// does not fit, or `OrderError::Storage` if a write fails.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn place_cart_order(
        &self,
        username: &str,
        lines: &[CartLine],
    ) -> Result<Vec<String>, OrderError> {
        let mut reserved = Vec::with_capacity(lines.len());
        for line in lines {
            let Some(product) = self
                .storage
                .get_entity::<Product>(Product::KIND, &line.product_id)
                .await?
            else {
                warn!(product_id = %line.product_id, "Product in cart no longer exists");
                continue;
            };
            check_stock(&product, line.quantity)?;
            let order = Order::new(
                product.id(),
                &product.product_name,
                line.quantity,
                product.price,
            )
            .ok_or(OrderError::TotalTooLarge)?;
            reserved.push((line, product, order));
        }

        let mut created = Vec::with_capacity(reserved.len());
        for (line, mut product, mut order) in reserved {
            order.customer_id = username.to_owned();
            order.username = username.to_owned();
            order.updated_at = Some(Utc::now());
            self.storage.add_entity(&order).await?;

            product.stock_available -= line.quantity;
            self.storage.update_entity(&product).await?;

            self.notify_order(&order, username).await?;
            info!(order_id = %order.id(), product_id = %line.product_id, "Order placed from cart");
            created.push(order.row_key);
        }

        Ok(created)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Apply an admin edit, recomputing the total when price or quantity changed.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order does not exist and
    /// `OrderError::Conflict` if it changed since it was loaded.
    #[instrument(skip(self, edit))]
    pub async fn update_order(&self, order_id: &str, edit: OrderEdit) -> Result<Order, OrderError> {
        if edit.quantity < 1 {
            return Err(OrderError::InvalidQuantity);
        }
        let mut order = self.get_order(order_id).await?.ok_or(OrderError::NotFound)?;

        apply_edit(&mut order, &edit)?;

        self.storage
            .update_entity(&order)
            .await
            .map_err(|e| match e {
                StorageError::PreconditionFailed => OrderError::Conflict,
                StorageError::NotFound(_) => OrderError::NotFound,
                other => OrderError::Storage(other),
            })?;
        info!(order_id, total = %order.total_price, status = %order.status, "Order updated");
        Ok(order)
    }

    /// Delete an order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order does not exist.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, order_id: &str) -> Result<(), OrderError> {
        self.storage
            .delete_entity::<Order>(Order::KIND, order_id)
            .await
            .map_err(|e| match e {
                StorageError::NotFound(_) => OrderError::NotFound,
                other => OrderError::Storage(other),
            })?;
        info!(order_id, "Order deleted");
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// # Errors
    ///
    /// Returns `OrderError::Storage` if the lookup fails.
    pub async fn get_order(&self, order_id: &str) -> Result<Option<Order>, OrderError> {
        Ok(self
            .storage
            .get_entity::<Order>(Order::KIND, order_id)
            .await?)
    }

    /// Every order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Storage` if the query fails.
    pub async fn all_orders(&self) -> Result<Vec<Order>, OrderError> {
        let mut orders = self.storage.get_all_entities::<Order>().await?;
        sort_newest_first(&mut orders);
        Ok(orders)
    }

    /// Orders placed by or for `username`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Storage` if the query fails.
    pub async fn orders_for_user(&self, username: &str) -> Result<Vec<Order>, OrderError> {
        let mut orders = self.all_orders().await?;
        orders.retain(|order| order.is_owned_by(username));
        Ok(orders)
    }

    /// All orders for admins, otherwise only the user's own.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Storage` if the query fails.
    pub async fn visible_orders(&self, user: &CurrentUser) -> Result<Vec<Order>, OrderError> {
        if user.is_admin() {
            self.all_orders().await
        } else {
            self.orders_for_user(&user.username).await
        }
    }

    /// Price, stock and name of a product for the order form.
    ///
    /// Lookup failures report `success: false` rather than an error.
    pub async fn product_price(&self, product_id: &str) -> ProductPrice {
        match self
            .storage
            .get_entity::<Product>(Product::KIND, product_id)
            .await
        {
            Ok(Some(product)) => ProductPrice {
                success: true,
                price: Some(product.price.amount()),
                stock: Some(product.stock_available),
                product_name: Some(product.product_name),
            },
            Ok(None) => ProductPrice::not_found(),
            Err(e) => {
                warn!(product_id, error = %e, "Product price lookup failed");
                ProductPrice::not_found()
            }
        }
    }

    // =========================================================================
    // Dashboards
    // =========================================================================

    /// # Errors
    ///
    /// Returns `OrderError::Storage` if any table query fails.
    pub async fn admin_dashboard(&self) -> Result<AdminDashboard, OrderError> {
        let products = self.storage.get_all_entities::<Product>().await?;
        let customers = self.storage.get_all_entities::<Customer>().await?;
        let orders = self.all_orders().await?;
        Ok(admin_dashboard(products.len(), customers.len(), orders))
    }

    /// # Errors
    ///
    /// Returns `OrderError::Storage` if the order query fails.
    pub async fn customer_dashboard(
        &self,
        username: &str,
        cart_item_count: i64,
    ) -> Result<CustomerDashboard, OrderError> {
        let mut orders = self.orders_for_user(username).await?;
        let order_count = orders.len();
        orders.truncate(DASHBOARD_RECENT_LIMIT);
        Ok(CustomerDashboard {
            order_count,
            recent_orders: orders,
            cart_item_count,
        })
    }

    /// The first `featured` products plus table counts.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Storage` if any table query fails.
    pub async fn store_summary(&self, featured: usize) -> Result<StoreSummary, OrderError> {
        let mut products = self.storage.get_all_entities::<Product>().await?;
        let customers = self.storage.get_all_entities::<Customer>().await?;
        let orders = self.storage.get_all_entities::<Order>().await?;
        let product_count = products.len();
        products.truncate(featured);
        Ok(StoreSummary {
            featured_products: products,
            product_count,
            customer_count: customers.len(),
            order_count: orders.len(),
        })
    }

    // =========================================================================
    // Messages
    // =========================================================================

    async fn notify_order(&self, order: &Order, customer_name: &str) -> Result<(), OrderError> {
        let message = OrderNotification {
            order_id: order.row_key.clone(),
            customer_id: order.customer_id.clone(),
            customer_name: customer_name.to_owned(),
            product_name: order.product_name.clone(),
            quantity: order.quantity,
            total_price: order.total_price.amount(),
            order_date: order.order_date,
            status: order.status,
        };
        let text = serde_json::to_string(&message).map_err(StorageError::from)?;
        self.storage
            .send_message(names::ORDER_NOTIFICATIONS_QUEUE, &text)
            .await?;
        Ok(())
    }

    async fn notify_stock(&self, product: &Product, previous_stock: i32) -> Result<(), OrderError> {
        let message = StockUpdate {
            product_id: product.row_key.clone(),
            product_name: product.product_name.clone(),
            previous_stock,
            new_stock: product.stock_available,
            update_by: STOCK_UPDATED_BY.to_owned(),
            update_date: Utc::now(),
        };
        let text = serde_json::to_string(&message).map_err(StorageError::from)?;
        self.storage
            .send_message(names::STOCK_UPDATES_QUEUE, &text)
            .await?;
        Ok(())
    }
}

fn check_stock(product: &Product, quantity: i32) -> Result<(), OrderError> {
    if product.stock_available < quantity {
        return Err(OrderError::InsufficientStock {
            product: product.product_name.clone(),
            available: product.stock_available,
        });
    }
    Ok(())
}

fn apply_edit(order: &mut Order, edit: &OrderEdit) -> Result<(), OrderError> {
    if edit.unit_price != order.unit_price() || edit.quantity != order.quantity {
        order.total_price = edit
            .unit_price
            .checked_mul(edit.quantity)
            .ok_or(OrderError::TotalTooLarge)?;
    }
    order.order_date = edit.order_date;
    order.quantity = edit.quantity;
    order.unit_price = Some(edit.unit_price);
    order.status = edit.status;
    order.updated_at = Some(Utc::now());
    Ok(())
}

fn sort_newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));
}

fn admin_dashboard(product_count: usize, customer_count: usize, orders: Vec<Order>) -> AdminDashboard {
    let order_count = orders.len();
    let processed_orders = orders
        .iter()
        .filter(|o| o.status == OrderStatus::Processed)
        .count();
    let pending: Vec<Order> = orders.into_iter().filter(|o| o.status.is_pending()).collect();
    let pending_orders = pending.len();

    AdminDashboard {
        product_count,
        customer_count,
        order_count,
        pending_orders,
        processed_orders,
        pending_list: pending.into_iter().take(DASHBOARD_PENDING_LIMIT).collect(),
    }
}

/// Read an order date from a form field as UTC.
///
/// Accepts RFC 3339, `datetime-local` values (taken as UTC) and plain dates.
/// Anything else, including a blank field, yields the current time.
#[must_use]
pub fn parse_order_date(input: &str) -> DateTime<Utc> {
    let input = input.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(input) {
        return date.with_timezone(&Utc);
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return naive.and_utc();
        }
    }
    if let Some(naive) = NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return naive.and_utc();
    }
    Utc::now()
}
