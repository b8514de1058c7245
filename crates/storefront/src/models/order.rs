//! Order entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cloudmart_core::{OrderStatus, Price};

use crate::storage::TableEntity;

/// An order row in the `Orders` table.
///
/// One order covers a single product line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Order {
    pub partition_key: String,
    pub row_key: String,
    #[serde(skip_serializing)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Customer row key, or the username for orders placed from a cart.
    pub customer_id: String,
    pub username: String,
    pub product_id: String,
    pub product_name: String,
    pub order_date: DateTime<Utc>,
    pub quantity: i32,
    #[serde(rename = "TotalPriceString")]
    pub total_price: Price,
    #[serde(rename = "UnitPriceString", skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Price>,
    pub status: OrderStatus,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub etag: Option<String>,
}

impl Order {
    /// A new submitted order with a fresh row key, or `None` when the
    /// total does not fit.
    #[must_use]
    pub fn new(
        product_id: &str,
        product_name: &str,
        quantity: i32,
        unit_price: Price,
    ) -> Option<Self> {
        Some(Self {
            partition_key: Self::KIND.to_owned(),
            row_key: uuid::Uuid::new_v4().to_string(),
            product_id: product_id.to_owned(),
            product_name: product_name.to_owned(),
            order_date: Utc::now(),
            quantity,
            total_price: unit_price.checked_mul(quantity)?,
            unit_price: Some(unit_price),
            status: OrderStatus::Submitted,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.row_key
    }

    /// Stored unit price, or the total spread over the quantity for rows
    /// written before unit prices were kept.
    #[must_use]
    pub fn unit_price(&self) -> Price {
        self.unit_price
            .unwrap_or_else(|| self.total_price.per_unit(self.quantity))
    }

    /// Whether this order belongs to `username`.
    #[must_use]
    pub fn is_owned_by(&self, username: &str) -> bool {
        self.username == username || self.customer_id == username
    }
}

impl TableEntity for Order {
    const KIND: &'static str = "Order";
    const DATE_PROPERTIES: &'static [&'static str] = &["OrderDate", "UpdatedAt"];

    fn partition_key(&self) -> &str {
        &self.partition_key
    }

    fn row_key(&self) -> &str {
        &self.row_key
    }

    fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    fn set_etag(&mut self, etag: Option<String>) {
        self.etag = etag;
    }
}
