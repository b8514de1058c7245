//! Catalog product entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cloudmart_core::Price;

use crate::storage::TableEntity;

/// A product row in the `Products` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Product {
    pub partition_key: String,
    pub row_key: String,
    #[serde(skip_serializing)]
    pub timestamp: Option<DateTime<Utc>>,
    pub product_name: String,
    pub description: String,
    /// Persisted only as a two-decimal string.
    #[serde(rename = "PriceString")]
    pub price: Price,
    pub stock_available: i32,
    pub image_url: String,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub etag: Option<String>,
}

impl Product {
    /// A new product with a fresh row key.
    #[must_use]
    pub fn new(name: &str, description: &str, price: Price, stock_available: i32) -> Self {
        Self {
            partition_key: Self::KIND.to_owned(),
            row_key: uuid::Uuid::new_v4().to_string(),
            product_name: name.trim().to_owned(),
            description: description.trim().to_owned(),
            price,
            stock_available,
            ..Self::default()
        }
    }

    /// Products are addressed by their row key.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.row_key
    }

    #[must_use]
    pub fn has_image(&self) -> bool {
        !self.image_url.is_empty()
    }
}

impl TableEntity for Product {
    const KIND: &'static str = "Product";
    const DATE_PROPERTIES: &'static [&'static str] = &["UpdatedAt"];

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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_price_stored_as_string_only() {
        let product = Product::new("Mug", "Ceramic", Price::from_cents(1250), 4);
        let value = serde_json::to_value(&product).unwrap();

        assert_eq!(value["PriceString"], "12.50");
        assert!(value.get("Price").is_none());
        assert!(value.get("Timestamp").is_none());
        assert_eq!(value["PartitionKey"], "Product");
        assert_eq!(value["StockAvailable"], 4);
    }

    #[test]
    fn test_lenient_read_of_legacy_row() {
        let product: Product = serde_json::from_value(json!({
            "PartitionKey": "Product",
            "RowKey": "p1",
            "ProductName": "Lamp",
            "PriceString": "n/a",
        }))
        .unwrap();

        assert_eq!(product.price, Price::ZERO);
        assert_eq!(product.stock_available, 0);
        assert!(!product.has_image());
    }
}
