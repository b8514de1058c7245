//! JSON payloads sent to the order queues.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cloudmart_core::OrderStatus;

/// Sent to `order-notifications` for every order created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct OrderNotification {
    pub order_id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub product_name: String,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
}

/// Sent to `stock-updates` when an admin order changes stock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct StockUpdate {
    pub product_id: String,
    pub product_name: String,
    pub previous_stock: i32,
    pub new_stock: i32,
    pub update_by: String,
    pub update_date: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_notification_wire_format() {
        let message = OrderNotification {
            order_id: "o1".to_string(),
            customer_id: "c1".to_string(),
            customer_name: "Ada Lovelace".to_string(),
            product_name: "Mug".to_string(),
            quantity: 2,
            total_price: Decimal::from_str("25.50").unwrap(),
            order_date: DateTime::parse_from_rfc3339("2024-05-01T08:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            status: OrderStatus::Submitted,
        };
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["OrderId"], "o1");
        assert_eq!(value["CustomerName"], "Ada Lovelace");
        assert_eq!(value["TotalPrice"], 25.5);
        assert_eq!(value["Status"], "Submitted");
        assert_eq!(value["OrderDate"], "2024-05-01T08:00:00Z");
    }
}
