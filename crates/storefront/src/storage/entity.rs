//! Table entity trait and type-to-table naming.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A row stored in a table.
///
/// Implementors serialize to a flat map of PascalCase properties including
/// `PartitionKey` and `RowKey`. `Timestamp` is filled in by the service on
/// read and is never written back; the ETag travels outside the property map
/// via [`TableEntity::etag`] and [`TableEntity::set_etag`].
pub trait TableEntity: Serialize + DeserializeOwned + Send + Sync {
    /// Entity kind. Also the fixed partition key for rows of this type.
    const KIND: &'static str;

    /// Properties that must be typed as `Edm.DateTime` on write.
    const DATE_PROPERTIES: &'static [&'static str] = &[];

    fn partition_key(&self) -> &str;
    fn row_key(&self) -> &str;
    fn etag(&self) -> Option<&str>;
    fn set_etag(&mut self, etag: Option<String>);
}

/// The table an entity type lives in.
#[must_use]
pub fn table_name<T: TableEntity>() -> String {
    match T::KIND {
        "Customer" => "Customers".to_owned(),
        "Product" => "Products".to_owned(),
        "Order" => "Orders".to_owned(),
        other => format!("{other}s"),
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Serialize, Deserialize)]
    struct Gadget;

    impl TableEntity for Gadget {
        const KIND: &'static str = "Gadget";

        fn partition_key(&self) -> &str {
            Self::KIND
        }
        fn row_key(&self) -> &str {
            ""
        }
        fn etag(&self) -> Option<&str> {
            None
        }
        fn set_etag(&mut self, _etag: Option<String>) {}
    }

    #[test]
    fn test_table_name_for_known_and_unknown_kinds() {
        assert_eq!(table_name::<crate::models::Product>(), "Products");
        assert_eq!(table_name::<crate::models::Order>(), "Orders");
        assert_eq!(table_name::<crate::models::Customer>(), "Customers");
        assert_eq!(table_name::<Gadget>(), "Gadgets");
    }
}
