//! Table service: OData JSON entities.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, IF_MATCH};
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

use super::{AzureBackend, Service, check, etag_header, header_value, ignore_conflict};
use crate::storage::StorageError;
use crate::storage::backend::{EntityRecord, TableStore};

const ACCEPT_JSON: &str = "application/json;odata=minimalmetadata";
const NEXT_PARTITION_KEY: &str = "x-ms-continuation-nextpartitionkey";
const NEXT_ROW_KEY: &str = "x-ms-continuation-nextrowkey";

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    value: Vec<Map<String, Value>>,
}

impl AzureBackend {
    fn table_headers(content: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_JSON));
        headers.insert(
            HeaderName::from_static("dataserviceversion"),
            HeaderValue::from_static("3.0"),
        );
        headers.insert(
            HeaderName::from_static("maxdataserviceversion"),
            HeaderValue::from_static("3.0;NetFx"),
        );
        if content {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            headers.insert(
                HeaderName::from_static("prefer"),
                HeaderValue::from_static("return-no-content"),
            );
        }
        headers
    }

    fn entity_url(&self, table: &str, partition_key: &str, row_key: &str) -> Result<Url, StorageError> {
        let segment = format!(
            "{table}(PartitionKey='{}',RowKey='{}')",
            quote_key(partition_key),
            quote_key(row_key)
        );
        self.resource_url(Service::Table, &[&segment])
    }
}

/// Single quotes inside OData key literals are doubled.
fn quote_key(key: &str) -> String {
    key.replace('\'', "''")
}

/// Request body: keys, properties, and `Edm.DateTime` annotations.
fn entity_body(record: &EntityRecord) -> Result<Bytes, StorageError> {
    let mut body = record.properties.clone();
    body.insert(
        "PartitionKey".to_owned(),
        Value::String(record.partition_key.clone()),
    );
    body.insert("RowKey".to_owned(), Value::String(record.row_key.clone()));
    for name in record.date_properties {
        if record.properties.contains_key(*name) {
            body.insert(
                format!("{name}@odata.type"),
                Value::String("Edm.DateTime".to_owned()),
            );
        }
    }
    Ok(Bytes::from(serde_json::to_vec(&Value::Object(body))?))
}

/// Split a response object into keys, ETag and plain properties.
fn record_from_json(
    mut properties: Map<String, Value>,
    fallback_etag: Option<String>,
) -> Result<EntityRecord, StorageError> {
    let etag = properties
        .remove("odata.etag")
        .and_then(|v| v.as_str().map(str::to_owned))
        .or(fallback_etag);
    let mut take_key = |name: &str| match properties.remove(name) {
        Some(Value::String(s)) => Ok(s),
        _ => Err(StorageError::InvalidEntity(format!("response row has no {name}"))),
    };
    let partition_key = take_key("PartitionKey")?;
    let row_key = take_key("RowKey")?;
    properties.retain(|k, _| !k.starts_with("odata.") && !k.contains("@odata."));

    Ok(EntityRecord {
        partition_key,
        row_key,
        etag,
        properties,
        date_properties: &[],
    })
}

#[async_trait]
impl TableStore for AzureBackend {
    async fn create_table_if_not_exists(&self, table: &str) -> Result<(), StorageError> {
        let url = self.resource_url(Service::Table, &["Tables"])?;
        let body = serde_json::to_vec(&serde_json::json!({ "TableName": table }))?;
        let response = self
            .send(Service::Table, Method::POST, url, Self::table_headers(true), Bytes::from(body))
            .await?;
        ignore_conflict(check(response, &format!("create table {table}")).await)
    }

    async fn query_entities(&self, table: &str) -> Result<Vec<EntityRecord>, StorageError> {
        let mut records = Vec::new();
        let mut continuation: Option<(String, Option<String>)> = None;

        loop {
            let mut url = self.resource_url(Service::Table, &[&format!("{table}()")])?;
            if let Some((next_partition, next_row)) = &continuation {
                let mut query = url.query_pairs_mut();
                query.append_pair("NextPartitionKey", next_partition);
                if let Some(next_row) = next_row {
                    query.append_pair("NextRowKey", next_row);
                }
            }

            let response = self
                .send(Service::Table, Method::GET, url, Self::table_headers(false), Bytes::new())
                .await?;
            let response = check(response, &format!("query {table}")).await?;

            let header = |name: &str| {
                response
                    .headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned)
            };
            continuation = header(NEXT_PARTITION_KEY).map(|pk| (pk, header(NEXT_ROW_KEY)));

            let page: QueryResponse = response.json().await?;
            for row in page.value {
                records.push(record_from_json(row, None)?);
            }

            if continuation.is_none() {
                break;
            }
        }

        Ok(records)
    }

    async fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<EntityRecord>, StorageError> {
        let url = self.entity_url(table, partition_key, row_key)?;
        let response = self
            .send(Service::Table, Method::GET, url, Self::table_headers(false), Bytes::new())
            .await?;
        let response = match check(response, &format!("entity {partition_key}/{row_key}")).await {
            Ok(response) => response,
            Err(StorageError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let etag = etag_header(&response);
        let row: Map<String, Value> = response.json().await?;
        record_from_json(row, etag).map(Some)
    }

    async fn insert_entity(
        &self,
        table: &str,
        record: &EntityRecord,
    ) -> Result<Option<String>, StorageError> {
        let url = self.resource_url(Service::Table, &[table])?;
        let response = self
            .send(
                Service::Table,
                Method::POST,
                url,
                Self::table_headers(true),
                entity_body(record)?,
            )
            .await?;
        let response = check(
            response,
            &format!("insert {}/{}", record.partition_key, record.row_key),
        )
        .await?;
        Ok(etag_header(&response))
    }

    async fn update_entity(
        &self,
        table: &str,
        record: &EntityRecord,
        if_match: &str,
    ) -> Result<Option<String>, StorageError> {
        let url = self.entity_url(table, &record.partition_key, &record.row_key)?;
        let mut headers = Self::table_headers(true);
        headers.insert(IF_MATCH, header_value(if_match)?);
        let response = self
            .send(Service::Table, Method::PUT, url, headers, entity_body(record)?)
            .await?;
        let response = check(
            response,
            &format!("update {}/{}", record.partition_key, record.row_key),
        )
        .await?;
        Ok(etag_header(&response))
    }

    async fn delete_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<(), StorageError> {
        let url = self.entity_url(table, partition_key, row_key)?;
        let mut headers = Self::table_headers(false);
        headers.insert(IF_MATCH, HeaderValue::from_static("*"));
        let response = self
            .send(Service::Table, Method::DELETE, url, headers, Bytes::new())
            .await?;
        check(response, &format!("delete {partition_key}/{row_key}")).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::storage::ConnectionString;

    #[test]
    fn test_entity_url_quotes_keys() {
        let azure =
            AzureBackend::new(&ConnectionString::parse("UseDevelopmentStorage=true").unwrap())
                .unwrap();
        let url = azure.entity_url("Customers", "Customer", "o'brien").unwrap();
        assert!(url
            .as_str()
            .ends_with("/devstoreaccount1/Customers(PartitionKey='Customer',RowKey='o''brien')"));
    }

    #[test]
    fn test_entity_body_annotates_dates() {
        let record = EntityRecord {
            partition_key: "Order".to_string(),
            row_key: "o1".to_string(),
            etag: None,
            properties: json!({ "OrderDate": "2024-01-01T00:00:00Z", "Quantity": 2 })
                .as_object()
                .unwrap()
                .clone(),
            date_properties: &["OrderDate", "UpdatedAt"],
        };

        let body: Value = serde_json::from_slice(&entity_body(&record).unwrap()).unwrap();
        assert_eq!(body["PartitionKey"], "Order");
        assert_eq!(body["RowKey"], "o1");
        assert_eq!(body["OrderDate@odata.type"], "Edm.DateTime");
        assert!(body.get("UpdatedAt@odata.type").is_none());
    }

    #[test]
    fn test_record_from_json_strips_metadata() {
        let row = json!({
            "odata.etag": "W/\"datetime'2024'\"",
            "PartitionKey": "Product",
            "RowKey": "p1",
            "Timestamp": "2024-01-01T00:00:00.1234567Z",
            "Timestamp@odata.type": "Edm.DateTime",
            "ProductName": "Mug",
        });
        let record = record_from_json(row.as_object().unwrap().clone(), None).unwrap();

        assert_eq!(record.etag.as_deref(), Some("W/\"datetime'2024'\""));
        assert_eq!(record.row_key, "p1");
        assert!(record.properties.contains_key("Timestamp"));
        assert!(record.properties.contains_key("ProductName"));
        assert!(!record.properties.contains_key("Timestamp@odata.type"));
        assert!(!record.properties.contains_key("PartitionKey"));
    }

    #[test]
    fn test_record_without_keys_is_rejected() {
        let row = json!({ "ProductName": "Mug" });
        assert!(record_from_json(row.as_object().unwrap().clone(), None).is_err());
    }
}
