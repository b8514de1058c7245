//! Blob service: containers and block blobs.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use tracing::debug;

use super::auth::{self, Credential};
use super::{AzureBackend, Service, check, header_value, ignore_conflict};
use crate::storage::StorageError;
use crate::storage::backend::BlobStore;

#[async_trait]
impl BlobStore for AzureBackend {
    async fn create_container_if_not_exists(&self, container: &str) -> Result<(), StorageError> {
        let mut url = self.resource_url(Service::Blob, &[container])?;
        url.query_pairs_mut().append_pair("restype", "container");
        let response = self
            .send(Service::Blob, Method::PUT, url, HeaderMap::new(), Bytes::new())
            .await?;
        ignore_conflict(check(response, &format!("create container {container}")).await)
    }

    async fn put_blob(
        &self,
        container: &str,
        blob_name: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let url = self.resource_url(Service::Blob, &[container, blob_name])?;
        let mut headers = HeaderMap::new();
        headers.insert("x-ms-blob-type", HeaderValue::from_static("BlockBlob"));
        let content_type = if content_type.is_empty() {
            "application/octet-stream"
        } else {
            content_type
        };
        headers.insert(CONTENT_TYPE, header_value(content_type)?);

        let response = self
            .send(Service::Blob, Method::PUT, url, headers, data)
            .await?;
        check(response, &format!("upload {container}/{blob_name}")).await?;
        Ok(())
    }

    /// Idempotent: a missing blob is not an error.
    async fn delete_blob(&self, container: &str, blob_name: &str) -> Result<(), StorageError> {
        let url = self.resource_url(Service::Blob, &[container, blob_name])?;
        let response = self
            .send(Service::Blob, Method::DELETE, url, HeaderMap::new(), Bytes::new())
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(container, blob = blob_name, "Blob already gone");
            return Ok(());
        }
        check(response, &format!("delete {container}/{blob_name}")).await?;
        Ok(())
    }

    fn blob_url(&self, container: &str, blob_name: &str) -> String {
        self.resource_url(Service::Blob, &[container, blob_name])
            .map_or_else(
                |_| format!("{}/{container}/{blob_name}", self.blob_endpoint),
                String::from,
            )
    }

    fn read_sas_url(
        &self,
        container: &str,
        blob_name: &str,
        expiry: DateTime<Utc>,
    ) -> Result<Option<String>, StorageError> {
        let Credential::SharedKey { key_bytes } = &self.credential else {
            return Ok(None);
        };
        let sas = auth::blob_read_sas(key_bytes, &self.account, container, blob_name, expiry)?;
        let mut url = self.resource_url(Service::Blob, &[container, blob_name])?;
        url.set_query(Some(&sas));
        Ok(Some(url.into()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::storage::ConnectionString;

    #[test]
    fn test_read_sas_url_with_account_key() {
        let azure =
            AzureBackend::new(&ConnectionString::parse("UseDevelopmentStorage=true").unwrap())
                .unwrap();
        let url = azure
            .read_sas_url("product-images", "a.png", Utc::now() + Duration::days(7))
            .unwrap()
            .unwrap();
        assert!(url.starts_with(
            "http://127.0.0.1:10000/devstoreaccount1/product-images/a.png?sv=2023-11-03&se="
        ));
        assert!(url.contains("&sr=b&sp=r&sig="));
    }

    #[test]
    fn test_sas_credential_cannot_sign() {
        let azure = AzureBackend::new(
            &ConnectionString::parse(
                "BlobEndpoint=https://a.blob.core.windows.net;QueueEndpoint=https://a.queue.core.windows.net;\
                 TableEndpoint=https://a.table.core.windows.net;SharedAccessSignature=sv=1&sig=x",
            )
            .unwrap(),
        )
        .unwrap();
        assert!(azure
            .read_sas_url("product-images", "a.png", Utc::now())
            .unwrap()
            .is_none());
        assert_eq!(
            azure.blob_url("product-images", "a.png"),
            "https://a.blob.core.windows.net/product-images/a.png"
        );
    }
}
