//! Cloud storage: tables, blobs, queues and file shares behind one service.
//!
//! [`StorageService`] is the only type handlers talk to. It serializes
//! [`TableEntity`] values to flat property maps, names uploaded blobs and
//! files, and provisions every table, container, queue and share the
//! storefront needs exactly once per instance.
//!
//! The actual I/O goes through a [`StorageBackend`]:
//!
//! - [`azure::AzureBackend`] talks to the storage REST APIs with `reqwest`
//! - [`MemoryBackend`] keeps everything in process, for tests and local runs

pub mod azure;
mod backend;
mod entity;
mod memory;

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{Local, Utc};
use secrecy::ExposeSecret;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};

pub use azure::{AzureBackend, ConnectionString, ConnectionStringError};
pub use backend::{
    BlobStore, EntityRecord, FileShareStore, QueueMessage, QueueStore, StorageBackend, TableStore,
};
pub use entity::{TableEntity, table_name};
pub use memory::MemoryBackend;

use crate::config::{StorageBackendKind, StorageConfig};

/// Names of every provisioned storage resource.
pub mod names {
    pub const CUSTOMERS_TABLE: &str = "Customers";
    pub const PRODUCTS_TABLE: &str = "Products";
    pub const ORDERS_TABLE: &str = "Orders";

    pub const UPLOADS_CONTAINER: &str = "uploads";
    pub const PRODUCT_IMAGES_CONTAINER: &str = "product-images";
    pub const PAYMENT_PROOFS_CONTAINER: &str = "payment-proofs";

    pub const ORDERS_QUEUE: &str = "orders-queue";
    pub const ORDER_NOTIFICATIONS_QUEUE: &str = "order-notifications";
    pub const STOCK_UPDATES_QUEUE: &str = "stock-updates";
    pub const ORDER_NOTIFICATIONS_POISON_QUEUE: &str = "order-notifications-poison";
    pub const STOCK_UPDATES_POISON_QUEUE: &str = "stock-updates-poison";

    pub const CONTRACTS_SHARE: &str = "contracts";
    pub const PAYMENTS_DIRECTORY: &str = "payments";

    pub const TABLES: [&str; 3] = [CUSTOMERS_TABLE, PRODUCTS_TABLE, ORDERS_TABLE];
    pub const CONTAINERS: [&str; 3] = [
        UPLOADS_CONTAINER,
        PRODUCT_IMAGES_CONTAINER,
        PAYMENT_PROOFS_CONTAINER,
    ];
    pub const QUEUES: [&str; 5] = [
        ORDERS_QUEUE,
        ORDER_NOTIFICATIONS_QUEUE,
        STOCK_UPDATES_QUEUE,
        ORDER_NOTIFICATIONS_POISON_QUEUE,
        STOCK_UPDATES_POISON_QUEUE,
    ];
}

/// Keys and service-managed properties, carried outside the property map.
const RESERVED_PROPERTIES: [&str; 4] = ["PartitionKey", "RowKey", "Timestamp", "ETag"];

/// Errors from storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The HTTP request could not be sent or its body read.
    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with an unexpected status.
    #[error("storage service returned {status} ({code}): {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    /// The table, entity, container, blob, queue, share or file does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The resource already exists.
    #[error("already exists: {0}")]
    Conflict(String),

    /// The entity changed since it was read (ETag mismatch).
    #[error("entity was modified since it was read")]
    PreconditionFailed,

    #[error("entity serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid entity: {0}")]
    InvalidEntity(String),

    #[error("invalid XML response: {0}")]
    Xml(String),

    #[error("request signing failed: {0}")]
    Signing(String),

    #[error(transparent)]
    ConnectionString(#[from] ConnectionStringError),

    /// The backend has no implementation of this resource type.
    #[error("{0} is not supported by this storage backend")]
    Unsupported(&'static str),
}

/// A file received from a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Name as sent by the browser, without any directory part.
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl UploadedFile {
    #[must_use]
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Extension including the leading dot, or empty.
    #[must_use]
    pub fn extension(&self) -> String {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map_or_else(String::new, |e| format!(".{e}"))
    }
}

/// Unified access to table, blob, queue and file-share storage.
pub struct StorageService {
    backend: Arc<dyn StorageBackend>,
    initialized: OnceCell<()>,
    sas_expiry: chrono::Duration,
}

impl std::fmt::Debug for StorageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageService")
            .field("initialized", &self.initialized.initialized())
            .field("sas_expiry", &self.sas_expiry)
            .finish_non_exhaustive()
    }
}

impl StorageService {
    /// Wrap a backend. Image links stay valid for `sas_expiry_days`.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>, sas_expiry_days: u32) -> Self {
        Self {
            backend,
            initialized: OnceCell::new(),
            sas_expiry: chrono::Duration::days(i64::from(sas_expiry_days)),
        }
    }

    /// Build the backend selected by configuration.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::ConnectionString` if the Azure connection
    /// string is missing or invalid, or `StorageError::Http` if the HTTP
    /// client cannot be built.
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let backend: Arc<dyn StorageBackend> = match config.backend {
            StorageBackendKind::Memory => Arc::new(MemoryBackend::new()),
            StorageBackendKind::Azure => {
                let raw = config
                    .connection_string
                    .as_ref()
                    .ok_or(ConnectionStringError::Missing)?;
                let parsed = ConnectionString::parse(raw.expose_secret())?;
                Arc::new(AzureBackend::new(&parsed)?)
            }
        };
        Ok(Self::new(backend, config.sas_expiry_days))
    }

    /// A service over a fresh in-memory backend.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()), 7)
    }

    /// Provision all tables, containers, queues and the contracts share.
    ///
    /// Runs at most once per service. Concurrent callers wait for the
    /// in-flight attempt; a failed attempt is retried by the next caller.
    ///
    /// # Errors
    ///
    /// Returns the first backend error hit while provisioning.
    pub async fn initialize(&self) -> Result<(), StorageError> {
        self.initialized
            .get_or_try_init(|| self.provision())
            .await
            .map(|_| ())
            .inspect_err(|e| tracing::error!(error = %e, "Storage initialization failed"))
    }

    /// Whether provisioning has completed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }

    async fn provision(&self) -> Result<(), StorageError> {
        for table in names::TABLES {
            self.backend.create_table_if_not_exists(table).await?;
        }
        for container in names::CONTAINERS {
            self.backend.create_container_if_not_exists(container).await?;
        }
        for queue in names::QUEUES {
            self.backend.create_queue_if_not_exists(queue).await?;
        }
        match self
            .backend
            .create_share_if_not_exists(names::CONTRACTS_SHARE)
            .await
        {
            Ok(()) => {
                self.backend
                    .create_directory_if_not_exists(
                        names::CONTRACTS_SHARE,
                        names::PAYMENTS_DIRECTORY,
                    )
                    .await?;
            }
            Err(StorageError::Unsupported(what)) => {
                warn!(resource = what, "Skipping file share provisioning");
            }
            Err(e) => return Err(e),
        }

        info!("Storage initialized");
        Ok(())
    }

    // =========================================================================
    // Tables
    // =========================================================================

    /// Every entity in `T`'s table.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails or a row does not match `T`.
    pub async fn get_all_entities<T: TableEntity>(&self) -> Result<Vec<T>, StorageError> {
        self.initialize().await?;
        let table = table_name::<T>();
        self.backend
            .query_entities(&table)
            .await?
            .into_iter()
            .map(from_record)
            .collect()
    }

    /// A single entity, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for anything other than not-found.
    pub async fn get_entity<T: TableEntity>(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<T>, StorageError> {
        self.initialize().await?;
        let table = table_name::<T>();
        match self
            .backend
            .get_entity(&table, partition_key, row_key)
            .await
        {
            Ok(Some(record)) => from_record(record).map(Some),
            Ok(None) | Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Insert a new entity.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if an entity with the same keys exists.
    #[instrument(skip(self, entity), fields(table = %table_name::<T>(), row_key = %entity.row_key()))]
    pub async fn add_entity<T: TableEntity>(&self, entity: &T) -> Result<(), StorageError> {
        self.initialize().await?;
        let record = to_record(entity)?;
        self.backend
            .insert_entity(&table_name::<T>(), &record)
            .await?;
        Ok(())
    }

    /// Replace an existing entity, guarded by its ETag when it has one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::PreconditionFailed` if the entity changed since
    /// it was read, or `StorageError::NotFound` if it no longer exists.
    #[instrument(skip(self, entity), fields(table = %table_name::<T>(), row_key = %entity.row_key()))]
    pub async fn update_entity<T: TableEntity>(&self, entity: &T) -> Result<(), StorageError> {
        self.initialize().await?;
        let record = to_record(entity)?;
        let if_match = entity.etag().unwrap_or("*");
        self.backend
            .update_entity(&table_name::<T>(), &record, if_match)
            .await?;
        Ok(())
    }

    /// Delete an entity regardless of its ETag.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    #[instrument(skip(self))]
    pub async fn delete_entity<T: TableEntity>(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> Result<(), StorageError> {
        self.initialize().await?;
        self.backend
            .delete_entity(&table_name::<T>(), partition_key, row_key)
            .await
    }

    // =========================================================================
    // Blobs
    // =========================================================================

    /// Store an image under a fresh `{uuid}{ext}` name and return a link to it.
    ///
    /// The link is a read-only SAS URL when the backend can sign one,
    /// otherwise the plain blob URL.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the container cannot be created or the
    /// upload fails.
    #[instrument(skip(self, file), fields(file_name = %file.file_name, size = file.data.len()))]
    pub async fn upload_image(
        &self,
        file: &UploadedFile,
        container: &str,
    ) -> Result<String, StorageError> {
        self.backend.create_container_if_not_exists(container).await?;

        let blob_name = format!("{}{}", uuid::Uuid::new_v4(), file.extension());
        self.backend
            .put_blob(container, &blob_name, file.data.clone(), &file.content_type)
            .await?;

        let expiry = Utc::now() + self.sas_expiry;
        let url = self
            .backend
            .read_sas_url(container, &blob_name, expiry)?
            .unwrap_or_else(|| self.backend.blob_url(container, &blob_name));

        info!(container, blob = %blob_name, "Image uploaded");
        Ok(url)
    }

    /// Store a file under a `{yyyyMMdd_HHmmss}_{name}` blob name and return that name.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the container cannot be created or the
    /// upload fails.
    #[instrument(skip(self, file), fields(file_name = %file.file_name, size = file.data.len()))]
    pub async fn upload_file(
        &self,
        file: &UploadedFile,
        container: &str,
    ) -> Result<String, StorageError> {
        self.backend.create_container_if_not_exists(container).await?;

        let blob_name = timestamped_name(&file.file_name);
        self.backend
            .put_blob(container, &blob_name, file.data.clone(), &file.content_type)
            .await?;

        info!(container, blob = %blob_name, "File uploaded");
        Ok(blob_name)
    }

    /// Delete a blob. A blob that does not exist is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the service rejects the delete.
    #[instrument(skip(self))]
    pub async fn delete_blob(&self, blob_name: &str, container: &str) -> Result<(), StorageError> {
        match self.backend.delete_blob(container, blob_name).await {
            Ok(()) | Err(StorageError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    // =========================================================================
    // Queues
    // =========================================================================

    /// Enqueue `text` as-is.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the queue rejects the message.
    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn send_message(&self, queue: &str, text: &str) -> Result<(), StorageError> {
        self.initialize().await?;
        self.backend.send_message(queue, text).await
    }

    /// Dequeue one message, delete it, and return its text.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if receiving or deleting fails.
    #[instrument(skip(self))]
    pub async fn receive_message(&self, queue: &str) -> Result<Option<String>, StorageError> {
        self.initialize().await?;
        let Some(message) = self.backend.receive_message(queue).await? else {
            return Ok(None);
        };
        self.backend.delete_message(queue, &message).await?;
        Ok(Some(message.text))
    }

    // =========================================================================
    // File shares
    // =========================================================================

    /// Store a file in `share/directory` as `{yyyyMMdd_HHmmss}_{name}`.
    ///
    /// An empty `directory` means the share root.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the directory cannot be created or the
    /// upload fails.
    #[instrument(skip(self, file), fields(file_name = %file.file_name, size = file.data.len()))]
    pub async fn upload_to_file_share(
        &self,
        file: &UploadedFile,
        share: &str,
        directory: &str,
    ) -> Result<String, StorageError> {
        self.initialize().await?;
        if !directory.is_empty() {
            self.backend
                .create_directory_if_not_exists(share, directory)
                .await?;
        }

        let file_name = timestamped_name(&file.file_name);
        self.backend
            .upload_file(share, directory, &file_name, file.data.clone())
            .await?;

        info!(share, directory, file = %file_name, "File stored in share");
        Ok(file_name)
    }

    /// Read a file from `share/directory`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the file does not exist.
    #[instrument(skip(self))]
    pub async fn download_from_file_share(
        &self,
        share: &str,
        file_name: &str,
        directory: &str,
    ) -> Result<Bytes, StorageError> {
        self.initialize().await?;
        self.backend.download_file(share, directory, file_name).await
    }
}

/// `{yyyyMMdd_HHmmss}_{name}` in local time.
fn timestamped_name(file_name: &str) -> String {
    format!("{}_{file_name}", Local::now().format("%Y%m%d_%H%M%S"))
}

/// Recover the blob name from a URL issued by [`StorageService::upload_image`].
#[must_use]
pub fn blob_name_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    urlencoding::decode(last).ok().map(std::borrow::Cow::into_owned)
}

fn to_record<T: TableEntity>(entity: &T) -> Result<EntityRecord, StorageError> {
    let Value::Object(mut properties) = serde_json::to_value(entity)? else {
        return Err(StorageError::InvalidEntity(format!(
            "{} did not serialize to a property map",
            T::KIND
        )));
    };
    for name in RESERVED_PROPERTIES {
        properties.remove(name);
    }
    properties.retain(|_, value| !value.is_null());

    Ok(EntityRecord {
        partition_key: entity.partition_key().to_owned(),
        row_key: entity.row_key().to_owned(),
        etag: entity.etag().map(str::to_owned),
        properties,
        date_properties: T::DATE_PROPERTIES,
    })
}

fn from_record<T: TableEntity>(record: EntityRecord) -> Result<T, StorageError> {
    let EntityRecord {
        partition_key,
        row_key,
        etag,
        mut properties,
        ..
    } = record;
    properties.insert("PartitionKey".to_owned(), Value::String(partition_key));
    properties.insert("RowKey".to_owned(), Value::String(row_key));

    let mut entity: T = serde_json::from_value(Value::Object(properties))?;
    entity.set_etag(etag);
    Ok(entity)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "PascalCase", default)]
    struct Widget {
        partition_key: String,
        row_key: String,
        #[serde(skip_serializing)]
        timestamp: Option<chrono::DateTime<Utc>>,
        label: String,
        count: i32,
        note: Option<String>,
        #[serde(skip)]
        etag: Option<String>,
    }

    impl TableEntity for Widget {
        const KIND: &'static str = "Widget";

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

    fn widget(row_key: &str) -> Widget {
        Widget {
            partition_key: "Widget".to_string(),
            row_key: row_key.to_string(),
            label: "blue".to_string(),
            count: 3,
            ..Widget::default()
        }
    }

    async fn service_with_widgets() -> StorageService {
        let service = StorageService::in_memory();
        service.initialize().await.unwrap();
        service
            .backend
            .create_table_if_not_exists("Widgets")
            .await
            .unwrap();
        service
    }

    #[tokio::test]
    async fn test_initialize_provisions_everything() {
        let memory = Arc::new(MemoryBackend::new());
        let service = StorageService::new(memory.clone(), 7);
        service.initialize().await.unwrap();

        for table in names::TABLES {
            assert!(memory.has_table(table), "{table}");
        }
        for container in names::CONTAINERS {
            assert!(memory.has_container(container), "{container}");
        }
        for queue in names::QUEUES {
            assert!(memory.has_queue(queue), "{queue}");
        }
        assert!(memory.has_directory(names::CONTRACTS_SHARE, names::PAYMENTS_DIRECTORY));
        assert!(service.is_initialized());
    }

    #[tokio::test]
    async fn test_entity_round_trip_keeps_etag_and_drops_nulls() {
        let service = service_with_widgets().await;
        service.add_entity(&widget("w1")).await.unwrap();

        let stored: Widget = service.get_entity("Widget", "w1").await.unwrap().unwrap();
        assert_eq!(stored.label, "blue");
        assert!(stored.etag.is_some());
        assert!(stored.timestamp.is_some());
        assert!(stored.note.is_none());
    }

    #[tokio::test]
    async fn test_get_missing_entity_is_none() {
        let service = service_with_widgets().await;
        let missing: Option<Widget> = service.get_entity("Widget", "nope").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_add_duplicate_conflicts() {
        let service = service_with_widgets().await;
        service.add_entity(&widget("w1")).await.unwrap();
        let err = service.add_entity(&widget("w1")).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_with_stale_etag_fails() {
        let service = service_with_widgets().await;
        service.add_entity(&widget("w1")).await.unwrap();

        let mut first: Widget = service.get_entity("Widget", "w1").await.unwrap().unwrap();
        let mut second = first.clone();

        first.count = 10;
        service.update_entity(&first).await.unwrap();

        second.count = 20;
        let err = service.update_entity(&second).await.unwrap_err();
        assert!(matches!(err, StorageError::PreconditionFailed));

        // No ETag means unconditional replace.
        second.etag = None;
        service.update_entity(&second).await.unwrap();
        let stored: Widget = service.get_entity("Widget", "w1").await.unwrap().unwrap();
        assert_eq!(stored.count, 20);
    }

    #[tokio::test]
    async fn test_delete_entity() {
        let service = service_with_widgets().await;
        service.add_entity(&widget("w1")).await.unwrap();
        service.delete_entity::<Widget>("Widget", "w1").await.unwrap();
        let all: Vec<Widget> = service.get_all_entities().await.unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn test_upload_image_names_blob_with_uuid_and_extension() {
        let memory = Arc::new(MemoryBackend::new());
        let service = StorageService::new(memory.clone(), 7);
        let file = UploadedFile::new("photo.PNG", "image/png", Bytes::from_static(b"png"));

        let url = service.upload_image(&file, "fresh-container").await.unwrap();
        let name = blob_name_from_url(&url).unwrap();

        assert!(name.ends_with(".PNG"));
        assert_eq!(name.len(), 36 + 4);
        assert_eq!(
            memory.blob("fresh-container", &name).unwrap(),
            Bytes::from_static(b"png")
        );
    }

    #[tokio::test]
    async fn test_upload_file_uses_timestamp_prefix() {
        let service = StorageService::in_memory();
        let file = UploadedFile::new("proof.pdf", "application/pdf", Bytes::from_static(b"%PDF"));

        let name = service.upload_file(&file, "payment-proofs").await.unwrap();
        let (stamp, rest) = name.split_at(15);
        assert_eq!(rest, "_proof.pdf");
        assert_eq!(stamp.as_bytes()[8], b'_');
        assert!(stamp.chars().filter(char::is_ascii_digit).count() == 14);
    }

    #[tokio::test]
    async fn test_delete_missing_blob_is_ok() {
        let service = StorageService::in_memory();
        service.initialize().await.unwrap();
        service.delete_blob("ghost.png", "uploads").await.unwrap();
    }

    #[tokio::test]
    async fn test_receive_deletes_message() {
        let service = StorageService::in_memory();
        service
            .send_message(names::ORDER_NOTIFICATIONS_QUEUE, "{\"OrderId\":\"1\"}")
            .await
            .unwrap();

        let text = service
            .receive_message(names::ORDER_NOTIFICATIONS_QUEUE)
            .await
            .unwrap();
        assert_eq!(text.as_deref(), Some("{\"OrderId\":\"1\"}"));
        assert!(service
            .receive_message(names::ORDER_NOTIFICATIONS_QUEUE)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_file_share_round_trip() {
        let service = StorageService::in_memory();
        let file = UploadedFile::new("contract.pdf", "application/pdf", Bytes::from_static(b"ok"));

        let name = service
            .upload_to_file_share(&file, names::CONTRACTS_SHARE, "signed")
            .await
            .unwrap();
        let data = service
            .download_from_file_share(names::CONTRACTS_SHARE, &name, "signed")
            .await
            .unwrap();
        assert_eq!(data, Bytes::from_static(b"ok"));

        let root = service
            .upload_to_file_share(&file, names::CONTRACTS_SHARE, "")
            .await
            .unwrap();
        assert!(service
            .download_from_file_share(names::CONTRACTS_SHARE, &root, "")
            .await
            .is_ok());
    }

    #[test]
    fn test_blob_name_from_url() {
        assert_eq!(
            blob_name_from_url("https://acct.blob.core.windows.net/product-images/abc.png?sv=1&sig=x")
                .as_deref(),
            Some("abc.png")
        );
        assert_eq!(
            blob_name_from_url("memory://uploads/a%20b.txt").as_deref(),
            Some("a b.txt")
        );
        assert_eq!(blob_name_from_url("not a url"), None);
    }

    /// Fails table creation until told otherwise.
    struct FlakyBackend {
        inner: MemoryBackend,
        failures_left: AtomicUsize,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl TableStore for FlakyBackend {
        async fn create_table_if_not_exists(&self, table: &str) -> Result<(), StorageError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StorageError::Service {
                    status: 503,
                    code: "ServerBusy".to_string(),
                    message: "try later".to_string(),
                });
            }
            self.inner.create_table_if_not_exists(table).await
        }
        async fn query_entities(&self, table: &str) -> Result<Vec<EntityRecord>, StorageError> {
            self.inner.query_entities(table).await
        }
        async fn get_entity(
            &self,
            table: &str,
            partition_key: &str,
            row_key: &str,
        ) -> Result<Option<EntityRecord>, StorageError> {
            self.inner.get_entity(table, partition_key, row_key).await
        }
        async fn insert_entity(
            &self,
            table: &str,
            record: &EntityRecord,
        ) -> Result<Option<String>, StorageError> {
            self.inner.insert_entity(table, record).await
        }
        async fn update_entity(
            &self,
            table: &str,
            record: &EntityRecord,
            if_match: &str,
        ) -> Result<Option<String>, StorageError> {
            self.inner.update_entity(table, record, if_match).await
        }
        async fn delete_entity(
            &self,
            table: &str,
            partition_key: &str,
            row_key: &str,
        ) -> Result<(), StorageError> {
            self.inner.delete_entity(table, partition_key, row_key).await
        }
    }

    #[async_trait]
    impl BlobStore for FlakyBackend {
        async fn create_container_if_not_exists(&self, container: &str) -> Result<(), StorageError> {
            self.inner.create_container_if_not_exists(container).await
        }
        async fn put_blob(
            &self,
            container: &str,
            blob_name: &str,
            data: Bytes,
            content_type: &str,
        ) -> Result<(), StorageError> {
            self.inner.put_blob(container, blob_name, data, content_type).await
        }
        async fn delete_blob(&self, container: &str, blob_name: &str) -> Result<(), StorageError> {
            self.inner.delete_blob(container, blob_name).await
        }
        fn blob_url(&self, container: &str, blob_name: &str) -> String {
            self.inner.blob_url(container, blob_name)
        }
        fn read_sas_url(
            &self,
            container: &str,
            blob_name: &str,
            expiry: chrono::DateTime<Utc>,
        ) -> Result<Option<String>, StorageError> {
            self.inner.read_sas_url(container, blob_name, expiry)
        }
    }

    #[async_trait]
    impl QueueStore for FlakyBackend {
        async fn create_queue_if_not_exists(&self, queue: &str) -> Result<(), StorageError> {
            self.inner.create_queue_if_not_exists(queue).await
        }
        async fn send_message(&self, queue: &str, text: &str) -> Result<(), StorageError> {
            self.inner.send_message(queue, text).await
        }
        async fn receive_message(&self, queue: &str) -> Result<Option<QueueMessage>, StorageError> {
            self.inner.receive_message(queue).await
        }
        async fn delete_message(
            &self,
            queue: &str,
            message: &QueueMessage,
        ) -> Result<(), StorageError> {
            self.inner.delete_message(queue, message).await
        }
    }

    #[async_trait]
    impl FileShareStore for FlakyBackend {
        async fn create_share_if_not_exists(&self, _share: &str) -> Result<(), StorageError> {
            Err(StorageError::Unsupported("file shares"))
        }
        async fn create_directory_if_not_exists(
            &self,
            share: &str,
            directory: &str,
        ) -> Result<(), StorageError> {
            self.inner.create_directory_if_not_exists(share, directory).await
        }
        async fn upload_file(
            &self,
            share: &str,
            directory: &str,
            file_name: &str,
            data: Bytes,
        ) -> Result<(), StorageError> {
            self.inner.upload_file(share, directory, file_name, data).await
        }
        async fn download_file(
            &self,
            share: &str,
            directory: &str,
            file_name: &str,
        ) -> Result<Bytes, StorageError> {
            self.inner.download_file(share, directory, file_name).await
        }
    }

    #[tokio::test]
    async fn test_failed_initialization_is_retried() {
        let backend = Arc::new(FlakyBackend {
            inner: MemoryBackend::new(),
            failures_left: AtomicUsize::new(1),
            attempts: AtomicUsize::new(0),
        });
        let service = StorageService::new(backend.clone(), 7);

        assert!(service.initialize().await.is_err());
        assert!(!service.is_initialized());

        service.initialize().await.unwrap();
        assert!(service.is_initialized());
        let attempts = backend.attempts.load(Ordering::SeqCst);

        // A third call does no provisioning work.
        service.initialize().await.unwrap();
        assert_eq!(backend.attempts.load(Ordering::SeqCst), attempts);
    }

    #[tokio::test]
    async fn test_concurrent_initialization_runs_once() {
        let backend = Arc::new(FlakyBackend {
            inner: MemoryBackend::new(),
            failures_left: AtomicUsize::new(0),
            attempts: AtomicUsize::new(0),
        });
        let service = Arc::new(StorageService::new(backend.clone(), 7));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.initialize().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(backend.attempts.load(Ordering::SeqCst), names::TABLES.len());
    }
}
