//! Backend traits implemented by each storage provider.
//!
//! Traits are object-safe (`async_trait`) so the service can hold an
//! `Arc<dyn StorageBackend>` chosen at startup.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::StorageError;

/// A table row as the backend sees it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityRecord {
    pub partition_key: String,
    pub row_key: String,
    pub etag: Option<String>,
    /// User properties plus, on read, `Timestamp`.
    pub properties: Map<String, Value>,
    /// Names of properties to store as `Edm.DateTime`.
    pub date_properties: &'static [&'static str],
}

/// A message taken off a queue but not yet deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub id: String,
    pub pop_receipt: String,
    pub text: String,
}

#[async_trait]
pub trait TableStore: Send + Sync {
    async fn create_table_if_not_exists(&self, table: &str) -> Result<(), StorageError>;

    /// All rows, following continuation tokens.
    async fn query_entities(&self, table: &str) -> Result<Vec<EntityRecord>, StorageError>;

    async fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<EntityRecord>, StorageError>;

    /// Insert; returns the new ETag when the backend reports one.
    async fn insert_entity(
        &self,
        table: &str,
        record: &EntityRecord,
    ) -> Result<Option<String>, StorageError>;

    /// Replace the whole row if its ETag matches `if_match` (`*` matches any).
    async fn update_entity(
        &self,
        table: &str,
        record: &EntityRecord,
        if_match: &str,
    ) -> Result<Option<String>, StorageError>;

    async fn delete_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<(), StorageError>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn create_container_if_not_exists(&self, container: &str) -> Result<(), StorageError>;

    /// Upload a block blob, overwriting any existing blob of that name.
    async fn put_blob(
        &self,
        container: &str,
        blob_name: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError>;

    async fn delete_blob(&self, container: &str, blob_name: &str) -> Result<(), StorageError>;

    /// Unsigned URL of a blob.
    fn blob_url(&self, container: &str, blob_name: &str) -> String;

    /// Read-only link valid until `expiry`, or `None` if this backend has no
    /// key to sign with.
    fn read_sas_url(
        &self,
        container: &str,
        blob_name: &str,
        expiry: DateTime<Utc>,
    ) -> Result<Option<String>, StorageError>;
}

#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn create_queue_if_not_exists(&self, queue: &str) -> Result<(), StorageError>;
    async fn send_message(&self, queue: &str, text: &str) -> Result<(), StorageError>;
    async fn receive_message(&self, queue: &str) -> Result<Option<QueueMessage>, StorageError>;
    async fn delete_message(&self, queue: &str, message: &QueueMessage)
    -> Result<(), StorageError>;
}

/// File shares. An empty `directory` is the share root.
#[async_trait]
pub trait FileShareStore: Send + Sync {
    async fn create_share_if_not_exists(&self, share: &str) -> Result<(), StorageError>;

    async fn create_directory_if_not_exists(
        &self,
        share: &str,
        directory: &str,
    ) -> Result<(), StorageError>;

    async fn upload_file(
        &self,
        share: &str,
        directory: &str,
        file_name: &str,
        data: Bytes,
    ) -> Result<(), StorageError>;

    async fn download_file(
        &self,
        share: &str,
        directory: &str,
        file_name: &str,
    ) -> Result<Bytes, StorageError>;
}

/// Everything the storage service needs from a provider.
pub trait StorageBackend: TableStore + BlobStore + QueueStore + FileShareStore {}

impl<T> StorageBackend for T where T: TableStore + BlobStore + QueueStore + FileShareStore {}
