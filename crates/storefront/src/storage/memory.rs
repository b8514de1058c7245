//! In-process storage backend.
//!
//! Behaves like the cloud services where the storefront depends on it:
//! operations on missing resources fail with `NotFound`, inserts conflict,
//! updates honour `If-Match`, and received messages stay hidden until
//! deleted. Nothing is signed, so image links are plain `memory://` URLs.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use super::StorageError;
use super::backend::{BlobStore, EntityRecord, FileShareStore, QueueMessage, QueueStore, TableStore};

type Rows = BTreeMap<(String, String), StoredRow>;

#[derive(Debug, Clone)]
struct StoredRow {
    etag: String,
    record: EntityRecord,
}

#[derive(Debug, Default)]
struct MemoryQueue {
    visible: VecDeque<(String, String)>,
    /// Received but not yet deleted, keyed by message id.
    in_flight: HashMap<String, (String, String)>,
}

#[derive(Debug, Default)]
struct Share {
    directories: HashSet<String>,
    files: HashMap<(String, String), Bytes>,
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<String, Rows>,
    containers: HashMap<String, HashMap<String, Bytes>>,
    queues: HashMap<String, MemoryQueue>,
    shares: HashMap<String, Share>,
}

/// Storage kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    sequence: AtomicU64,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn next_etag(&self) -> String {
        format!("W/\"datetime'{}'\"", self.next_id())
    }

    #[must_use]
    pub fn has_table(&self, table: &str) -> bool {
        self.state().tables.contains_key(table)
    }

    #[must_use]
    pub fn has_container(&self, container: &str) -> bool {
        self.state().containers.contains_key(container)
    }

    #[must_use]
    pub fn has_queue(&self, queue: &str) -> bool {
        self.state().queues.contains_key(queue)
    }

    #[must_use]
    pub fn has_directory(&self, share: &str, directory: &str) -> bool {
        self.state()
            .shares
            .get(share)
            .is_some_and(|s| s.directories.contains(directory))
    }

    /// Contents of a stored blob.
    #[must_use]
    pub fn blob(&self, container: &str, blob_name: &str) -> Option<Bytes> {
        self.state()
            .containers
            .get(container)
            .and_then(|blobs| blobs.get(blob_name))
            .cloned()
    }

    /// Number of visible messages in a queue.
    #[must_use]
    pub fn queue_len(&self, queue: &str) -> usize {
        self.state().queues.get(queue).map_or(0, |q| q.visible.len())
    }

    fn stamp(record: &EntityRecord, etag: &str) -> StoredRow {
        let mut record = record.clone();
        record.etag = Some(etag.to_owned());
        record.properties.insert(
            "Timestamp".to_owned(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        StoredRow {
            etag: etag.to_owned(),
            record,
        }
    }
}

fn table_missing(table: &str) -> StorageError {
    StorageError::NotFound(format!("table {table}"))
}

#[async_trait]
impl TableStore for MemoryBackend {
    async fn create_table_if_not_exists(&self, table: &str) -> Result<(), StorageError> {
        self.state().tables.entry(table.to_owned()).or_default();
        Ok(())
    }

    async fn query_entities(&self, table: &str) -> Result<Vec<EntityRecord>, StorageError> {
        let state = self.state();
        let rows = state.tables.get(table).ok_or_else(|| table_missing(table))?;
        Ok(rows.values().map(|row| row.record.clone()).collect())
    }

    async fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<EntityRecord>, StorageError> {
        let state = self.state();
        Ok(state.tables.get(table).and_then(|rows| {
            rows.get(&(partition_key.to_owned(), row_key.to_owned()))
                .map(|row| row.record.clone())
        }))
    }

    async fn insert_entity(
        &self,
        table: &str,
        record: &EntityRecord,
    ) -> Result<Option<String>, StorageError> {
        let etag = self.next_etag();
        let mut state = self.state();
        let rows = state
            .tables
            .get_mut(table)
            .ok_or_else(|| table_missing(table))?;
        let key = (record.partition_key.clone(), record.row_key.clone());
        if rows.contains_key(&key) {
            return Err(StorageError::Conflict(format!(
                "entity {}/{} in {table}",
                key.0, key.1
            )));
        }
        rows.insert(key, Self::stamp(record, &etag));
        Ok(Some(etag))
    }

    async fn update_entity(
        &self,
        table: &str,
        record: &EntityRecord,
        if_match: &str,
    ) -> Result<Option<String>, StorageError> {
        let etag = self.next_etag();
        let mut state = self.state();
        let rows = state
            .tables
            .get_mut(table)
            .ok_or_else(|| table_missing(table))?;
        let key = (record.partition_key.clone(), record.row_key.clone());
        let current = rows.get(&key).ok_or_else(|| {
            StorageError::NotFound(format!("entity {}/{} in {table}", key.0, key.1))
        })?;
        if if_match != "*" && if_match != current.etag {
            return Err(StorageError::PreconditionFailed);
        }
        rows.insert(key, Self::stamp(record, &etag));
        Ok(Some(etag))
    }

    async fn delete_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<(), StorageError> {
        let mut state = self.state();
        let rows = state
            .tables
            .get_mut(table)
            .ok_or_else(|| table_missing(table))?;
        rows.remove(&(partition_key.to_owned(), row_key.to_owned()))
            .map(|_| ())
            .ok_or_else(|| {
                StorageError::NotFound(format!("entity {partition_key}/{row_key} in {table}"))
            })
    }
}

#[async_trait]
impl BlobStore for MemoryBackend {
    async fn create_container_if_not_exists(&self, container: &str) -> Result<(), StorageError> {
        self.state()
            .containers
            .entry(container.to_owned())
            .or_default();
        Ok(())
    }

    async fn put_blob(
        &self,
        container: &str,
        blob_name: &str,
        data: Bytes,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let mut state = self.state();
        let blobs = state
            .containers
            .get_mut(container)
            .ok_or_else(|| StorageError::NotFound(format!("container {container}")))?;
        blobs.insert(blob_name.to_owned(), data);
        Ok(())
    }

    async fn delete_blob(&self, container: &str, blob_name: &str) -> Result<(), StorageError> {
        let mut state = self.state();
        let removed = state
            .containers
            .get_mut(container)
            .and_then(|blobs| blobs.remove(blob_name));
        removed
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(format!("blob {container}/{blob_name}")))
    }

    fn blob_url(&self, container: &str, blob_name: &str) -> String {
        format!("memory://{container}/{}", urlencoding::encode(blob_name))
    }

    fn read_sas_url(
        &self,
        _container: &str,
        _blob_name: &str,
        _expiry: DateTime<Utc>,
    ) -> Result<Option<String>, StorageError> {
        Ok(None)
    }
}

#[async_trait]
impl QueueStore for MemoryBackend {
    async fn create_queue_if_not_exists(&self, queue: &str) -> Result<(), StorageError> {
        self.state().queues.entry(queue.to_owned()).or_default();
        Ok(())
    }

    async fn send_message(&self, queue: &str, text: &str) -> Result<(), StorageError> {
        let id = self.next_id().to_string();
        let mut state = self.state();
        let q = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| StorageError::NotFound(format!("queue {queue}")))?;
        q.visible.push_back((id, text.to_owned()));
        Ok(())
    }

    async fn receive_message(&self, queue: &str) -> Result<Option<QueueMessage>, StorageError> {
        let pop_receipt = uuid::Uuid::new_v4().to_string();
        let mut state = self.state();
        let q = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| StorageError::NotFound(format!("queue {queue}")))?;
        let Some((id, text)) = q.visible.pop_front() else {
            return Ok(None);
        };
        q.in_flight
            .insert(id.clone(), (pop_receipt.clone(), text.clone()));
        Ok(Some(QueueMessage {
            id,
            pop_receipt,
            text,
        }))
    }

    async fn delete_message(
        &self,
        queue: &str,
        message: &QueueMessage,
    ) -> Result<(), StorageError> {
        let mut state = self.state();
        let q = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| StorageError::NotFound(format!("queue {queue}")))?;
        match q.in_flight.get(&message.id) {
            Some((receipt, _)) if *receipt == message.pop_receipt => {
                q.in_flight.remove(&message.id);
                Ok(())
            }
            _ => Err(StorageError::NotFound(format!("message {}", message.id))),
        }
    }
}

#[async_trait]
impl FileShareStore for MemoryBackend {
    async fn create_share_if_not_exists(&self, share: &str) -> Result<(), StorageError> {
        self.state().shares.entry(share.to_owned()).or_default();
        Ok(())
    }

    async fn create_directory_if_not_exists(
        &self,
        share: &str,
        directory: &str,
    ) -> Result<(), StorageError> {
        let mut state = self.state();
        let s = state
            .shares
            .get_mut(share)
            .ok_or_else(|| StorageError::NotFound(format!("share {share}")))?;
        s.directories.insert(directory.to_owned());
        Ok(())
    }

    async fn upload_file(
        &self,
        share: &str,
        directory: &str,
        file_name: &str,
        data: Bytes,
    ) -> Result<(), StorageError> {
        let mut state = self.state();
        let s = state
            .shares
            .get_mut(share)
            .ok_or_else(|| StorageError::NotFound(format!("share {share}")))?;
        if !directory.is_empty() && !s.directories.contains(directory) {
            return Err(StorageError::NotFound(format!("directory {share}/{directory}")));
        }
        s.files
            .insert((directory.to_owned(), file_name.to_owned()), data);
        Ok(())
    }

    async fn download_file(
        &self,
        share: &str,
        directory: &str,
        file_name: &str,
    ) -> Result<Bytes, StorageError> {
        self.state()
            .shares
            .get(share)
            .and_then(|s| s.files.get(&(directory.to_owned(), file_name.to_owned())))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("file {share}/{directory}/{file_name}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(row_key: &str) -> EntityRecord {
        EntityRecord {
            partition_key: "Product".to_string(),
            row_key: row_key.to_string(),
            ..EntityRecord::default()
        }
    }

    #[tokio::test]
    async fn test_query_missing_table_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend.query_entities("Nope").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_missing_entity_is_not_found() {
        let backend = MemoryBackend::new();
        backend.create_table_if_not_exists("Products").await.unwrap();
        let err = backend
            .update_entity("Products", &record("p1"), "*")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_etag_changes_on_every_write() {
        let backend = MemoryBackend::new();
        backend.create_table_if_not_exists("Products").await.unwrap();
        let first = backend
            .insert_entity("Products", &record("p1"))
            .await
            .unwrap()
            .unwrap();
        let second = backend
            .update_entity("Products", &record("p1"), &first)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_message_cannot_be_deleted_with_wrong_receipt() {
        let backend = MemoryBackend::new();
        backend.create_queue_if_not_exists("q").await.unwrap();
        backend.send_message("q", "hello").await.unwrap();

        let mut message = backend.receive_message("q").await.unwrap().unwrap();
        assert_eq!(backend.queue_len("q"), 0);

        let real_receipt = std::mem::replace(&mut message.pop_receipt, "forged".to_string());
        assert!(backend.delete_message("q", &message).await.is_err());

        message.pop_receipt = real_receipt;
        backend.delete_message("q", &message).await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_to_missing_directory_fails() {
        let backend = MemoryBackend::new();
        backend.create_share_if_not_exists("contracts").await.unwrap();
        let err = backend
            .upload_file("contracts", "missing", "a.txt", Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
