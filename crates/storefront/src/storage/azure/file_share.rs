//! File service: shares, directories, and files written in ranges.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::debug;

use super::{AzureBackend, Service, check, header_value, ignore_conflict};
use crate::storage::StorageError;
use crate::storage::backend::FileShareStore;

/// Largest range accepted by a single Put Range call.
const MAX_RANGE_BYTES: usize = 4 * 1024 * 1024;

/// `share`, the directory parts, then `file` (if any) as URL segments.
fn path_segments<'a>(share: &'a str, directory: &'a str, file: Option<&'a str>) -> Vec<&'a str> {
    std::iter::once(share)
        .chain(directory.split('/').filter(|s| !s.is_empty()))
        .chain(file)
        .collect()
}

/// Inclusive byte ranges covering `len` bytes.
fn ranges(len: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..len)
        .step_by(MAX_RANGE_BYTES)
        .map(move |start| (start, (start + MAX_RANGE_BYTES).min(len) - 1))
}

#[async_trait]
impl FileShareStore for AzureBackend {
    async fn create_share_if_not_exists(&self, share: &str) -> Result<(), StorageError> {
        let mut url = self.resource_url(Service::File, &[share])?;
        url.query_pairs_mut().append_pair("restype", "share");
        let response = self
            .send(Service::File, Method::PUT, url, HeaderMap::new(), Bytes::new())
            .await?;
        ignore_conflict(check(response, &format!("create share {share}")).await)
    }

    async fn create_directory_if_not_exists(
        &self,
        share: &str,
        directory: &str,
    ) -> Result<(), StorageError> {
        let mut url = self.resource_url(Service::File, &path_segments(share, directory, None))?;
        url.query_pairs_mut().append_pair("restype", "directory");
        let response = self
            .send(Service::File, Method::PUT, url, HeaderMap::new(), Bytes::new())
            .await?;
        ignore_conflict(check(response, &format!("create directory {share}/{directory}")).await)
    }

    async fn upload_file(
        &self,
        share: &str,
        directory: &str,
        file_name: &str,
        data: Bytes,
    ) -> Result<(), StorageError> {
        let segments = path_segments(share, directory, Some(file_name));
        let context = format!("upload {share}/{directory}/{file_name}");

        // Create the file at its final size, then fill it range by range.
        let url = self.resource_url(Service::File, &segments)?;
        let mut headers = HeaderMap::new();
        headers.insert("x-ms-type", HeaderValue::from_static("file"));
        headers.insert("x-ms-content-length", HeaderValue::from(data.len()));
        let response = self
            .send(Service::File, Method::PUT, url, headers, Bytes::new())
            .await?;
        check(response, &context).await?;

        for (start, end) in ranges(data.len()) {
            let mut url = self.resource_url(Service::File, &segments)?;
            url.query_pairs_mut().append_pair("comp", "range");
            let mut headers = HeaderMap::new();
            headers.insert("x-ms-write", HeaderValue::from_static("update"));
            headers.insert("x-ms-range", header_value(&format!("bytes={start}-{end}"))?);
            let response = self
                .send(
                    Service::File,
                    Method::PUT,
                    url,
                    headers,
                    data.slice(start..=end),
                )
                .await?;
            check(response, &context).await?;
            debug!(start, end, "File range written");
        }
        Ok(())
    }

    async fn download_file(
        &self,
        share: &str,
        directory: &str,
        file_name: &str,
    ) -> Result<Bytes, StorageError> {
        let url =
            self.resource_url(Service::File, &path_segments(share, directory, Some(file_name)))?;
        let response = self
            .send(Service::File, Method::GET, url, HeaderMap::new(), Bytes::new())
            .await?;
        let response = check(response, &format!("download {share}/{directory}/{file_name}")).await?;
        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_segments() {
        assert_eq!(path_segments("contracts", "", Some("a.pdf")), vec!["contracts", "a.pdf"]);
        assert_eq!(
            path_segments("contracts", "payments/2024", None),
            vec!["contracts", "payments", "2024"]
        );
    }

    #[test]
    fn test_ranges_cover_data() {
        assert_eq!(ranges(0).count(), 0);
        assert_eq!(ranges(10).collect::<Vec<_>>(), vec![(0, 9)]);
        let big: Vec<_> = ranges(MAX_RANGE_BYTES + 1).collect();
        assert_eq!(big, vec![(0, MAX_RANGE_BYTES - 1), (MAX_RANGE_BYTES, MAX_RANGE_BYTES)]);
    }
}
