//! Azure Storage REST backend.
//!
//! Talks to the Blob, Queue, Table and File services directly with
//! `reqwest`. Requests are signed with Shared Key (Shared Key Lite for
//! tables) when the connection string carries an account key; otherwise a
//! SAS token is appended to every URL.
//!
//! Each service lives in its own module:
//!
//! - `table`: entity CRUD with OData JSON and continuation tokens
//! - `blob`: containers and block blobs
//! - `queue`: XML message envelopes
//! - `file_share`: shares, directories and ranged file writes

mod auth;
mod blob;
mod connection_string;
mod file_share;
mod queue;
mod table;

use std::time::{Duration, SystemTime};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, HeaderMap, HeaderValue};
use reqwest::{Method, Response, StatusCode};
use tracing::{debug, info};
use url::Url;

pub use connection_string::{
    ConnectionString, ConnectionStringError, DEVELOPMENT_ACCOUNT_KEY, DEVELOPMENT_ACCOUNT_NAME,
};

use self::auth::Credential;
use super::StorageError;

/// Azure REST API version used for all requests.
pub(crate) const AZURE_API_VERSION: &str = "2023-11-03";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Service {
    Blob,
    Queue,
    Table,
    File,
}

/// Backend that forwards every operation to an Azure storage account.
pub struct AzureBackend {
    client: reqwest::Client,
    account: String,
    credential: Credential,
    blob_endpoint: Url,
    queue_endpoint: Url,
    table_endpoint: Url,
    file_endpoint: Option<Url>,
}

impl std::fmt::Debug for AzureBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureBackend")
            .field("account", &self.account)
            .field("blob_endpoint", &self.blob_endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl AzureBackend {
    /// Build a backend from a parsed connection string.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::ConnectionString` if the credentials or
    /// endpoints are unusable, or `StorageError::Http` if the HTTP client
    /// cannot be created.
    pub fn new(connection: &ConnectionString) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let credential = match (connection.account_key(), connection.sas_token()) {
            (Some(key), _) => Credential::SharedKey {
                key_bytes: BASE64_STANDARD
                    .decode(key)
                    .map_err(|_| ConnectionStringError::InvalidAccountKey)?,
            },
            (None, Some(token)) => Credential::SasToken {
                token: token.to_owned(),
            },
            (None, None) => return Err(ConnectionStringError::MissingCredentials.into()),
        };

        let parse = |raw: &str, name: &'static str| {
            Url::parse(raw).map_err(|_| ConnectionStringError::InvalidEndpoint(name))
        };
        let backend = Self {
            client,
            account: connection.account_name().to_owned(),
            credential,
            blob_endpoint: parse(connection.blob_endpoint(), "BlobEndpoint")?,
            queue_endpoint: parse(connection.queue_endpoint(), "QueueEndpoint")?,
            table_endpoint: parse(connection.table_endpoint(), "TableEndpoint")?,
            file_endpoint: connection
                .file_endpoint()
                .map(|raw| parse(raw, "FileEndpoint"))
                .transpose()?,
        };

        info!(
            account = %backend.account,
            blob = %backend.blob_endpoint,
            development = connection.is_development_storage(),
            "Azure storage backend configured"
        );
        Ok(backend)
    }

    fn endpoint(&self, service: Service) -> Result<&Url, StorageError> {
        match service {
            Service::Blob => Ok(&self.blob_endpoint),
            Service::Queue => Ok(&self.queue_endpoint),
            Service::Table => Ok(&self.table_endpoint),
            Service::File => self
                .file_endpoint
                .as_ref()
                .ok_or(StorageError::Unsupported("file shares")),
        }
    }

    /// Service endpoint with `segments` appended, each percent-encoded.
    fn resource_url(&self, service: Service, segments: &[&str]) -> Result<Url, StorageError> {
        let mut url = self.endpoint(service)?.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| ConnectionStringError::InvalidEndpoint("storage endpoint"))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    /// Stamp, sign and send a request.
    async fn send(
        &self,
        service: Service,
        method: Method,
        mut url: Url,
        mut headers: HeaderMap,
        body: Bytes,
    ) -> Result<Response, StorageError> {
        let date = httpdate::fmt_http_date(SystemTime::now());
        headers.insert("x-ms-date", header_value(&date)?);
        headers.insert("x-ms-version", HeaderValue::from_static(AZURE_API_VERSION));
        if !body.is_empty() {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        }

        self.credential.maybe_append_sas(&mut url);
        if let Credential::SharedKey { key_bytes } = &self.credential {
            let authorization = if service == Service::Table {
                let string_to_sign = auth::table_string_to_sign(&date, &url, &self.account);
                format!(
                    "SharedKeyLite {}:{}",
                    self.account,
                    auth::sign(key_bytes, &string_to_sign)?
                )
            } else {
                let string_to_sign =
                    auth::shared_key_string_to_sign(method.as_str(), &headers, &url, &self.account);
                format!(
                    "SharedKey {}:{}",
                    self.account,
                    auth::sign(key_bytes, &string_to_sign)?
                )
            };
            headers.insert(AUTHORIZATION, header_value(&authorization)?);
        }

        debug!(method = %method, path = url.path(), "Storage request");
        let response = self
            .client
            .request(method, url)
            .headers(headers)
            .body(body)
            .send()
            .await?;
        Ok(response)
    }
}

fn header_value(value: &str) -> Result<HeaderValue, StorageError> {
    HeaderValue::from_str(value).map_err(|e| StorageError::Signing(format!("bad header value: {e}")))
}

/// Turn a non-success response into the matching `StorageError`.
async fn check(response: Response, context: &str) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let code = response
        .headers()
        .get("x-ms-error-code")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    let body = response.text().await.unwrap_or_default();

    Err(match status {
        StatusCode::NOT_FOUND => StorageError::NotFound(format!("{context} ({code})")),
        StatusCode::CONFLICT => StorageError::Conflict(format!("{context} ({code})")),
        StatusCode::PRECONDITION_FAILED => StorageError::PreconditionFailed,
        _ => StorageError::Service {
            status: status.as_u16(),
            code,
            message: body,
        },
    })
}

/// Creation calls succeed when the resource is already there.
fn ignore_conflict(result: Result<Response, StorageError>) -> Result<(), StorageError> {
    match result {
        Ok(_) | Err(StorageError::Conflict(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

fn etag_header(response: &Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn backend(raw: &str) -> AzureBackend {
        AzureBackend::new(&ConnectionString::parse(raw).unwrap()).unwrap()
    }

    #[test]
    fn test_resource_url_encodes_segments() {
        let azure = backend("UseDevelopmentStorage=true");
        let url = azure
            .resource_url(Service::Blob, &["payment-proofs", "20240101_120000_my proof.pdf"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:10000/devstoreaccount1/payment-proofs/20240101_120000_my%20proof.pdf"
        );
    }

    #[test]
    fn test_emulator_has_no_file_service() {
        let azure = backend("UseDevelopmentStorage=true");
        assert!(matches!(
            azure.resource_url(Service::File, &["contracts"]),
            Err(StorageError::Unsupported(_))
        ));
    }

    #[test]
    fn test_sas_only_backend_uses_token() {
        let azure = backend(
            "BlobEndpoint=https://a.blob.core.windows.net;QueueEndpoint=https://a.queue.core.windows.net;\
             TableEndpoint=https://a.table.core.windows.net;SharedAccessSignature=sv=1&sig=x",
        );
        assert!(matches!(azure.credential, Credential::SasToken { .. }));
    }
}
