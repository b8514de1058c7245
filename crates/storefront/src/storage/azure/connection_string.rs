//! Storage account connection strings.
//!
//! `Key=Value` pairs separated by `;`. Service endpoints are either given
//! explicitly (`BlobEndpoint=...`) or derived from the account name,
//! protocol and endpoint suffix. `UseDevelopmentStorage=true` selects the
//! local emulator with its well-known account.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Account name used by the local storage emulator.
pub const DEVELOPMENT_ACCOUNT_NAME: &str = "devstoreaccount1";

/// Publicly documented key of the local storage emulator.
pub const DEVELOPMENT_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionStringError {
    #[error("no storage connection string configured")]
    Missing,

    #[error("malformed connection string segment: {0}")]
    Malformed(String),

    #[error("connection string has no AccountName")]
    MissingAccountName,

    #[error("connection string has neither AccountKey nor SharedAccessSignature")]
    MissingCredentials,

    #[error("AccountKey is not valid base64")]
    InvalidAccountKey,

    #[error("invalid {0} URL")]
    InvalidEndpoint(&'static str),
}

/// A parsed storage connection string.
#[derive(Clone)]
pub struct ConnectionString {
    account_name: String,
    account_key: Option<SecretString>,
    sas_token: Option<SecretString>,
    blob_endpoint: String,
    queue_endpoint: String,
    table_endpoint: String,
    file_endpoint: Option<String>,
    development: bool,
}

impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("account_name", &self.account_name)
            .field("blob_endpoint", &self.blob_endpoint)
            .field("queue_endpoint", &self.queue_endpoint)
            .field("table_endpoint", &self.table_endpoint)
            .field("file_endpoint", &self.file_endpoint)
            .field("development", &self.development)
            .finish_non_exhaustive()
    }
}

impl ConnectionString {
    /// Parse a connection string.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionStringError` if a segment has no `=`, the account
    /// or its credentials are missing, the key is not base64, or an explicit
    /// endpoint is not a URL.
    pub fn parse(raw: &str) -> Result<Self, ConnectionStringError> {
        let mut protocol = "https".to_owned();
        let mut suffix = DEFAULT_ENDPOINT_SUFFIX.to_owned();
        let mut account_name = None;
        let mut account_key = None;
        let mut sas_token = None;
        let mut blob_endpoint = None;
        let mut queue_endpoint = None;
        let mut table_endpoint = None;
        let mut file_endpoint = None;
        let mut development = false;

        for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = segment
                .split_once('=')
                .ok_or_else(|| ConnectionStringError::Malformed(redact(segment)))?;
            let value = value.trim();
            match key.trim() {
                "DefaultEndpointsProtocol" => value.clone_into(&mut protocol),
                "AccountName" => account_name = Some(value.to_owned()),
                "AccountKey" => account_key = Some(value.to_owned()),
                "EndpointSuffix" => value.clone_into(&mut suffix),
                "SharedAccessSignature" => {
                    sas_token = Some(value.trim_start_matches('?').to_owned());
                }
                "BlobEndpoint" => blob_endpoint = Some(checked_endpoint(value, "BlobEndpoint")?),
                "QueueEndpoint" => {
                    queue_endpoint = Some(checked_endpoint(value, "QueueEndpoint")?);
                }
                "TableEndpoint" => {
                    table_endpoint = Some(checked_endpoint(value, "TableEndpoint")?);
                }
                "FileEndpoint" => file_endpoint = Some(checked_endpoint(value, "FileEndpoint")?),
                "UseDevelopmentStorage" => development = value.eq_ignore_ascii_case("true"),
                // Other keys (e.g. DevelopmentStorageProxyUri) are accepted and ignored.
                _ => {}
            }
        }

        if development {
            return Ok(Self::development());
        }

        if let Some(key) = &account_key {
            BASE64_STANDARD
                .decode(key)
                .map_err(|_| ConnectionStringError::InvalidAccountKey)?;
        }
        if account_key.is_none() && sas_token.is_none() {
            return Err(ConnectionStringError::MissingCredentials);
        }

        let has_explicit_endpoints =
            blob_endpoint.is_some() && queue_endpoint.is_some() && table_endpoint.is_some();
        let account_name = match account_name {
            Some(name) => name,
            None if has_explicit_endpoints && account_key.is_none() => String::new(),
            None => return Err(ConnectionStringError::MissingAccountName),
        };

        let derive = |service: &str| format!("{protocol}://{account_name}.{service}.{suffix}");
        let file_endpoint = file_endpoint.or_else(|| {
            (!account_name.is_empty()).then(|| derive("file"))
        });

        Ok(Self {
            blob_endpoint: blob_endpoint.unwrap_or_else(|| derive("blob")),
            queue_endpoint: queue_endpoint.unwrap_or_else(|| derive("queue")),
            table_endpoint: table_endpoint.unwrap_or_else(|| derive("table")),
            file_endpoint,
            account_key: account_key.map(SecretString::from),
            sas_token: sas_token.map(SecretString::from),
            account_name,
            development: false,
        })
    }

    /// Local emulator endpoints. The emulator has no file service.
    fn development() -> Self {
        let endpoint = |port: u16| format!("http://127.0.0.1:{port}/{DEVELOPMENT_ACCOUNT_NAME}");
        Self {
            account_name: DEVELOPMENT_ACCOUNT_NAME.to_owned(),
            account_key: Some(SecretString::from(DEVELOPMENT_ACCOUNT_KEY)),
            sas_token: None,
            blob_endpoint: endpoint(10000),
            queue_endpoint: endpoint(10001),
            table_endpoint: endpoint(10002),
            file_endpoint: None,
            development: true,
        }
    }

    #[must_use]
    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    /// The base64 account key, if the connection string has one.
    #[must_use]
    pub fn account_key(&self) -> Option<&str> {
        self.account_key.as_ref().map(|s| s.expose_secret())
    }

    /// The SAS token without a leading `?`.
    #[must_use]
    pub fn sas_token(&self) -> Option<&str> {
        self.sas_token.as_ref().map(|s| s.expose_secret())
    }

    #[must_use]
    pub fn blob_endpoint(&self) -> &str {
        &self.blob_endpoint
    }

    #[must_use]
    pub fn queue_endpoint(&self) -> &str {
        &self.queue_endpoint
    }

    #[must_use]
    pub fn table_endpoint(&self) -> &str {
        &self.table_endpoint
    }

    #[must_use]
    pub fn file_endpoint(&self) -> Option<&str> {
        self.file_endpoint.as_deref()
    }

    #[must_use]
    pub const fn is_development_storage(&self) -> bool {
        self.development
    }
}

fn checked_endpoint(value: &str, name: &'static str) -> Result<String, ConnectionStringError> {
    url::Url::parse(value).map_err(|_| ConnectionStringError::InvalidEndpoint(name))?;
    Ok(value.trim_end_matches('/').to_owned())
}

/// Keep only the key of a segment so secrets never reach error messages.
fn redact(segment: &str) -> String {
    segment.chars().take(24).collect::<String>() + "..."
}
