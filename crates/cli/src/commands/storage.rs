//! Cloud storage commands.
//!
//! # Environment Variables
//!
//! - `AzureWebJobsStorage`, `ConnectionStrings__AzureStorage` or
//!   `Storage__ConnectionString` - account connection string
//! - `STORAGE_BACKEND` - `azure` (default) or `memory`

use std::path::PathBuf;

use cloudmart_storefront::config::StorageConfig;
use cloudmart_storefront::storage::StorageService;

/// Connect using the same settings as the storefront.
pub(crate) fn connect() -> Result<StorageService, Box<dyn std::error::Error>> {
    let config = StorageConfig::from_env()?;
    Ok(StorageService::from_config(&config)?)
}

/// Provision every table, container, queue and share.
///
/// # Errors
///
/// Returns an error if the connection string is missing or any resource
/// cannot be created.
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let storage = connect()?;
    storage.initialize().await?;
    tracing::info!("Storage initialized");
    Ok(())
}

/// Receive one message from `queue` and print it.
///
/// # Errors
///
/// Returns an error if the queue cannot be read.
pub async fn receive(queue: &str) -> Result<(), Box<dyn std::error::Error>> {
    let storage = connect()?;
    let message = storage.receive_message(queue).await?;

    #[allow(clippy::print_stdout)]
    match message {
        Some(text) => println!("{text}"),
        None => println!("queue empty"),
    }
    Ok(())
}

/// Download `share/dir/file` to `out`, or to `file` in the working directory.
///
/// # Errors
///
/// Returns an error if the file does not exist or cannot be written.
pub async fn download(
    share: &str,
    file: &str,
    dir: &str,
    out: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let storage = connect()?;
    let data = storage.download_from_file_share(share, file, dir).await?;

    let out = out.unwrap_or_else(|| PathBuf::from(file));
    tokio::fs::write(&out, &data).await?;

    tracing::info!(
        share,
        file,
        bytes = data.len(),
        path = %out.display(),
        "File downloaded"
    );
    Ok(())
}
