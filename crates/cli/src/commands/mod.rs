//! Command implementations.

pub mod migrate;
pub mod seed;
pub mod storage;
pub mod user;

use secrecy::SecretString;

/// Storefront database URL: `STOREFRONT_DATABASE_URL`, then `DATABASE_URL`.
pub(crate) fn database_url() -> Result<SecretString, &'static str> {
    dotenvy::dotenv().ok();
    std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| "STOREFRONT_DATABASE_URL (or DATABASE_URL) not set")
}
