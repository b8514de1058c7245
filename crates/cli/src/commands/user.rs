//! User account commands.
//!
//! Public registration only ever creates customers; this is how admins
//! are made.
//!
//! # Usage
//!
//! ```bash
//! cm-cli user create -u alice -p 'correct horse battery' -r Admin
//! ```

use cloudmart_core::Role;
use cloudmart_storefront::db;
use cloudmart_storefront::services::{AuthError, AuthService};
use thiserror::Error;

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error(transparent)]
    Auth(AuthError),
}

/// Create a user account with the given role.
///
/// # Errors
///
/// Returns `UserError::UserExists` if the username is taken, or
/// `UserError::Auth` if the username or password is rejected.
pub async fn create_user(username: &str, password: &str, role: Role) -> Result<(), UserError> {
    let database_url = super::database_url().map_err(UserError::MissingEnvVar)?;
    let pool = db::create_pool(&database_url).await?;

    let user = AuthService::new(&pool)
        .register(username, password, role)
        .await
        .map_err(|e| match e {
            AuthError::UserAlreadyExists => UserError::UserExists(username.to_owned()),
            other => UserError::Auth(other),
        })?;

    tracing::info!("User created successfully!");
    tracing::info!("  ID: {}", user.id);
    tracing::info!("  Username: {}", user.username);
    tracing::info!("  Role: {}", user.role);
    Ok(())
}
