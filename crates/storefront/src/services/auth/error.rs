//! Errors from registering and signing in.

use thiserror::Error;

use cloudmart_core::UsernameError;

use crate::db::RepositoryError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    InvalidUsername(#[from] UsernameError),

    /// Unknown user and wrong password look the same to the caller.
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("username already exists")]
    UserAlreadyExists,

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("user store: {0}")]
    Repository(#[from] RepositoryError),

    /// Argon2 could not produce a hash.
    #[error("password hashing failed")]
    PasswordHash,
}
