//! Authentication service.
//!
//! Username/password accounts stored in `PostgreSQL`. Passwords are hashed
//! with Argon2id. Accounts imported from the old user table may still hold a
//! plain-text password; those verify by direct comparison once and are
//! rehashed on that login.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;
use tracing::{info, warn};

use cloudmart_core::{Role, Username};

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::User;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Stored values shorter than this that do not start with `$` are legacy
/// plain-text passwords.
const LEGACY_PLAINTEXT_MAX_LEN: usize = 30;

/// How a password matched its stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordMatch {
    /// Verified against an Argon2 hash.
    Hashed,
    /// Matched a legacy plain-text value; the caller should rehash.
    LegacyPlaintext,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidUsername` if the username is invalid.
    /// Returns `AuthError::PasswordTooShort` if the password is too short.
    /// Returns `AuthError::UserAlreadyExists` if the username is taken.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<User, AuthError> {
        let username = Username::parse(username)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create(&username, &password_hash, role)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        info!(user_id = %user.id, role = %user.role, "User registered");
        Ok(user)
    }

    /// Login with username and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the username/password is wrong.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let username = Username::parse(username).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, stored) = self
            .users
            .get_password_hash(&username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if verify_password(password, &stored)? == PasswordMatch::LegacyPlaintext {
            // Login already succeeded; a failed upgrade is retried next time.
            match hash_password(password) {
                Ok(hash) => {
                    if let Err(e) = self.users.update_password_hash(user.id, &hash).await {
                        warn!(user_id = %user.id, error = %e, "Failed to rehash legacy password");
                    } else {
                        info!(user_id = %user.id, "Legacy password rehashed");
                    }
                }
                Err(e) => warn!(user_id = %user.id, error = %e, "Failed to rehash legacy password"),
            }
        }

        Ok(user)
    }

    /// Look up a user by username.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the query fails.
    pub async fn get_user(&self, username: &str) -> Result<Option<User>, AuthError> {
        let Ok(username) = Username::parse(username) else {
            return Ok(None);
        };
        Ok(self.users.get_by_username(&username).await?)
    }

    /// Whether `username` is an admin. Unknown users are not.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the query fails.
    pub async fn is_admin(&self, username: &str) -> Result<bool, AuthError> {
        Ok(self
            .get_user(username)
            .await?
            .is_some_and(|user| user.is_admin()))
    }
}

/// Validate password requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::PasswordTooShort {
            min: MIN_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against its stored value.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` if the password does not match,
/// including when the stored value is neither legacy plain text nor a
/// parseable Argon2 hash.
pub fn verify_password(password: &str, stored: &str) -> Result<PasswordMatch, AuthError> {
    if stored.len() < LEGACY_PLAINTEXT_MAX_LEN && !stored.starts_with('$') {
        return if password == stored {
            Ok(PasswordMatch::LegacyPlaintext)
        } else {
            Err(AuthError::InvalidCredentials)
        };
    }

    let parsed_hash = PasswordHash::new(stored).map_err(|_| AuthError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map(|()| PasswordMatch::Hashed)
        .map_err(|_| AuthError::InvalidCredentials)
}
