//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions.

use sqlx::PgPool;
use tower_sessions::cookie::time::Duration;
use tower_sessions::{Expiry, Session, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "cm_session";

/// Default inactivity timeout.
const SESSION_EXPIRY: Duration = Duration::hours(24);

/// Inactivity timeout after a "remember me" login.
const REMEMBER_ME_EXPIRY: Duration = Duration::days(30);

/// Create the session layer with `PostgreSQL` store.
///
/// The sessions table must be created via migration.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore> {
    session_layer(PostgresStore::new(pool.clone()), config.is_https())
}

/// Apply the cookie settings to any store.
#[must_use]
pub fn session_layer<S: SessionStore + Clone>(store: S, secure: bool) -> SessionManagerLayer<S> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(SESSION_EXPIRY))
        .with_secure(secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// Extend the session to 30 days when the user asked to be remembered.
pub fn apply_remember_me(session: &Session, remember_me: bool) {
    let expiry = if remember_me {
        REMEMBER_ME_EXPIRY
    } else {
        SESSION_EXPIRY
    };
    session.set_expiry(Some(Expiry::OnInactivity(expiry)));
}
