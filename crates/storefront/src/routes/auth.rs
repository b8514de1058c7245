//! Authentication route handlers.
//!
//! Handles login, registration, logout and the access-denied page. Users
//! are kept in `PostgreSQL`; the session holds a [`CurrentUser`].

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use cloudmart_core::Role;

use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{
    PageContext, apply_remember_me, clear_current_user, set_current_user, set_flash,
};
use crate::models::{CurrentUser, Flash};
use crate::services::{AuthError, AuthService};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    /// Checkbox; present only when ticked.
    pub remember_me: Option<String>,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
    pub password_confirm: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub page: PageContext,
    pub username: String,
    pub error: Option<String>,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub page: PageContext,
    pub username: String,
    pub error: Option<String>,
}

/// Access denied page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/access_denied.html")]
pub struct AccessDeniedTemplate {
    pub page: PageContext,
}

/// Where a user lands after signing in.
const fn home_for(role: Role) -> &'static str {
    if role.is_admin() {
        "/dashboard/admin"
    } else {
        "/dashboard/customer"
    }
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page. Signed-in users go straight to their dashboard.
pub async fn login_page(page: PageContext) -> Response {
    if let Some(user) = &page.user {
        return Redirect::to(home_for(user.role)).into_response();
    }
    LoginTemplate {
        page,
        username: String::new(),
        error: None,
    }
    .into_response()
}

/// Handle login form submission.
#[instrument(skip(state, session, page, form), fields(username = %form.username))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
    Form(form): Form<LoginForm>,
) -> Response {
    let auth = AuthService::new(state.pool());
    let user = match auth.login(&form.username, &form.password).await {
        Ok(user) => user,
        Err(AuthError::InvalidCredentials) => {
            tracing::warn!("Login failed: invalid credentials");
            return LoginTemplate {
                page,
                username: form.username,
                error: Some("Invalid username or password.".to_string()),
            }
            .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "Login failed");
            return LoginTemplate {
                page,
                username: form.username,
                error: Some("An error occurred during login. Please try again.".to_string()),
            }
            .into_response();
        }
    };

    let current = CurrentUser::from(&user);
    if let Err(e) = set_current_user(&session, &current).await {
        tracing::error!("Failed to set session: {}", e);
        return LoginTemplate {
            page,
            username: form.username,
            error: Some("An error occurred during login. Please try again.".to_string()),
        }
        .into_response();
    }
    apply_remember_me(&session, form.remember_me.is_some());

    set_sentry_user(&user.id, Some(&user.username));
    add_breadcrumb("auth", "User logged in", Some(&[("role", user.role.as_str())]));
    set_flash(
        &session,
        Flash::success(format!("Welcome back, {}!", user.username)),
    )
    .await;

    Redirect::to(home_for(user.role)).into_response()
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(page: PageContext) -> impl IntoResponse {
    RegisterTemplate {
        page,
        username: String::new(),
        error: None,
    }
}

/// Handle registration form submission.
///
/// Public registration always creates a customer account.
#[instrument(skip(state, session, page, form), fields(username = %form.username))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
    Form(form): Form<RegisterForm>,
) -> Response {
    let render_error = |page: PageContext, username: String, error: String| {
        RegisterTemplate {
            page,
            username,
            error: Some(error),
        }
        .into_response()
    };

    if form.password != form.password_confirm {
        return render_error(page, form.username, "Passwords do not match.".to_string());
    }

    let auth = AuthService::new(state.pool());
    match auth
        .register(&form.username, &form.password, Role::Customer)
        .await
    {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "Registration complete");
            set_flash(
                &session,
                Flash::success("Registration successful! Please login."),
            )
            .await;
            Redirect::to("/auth/login").into_response()
        }
        Err(AuthError::UserAlreadyExists) => render_error(
            page,
            form.username,
            "Username already exists. Please choose a different username.".to_string(),
        ),
        Err(e @ (AuthError::PasswordTooShort { .. } | AuthError::InvalidUsername(_))) => {
            render_error(page, form.username, e.to_string())
        }
        Err(e) => {
            tracing::error!(error = %e, "Registration failed");
            render_error(
                page,
                form.username,
                "An error occurred during registration. Please try again.".to_string(),
            )
        }
    }
}

// =============================================================================
// Logout / Access Denied
// =============================================================================

/// Handle logout.
pub async fn logout(session: Session) -> Response {
    if let Err(e) = clear_current_user(&session).await {
        tracing::error!("Failed to clear session: {}", e);
    }
    clear_sentry_user();

    // The flushed session is gone; the flash rides on a fresh one.
    set_flash(
        &session,
        Flash::success("You have been logged out successfully."),
    )
    .await;
    Redirect::to("/").into_response()
}

/// Shown when a signed-in user opens an admin page.
pub async fn access_denied(page: PageContext) -> impl IntoResponse {
    AccessDeniedTemplate { page }
}
