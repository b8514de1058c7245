//! Home page, dashboards, static pages and storage provisioning.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::middleware::{PageContext, RequireAdmin, RequireAuth};
use crate::models::Flash;
use crate::services::CartService;
use crate::services::orders::{AdminDashboard, CustomerDashboard, OrderService, StoreSummary};
use crate::state::AppState;

use super::{failure_message, flash_redirect};

/// Products featured on the public home page.
const FEATURED_PRODUCTS: usize = 5;

// =============================================================================
// Templates
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "home/index.html")]
pub struct HomeTemplate {
    pub page: PageContext,
    pub summary: StoreSummary,
}

#[derive(Template, WebTemplate)]
#[template(path = "home/admin_dashboard.html")]
pub struct AdminDashboardTemplate {
    pub page: PageContext,
    pub stats: AdminDashboard,
}

#[derive(Template, WebTemplate)]
#[template(path = "home/customer_dashboard.html")]
pub struct CustomerDashboardTemplate {
    pub page: PageContext,
    pub stats: CustomerDashboard,
}

#[derive(Template, WebTemplate)]
#[template(path = "home/privacy.html")]
pub struct PrivacyTemplate {
    pub page: PageContext,
}

#[derive(Template, WebTemplate)]
#[template(path = "home/contact.html")]
pub struct ContactTemplate {
    pub page: PageContext,
}

// =============================================================================
// Handlers
// =============================================================================

/// Public home page. Signed-in users go to their dashboard.
#[instrument(skip(state, page))]
pub async fn index(State(state): State<AppState>, page: PageContext) -> Result<Response> {
    if let Some(user) = &page.user {
        let target = if user.is_admin() {
            "/dashboard/admin"
        } else {
            "/dashboard/customer"
        };
        return Ok(Redirect::to(target).into_response());
    }

    let summary = OrderService::new(state.storage())
        .store_summary(FEATURED_PRODUCTS)
        .await?;
    Ok(HomeTemplate { page, summary }.into_response())
}

#[instrument(skip(state, page, _admin))]
pub async fn admin_dashboard(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    page: PageContext,
) -> Result<impl IntoResponse> {
    let stats = OrderService::new(state.storage()).admin_dashboard().await?;
    Ok(AdminDashboardTemplate { page, stats })
}

#[instrument(skip(state, page, user), fields(username = %user.username))]
pub async fn customer_dashboard(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    page: PageContext,
) -> Result<impl IntoResponse> {
    let cart_item_count = CartService::new(state.pool(), state.storage())
        .get_cart_item_count(&user.username)
        .await?;
    let stats = OrderService::new(state.storage())
        .customer_dashboard(&user.username, cart_item_count)
        .await?;
    Ok(CustomerDashboardTemplate { page, stats })
}

pub async fn privacy(page: PageContext) -> impl IntoResponse {
    PrivacyTemplate { page }
}

pub async fn contact(page: PageContext) -> impl IntoResponse {
    ContactTemplate { page }
}

/// Provision storage resources now instead of on first use.
#[instrument(skip(state, session, _admin))]
pub async fn initialize_storage(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    session: Session,
) -> Response {
    let flash = match state.storage().initialize().await {
        Ok(()) => Flash::success("Azure Storage initialized successfully!"),
        Err(e) => {
            tracing::error!(error = %e, "Storage initialization failed");
            Flash::error(failure_message("Failed to initialize storage", e))
        }
    };
    flash_redirect(&session, flash, "/").await
}

