//! Customer profile administration. Every route here is admin-only.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{PageContext, RequireAdmin};
use crate::models::{Customer, Flash};
use crate::services::{CustomerError, CustomerInput, CustomerService};
use crate::state::AppState;

use super::{failure_message, flash_redirect};

// =============================================================================
// Templates
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "customers/index.html")]
pub struct CustomersIndexTemplate {
    pub page: PageContext,
    pub customers: Vec<Customer>,
}

#[derive(Template, WebTemplate)]
#[template(path = "customers/show.html")]
pub struct CustomerShowTemplate {
    pub page: PageContext,
    pub customer: Customer,
}

/// Create and edit form template.
#[derive(Template, WebTemplate)]
#[template(path = "customers/form.html")]
pub struct CustomerFormTemplate {
    pub page: PageContext,
    /// `None` when creating.
    pub customer_id: Option<String>,
    pub input: CustomerInput,
    pub error: Option<String>,
}

#[derive(Template, WebTemplate)]
#[template(path = "customers/delete.html")]
pub struct CustomerDeleteTemplate {
    pub page: PageContext,
    pub customer: Customer,
}

/// Validation failures are shown on the form; everything else is an error page.
fn form_error(e: CustomerError) -> std::result::Result<String, AppError> {
    match e {
        CustomerError::InvalidUsername(_)
        | CustomerError::InvalidEmail(_)
        | CustomerError::AlreadyExists => Ok(e.to_string()),
        CustomerError::NotFound => Err(AppError::NotFound("customer".to_string())),
        other => Err(other.into()),
    }
}

async fn load(state: &AppState, id: &str) -> Result<Customer> {
    CustomerService::new(state.pool(), state.storage())
        .find_or_provision(id)
        .await
        .map_err(|e| match e {
            CustomerError::NotFound => AppError::NotFound(format!("customer {id}")),
            other => other.into(),
        })
}

// =============================================================================
// Handlers
// =============================================================================

#[instrument(skip(state, page, _admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    page: PageContext,
) -> Result<impl IntoResponse> {
    let mut customers = CustomerService::new(state.pool(), state.storage())
        .list()
        .await?;
    customers.sort_by(|a, b| a.username.cmp(&b.username));
    Ok(CustomersIndexTemplate { page, customers })
}

#[instrument(skip(state, page, _admin))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
    page: PageContext,
) -> Result<impl IntoResponse> {
    let customer = load(&state, &id).await?;
    Ok(CustomerShowTemplate { page, customer })
}

pub async fn new(RequireAdmin(_admin): RequireAdmin, page: PageContext) -> impl IntoResponse {
    CustomerFormTemplate {
        page,
        customer_id: None,
        input: CustomerInput::default(),
        error: None,
    }
}

#[instrument(skip(state, session, page, input, _admin), fields(username = %input.username))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    session: Session,
    page: PageContext,
    Form(input): Form<CustomerInput>,
) -> Result<Response> {
    match CustomerService::new(state.pool(), state.storage())
        .create(&input)
        .await
    {
        Ok(_) => Ok(flash_redirect(
            &session,
            Flash::success("Customer created successfully!"),
            "/customers",
        )
        .await),
        Err(e) => Ok(CustomerFormTemplate {
            page,
            customer_id: None,
            input,
            error: Some(form_error(e)?),
        }
        .into_response()),
    }
}

#[instrument(skip(state, page, _admin))]
pub async fn edit(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
    page: PageContext,
) -> Result<impl IntoResponse> {
    let customer = load(&state, &id).await?;
    Ok(CustomerFormTemplate {
        page,
        input: CustomerInput::from(&customer),
        customer_id: Some(customer.row_key),
        error: None,
    })
}

#[instrument(skip(state, session, page, input, _admin))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
    session: Session,
    page: PageContext,
    Form(input): Form<CustomerInput>,
) -> Result<Response> {
    match CustomerService::new(state.pool(), state.storage())
        .update(&id, &input)
        .await
    {
        Ok(_) => Ok(flash_redirect(
            &session,
            Flash::success("Customer updated successfully!"),
            "/customers",
        )
        .await),
        Err(e) => Ok(CustomerFormTemplate {
            page,
            customer_id: Some(id),
            input,
            error: Some(form_error(e)?),
        }
        .into_response()),
    }
}

#[instrument(skip(state, page, _admin))]
pub async fn delete_confirm(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
    page: PageContext,
) -> Result<impl IntoResponse> {
    let customer = load(&state, &id).await?;
    Ok(CustomerDeleteTemplate { page, customer })
}

#[instrument(skip(state, session, _admin))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
    session: Session,
) -> Response {
    let flash = match CustomerService::new(state.pool(), state.storage())
        .delete(&id)
        .await
    {
        Ok(()) => Flash::success("Customer deleted successfully!"),
        Err(e) => {
            tracing::warn!(customer_id = %id, error = %e, "Customer delete failed");
            Flash::error(failure_message("Error deleting customer", e))
        }
    };
    flash_redirect(&session, flash, "/customers").await
}
