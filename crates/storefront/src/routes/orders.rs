//! Order route handlers.
//!
//! Customers see and place their own orders; admins see everything and
//! can enter, edit and delete orders by hand.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use cloudmart_core::{OrderStatus, Price};

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{ACCESS_DENIED_PATH, PageContext, RequireAdmin, RequireAuth};
use crate::models::{CurrentUser, Customer, Flash, Order, Product};
use crate::services::orders::{ProductPrice, parse_order_date};
use crate::services::{
    CartService, CustomerError, CustomerService, NewOrder, OrderEdit, OrderError, OrderService,
    ProductService,
};
use crate::state::AppState;

use super::{failure_message, flash_redirect};

// =============================================================================
// Form Types
// =============================================================================

/// Admin order entry. Numbers arrive as text so a blank field re-renders
/// the form instead of failing extraction.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OrderForm {
    pub customer_id: String,
    pub product_id: String,
    pub quantity: String,
    pub order_date: String,
    pub status: String,
}

/// Admin edit of an existing order.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OrderEditForm {
    pub order_date: String,
    pub quantity: String,
    pub unit_price: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPriceQuery {
    #[serde(default)]
    pub product_id: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Order list template, shared by the index, "my orders" and manage pages.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersIndexTemplate {
    pub page: PageContext,
    pub title: &'static str,
    pub orders: Vec<Order>,
    /// Show the admin edit and delete links.
    pub manage: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub page: PageContext,
    pub order: Order,
}

#[derive(Template, WebTemplate)]
#[template(path = "orders/new.html")]
pub struct OrderNewTemplate {
    pub page: PageContext,
    pub customers: Vec<Customer>,
    pub products: Vec<Product>,
    pub form: OrderForm,
    pub statuses: &'static [OrderStatus],
    pub error: Option<String>,
}

#[derive(Template, WebTemplate)]
#[template(path = "orders/edit.html")]
pub struct OrderEditTemplate {
    pub page: PageContext,
    pub order: Order,
    pub statuses: &'static [OrderStatus],
    pub error: Option<String>,
}

#[derive(Template, WebTemplate)]
#[template(path = "orders/delete.html")]
pub struct OrderDeleteTemplate {
    pub page: PageContext,
    pub order: Order,
}

fn parse_status(raw: &str) -> OrderStatus {
    match raw.parse::<OrderStatus>() {
        Ok(OrderStatus::Unknown) | Err(_) => OrderStatus::Submitted,
        Ok(status) => status,
    }
}

async fn load_order(state: &AppState, id: &str) -> Result<Order> {
    OrderService::new(state.storage())
        .get_order(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

async fn new_order_page(
    state: &AppState,
    page: PageContext,
    form: OrderForm,
    error: Option<String>,
) -> Result<Response> {
    let customers = CustomerService::new(state.pool(), state.storage())
        .list()
        .await?;
    let products = ProductService::new(state.storage()).list().await?;
    Ok(OrderNewTemplate {
        page,
        customers,
        products,
        form,
        statuses: &OrderStatus::EDITABLE,
        error,
    }
    .into_response())
}

// =============================================================================
// Listing Routes
// =============================================================================

/// All orders for admins, the user's own otherwise.
#[instrument(skip(state, page, user), fields(username = %user.username))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    page: PageContext,
) -> Result<impl IntoResponse> {
    let orders = OrderService::new(state.storage())
        .visible_orders(&user)
        .await?;
    Ok(OrdersIndexTemplate {
        page,
        title: if user.is_admin() { "All Orders" } else { "Orders" },
        manage: user.is_admin(),
        orders,
    })
}

#[instrument(skip(state, page, user), fields(username = %user.username))]
pub async fn mine(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    page: PageContext,
) -> Result<impl IntoResponse> {
    let orders = OrderService::new(state.storage())
        .orders_for_user(&user.username)
        .await?;
    Ok(OrdersIndexTemplate {
        page,
        title: "My Orders",
        manage: false,
        orders,
    })
}

#[instrument(skip(state, page, _admin))]
pub async fn manage(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    page: PageContext,
) -> Result<impl IntoResponse> {
    let orders = OrderService::new(state.storage()).all_orders().await?;
    Ok(OrdersIndexTemplate {
        page,
        title: "Manage Orders",
        manage: true,
        orders,
    })
}

/// Order details. Customers may only open their own orders.
#[instrument(skip(state, page, user), fields(username = %user.username))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
    page: PageContext,
) -> Result<Response> {
    let order = load_order(&state, &id).await?;
    if !user.is_admin() && !order.is_owned_by(&user.username) {
        tracing::warn!(order_id = %id, "Order details requested by non-owner");
        return Ok(Redirect::to(ACCESS_DENIED_PATH).into_response());
    }
    Ok(OrderShowTemplate { page, order }.into_response())
}

/// Price, stock and name of a product, for the order form script.
pub async fn product_price(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Query(query): Query<ProductPriceQuery>,
) -> Json<ProductPrice> {
    Json(
        OrderService::new(state.storage())
            .product_price(&query.product_id)
            .await,
    )
}

// =============================================================================
// Admin Entry Routes
// =============================================================================

pub async fn new(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    page: PageContext,
) -> Result<Response> {
    new_order_page(&state, page, OrderForm::default(), None).await
}

#[instrument(skip(state, session, page, form, _admin), fields(customer_id = %form.customer_id, product_id = %form.product_id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    session: Session,
    page: PageContext,
    Form(form): Form<OrderForm>,
) -> Result<Response> {
    let Some(quantity) = form.quantity.trim().parse::<i32>().ok().filter(|q| *q >= 1) else {
        let error = OrderError::InvalidQuantity.to_string();
        return new_order_page(&state, page, form, Some(error)).await;
    };

    // The picker also lists registered users that have no profile row yet.
    match CustomerService::new(state.pool(), state.storage())
        .find_or_provision(&form.customer_id)
        .await
    {
        Ok(_) | Err(CustomerError::NotFound) => {}
        Err(e) => return Err(e.into()),
    }

    let input = NewOrder {
        customer_id: form.customer_id.clone(),
        product_id: form.product_id.clone(),
        quantity,
        order_date: parse_order_date(&form.order_date),
        status: parse_status(&form.status),
    };
    match OrderService::new(state.storage()).create_order(input).await {
        Ok(_) => Ok(flash_redirect(
            &session,
            Flash::success("Order created successfully!"),
            "/orders",
        )
        .await),
        Err(
            e @ (OrderError::InvalidSelection
            | OrderError::InvalidQuantity
            | OrderError::InsufficientStock { .. }
            | OrderError::TotalTooLarge),
        ) => new_order_page(&state, page, form, Some(e.to_string())).await,
        Err(e) => Err(e.into()),
    }
}

#[instrument(skip(state, page, _admin))]
pub async fn edit(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
    page: PageContext,
) -> Result<impl IntoResponse> {
    let order = load_order(&state, &id).await?;
    Ok(OrderEditTemplate {
        page,
        order,
        statuses: &OrderStatus::EDITABLE,
        error: None,
    })
}

#[instrument(skip(state, session, page, form, _admin))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
    session: Session,
    page: PageContext,
    Form(form): Form<OrderEditForm>,
) -> Result<Response> {
    let render_error = |order: Order, page: PageContext, error: String| {
        OrderEditTemplate {
            page,
            order,
            statuses: &OrderStatus::EDITABLE,
            error: Some(error),
        }
        .into_response()
    };

    let original = load_order(&state, &id).await?;
    let Some(quantity) = form.quantity.trim().parse::<i32>().ok().filter(|q| *q >= 1) else {
        return Ok(render_error(
            original,
            page,
            OrderError::InvalidQuantity.to_string(),
        ));
    };
    let unit_price = match Price::parse_input(&form.unit_price) {
        Ok(price) => price,
        Err(e) => return Ok(render_error(original, page, e.to_string())),
    };

    let edit = OrderEdit {
        order_date: parse_order_date(&form.order_date),
        quantity,
        unit_price,
        status: parse_status(&form.status),
    };
    match OrderService::new(state.storage()).update_order(&id, edit).await {
        Ok(_) => Ok(flash_redirect(
            &session,
            Flash::success("Order updated successfully!"),
            "/orders",
        )
        .await),
        Err(OrderError::Conflict) => Ok(render_error(
            original,
            page,
            "The order was modified by another user. Please reload and try again.".to_string(),
        )),
        Err(e @ OrderError::TotalTooLarge) => Ok(render_error(original, page, e.to_string())),
        Err(OrderError::NotFound) => Err(AppError::NotFound(format!("order {id}"))),
        Err(e) => Err(e.into()),
    }
}

#[instrument(skip(state, page, _admin))]
pub async fn delete_confirm(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
    page: PageContext,
) -> Result<impl IntoResponse> {
    let order = load_order(&state, &id).await?;
    Ok(OrderDeleteTemplate { page, order })
}

#[instrument(skip(state, session, _admin))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
    session: Session,
) -> Response {
    let flash = match OrderService::new(state.storage()).delete_order(&id).await {
        Ok(()) => Flash::success("Order deleted successfully!"),
        Err(e) => {
            tracing::warn!(order_id = %id, error = %e, "Order delete failed");
            Flash::error(failure_message("Error deleting order", e))
        }
    };
    flash_redirect(&session, flash, "/orders").await
}

// =============================================================================
// Checkout
// =============================================================================

/// Turn the cart into orders.
#[instrument(skip(state, session, user), fields(username = %user.username))]
pub async fn from_cart(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
) -> Response {
    place_cart_orders(&state, &session, &user).await
}

/// Place one order per cart line, clear the cart and go to the
/// confirmation page. Failures go back to the cart with a flash.
pub(crate) async fn place_cart_orders(
    state: &AppState,
    session: &Session,
    user: &CurrentUser,
) -> Response {
    let cart = CartService::new(state.pool(), state.storage());
    let lines = match cart.get_cart_items(&user.username).await {
        Ok(lines) => lines,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load cart for checkout");
            let flash = Flash::error(failure_message("Error creating order", e));
            return flash_redirect(session, flash, "/cart").await;
        }
    };
    if lines.is_empty() {
        return flash_redirect(session, Flash::error("Your cart is empty"), "/cart").await;
    }

    let created = match OrderService::new(state.storage())
        .place_cart_order(&user.username, &lines)
        .await
    {
        Ok(created) => created,
        Err(e @ (OrderError::InsufficientStock { .. } | OrderError::TotalTooLarge)) => {
            return flash_redirect(session, Flash::error(e.to_string()), "/cart").await;
        }
        Err(e) => {
            tracing::error!(error = %e, "Checkout failed");
            let flash = Flash::error(failure_message("Error creating order", e));
            return flash_redirect(session, flash, "/cart").await;
        }
    };

    if let Err(e) = cart.clear_cart(&user.username).await {
        tracing::error!(error = %e, "Orders placed but cart could not be cleared");
    }
    let message = format!("Successfully created {} order(s)!", created.len());
    flash_redirect(session, Flash::success(message), "/cart/confirmation").await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_defaults_to_submitted() {
        assert_eq!(parse_status("PROCESSED"), OrderStatus::Processed);
        assert_eq!(parse_status("Cancelled"), OrderStatus::Cancelled);
        assert_eq!(parse_status(""), OrderStatus::Submitted);
        assert_eq!(parse_status("Shipped"), OrderStatus::Submitted);
    }
}
