//! Cart route handlers.
//!
//! `POST /cart/add` is called from `cart.js` and answers with JSON; the
//! other actions are plain form posts that redirect back with a flash.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use cloudmart_core::{CartItemId, Price};

use crate::error::Result;
use crate::filters;
use crate::middleware::{OptionalAuth, PageContext, RequireAuth};
use crate::models::{CartLine, Flash};
use crate::services::CartService;
use crate::services::cart::cart_total;
use crate::state::AppState;

use super::flash_redirect;
use super::orders::place_cart_orders;

// =============================================================================
// Form Types
// =============================================================================

const fn default_quantity() -> i32 {
    1
}

/// Add-to-cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

/// Update quantity form data.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityForm {
    pub cart_id: CartItemId,
    pub quantity: i32,
}

/// Remove item form data.
#[derive(Debug, Deserialize)]
pub struct RemoveItemForm {
    pub cart_id: CartItemId,
}

/// JSON answer to an add-to-cart call.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_count: Option<i64>,
}

impl AddToCartResponse {
    fn failure(message: &str) -> Json<Self> {
        Json(Self {
            success: false,
            message: message.to_owned(),
            item_count: None,
        })
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/index.html")]
pub struct CartTemplate {
    pub page: PageContext,
    pub lines: Vec<CartLine>,
    pub total: Price,
}

/// Checkout review template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/checkout.html")]
pub struct CheckoutTemplate {
    pub page: PageContext,
    pub lines: Vec<CartLine>,
    pub total: Price,
}

/// Shown after the cart has been turned into orders.
#[derive(Template, WebTemplate)]
#[template(path = "cart/confirmation.html")]
pub struct ConfirmationTemplate {
    pub page: PageContext,
}

// =============================================================================
// Cart Routes
// =============================================================================

/// Display the cart page.
#[instrument(skip(state, page, user), fields(username = %user.username))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    page: PageContext,
) -> Result<impl IntoResponse> {
    let lines = CartService::new(state.pool(), state.storage())
        .get_cart_items(&user.username)
        .await?;
    let total = cart_total(&lines);
    Ok(CartTemplate { page, lines, total })
}

/// Add item to cart.
#[instrument(skip(state, user, form), fields(product_id = %form.product_id, quantity = form.quantity))]
pub async fn add(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Form(form): Form<AddToCartForm>,
) -> Json<AddToCartResponse> {
    let Some(user) = user else {
        return AddToCartResponse::failure("Please login to add items to cart");
    };

    let cart = CartService::new(state.pool(), state.storage());
    if let Err(e) = cart
        .add_to_cart(&user.username, &form.product_id, form.quantity)
        .await
    {
        tracing::warn!("Failed to add to cart: {}", e);
        return AddToCartResponse::failure("Failed to add item to cart");
    }

    match cart.get_cart_item_count(&user.username).await {
        Ok(count) => Json(AddToCartResponse {
            success: true,
            message: "Item added to cart".to_string(),
            item_count: Some(count),
        }),
        Err(e) => {
            tracing::error!("Failed to count cart items: {}", e);
            AddToCartResponse::failure("An error occurred")
        }
    }
}

/// Update item quantity. Zero or less removes the item.
#[instrument(skip(state, session, user), fields(username = %user.username))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    Form(form): Form<UpdateQuantityForm>,
) -> Response {
    let flash = match CartService::new(state.pool(), state.storage())
        .update_quantity(form.cart_id, &user.username, form.quantity)
        .await
    {
        Ok(true) => Flash::success("Cart updated successfully"),
        Ok(false) => Flash::error("Failed to update cart"),
        Err(e) => {
            tracing::error!(error = %e, "Error updating cart quantity");
            Flash::error("An error occurred while updating cart")
        }
    };
    flash_redirect(&session, flash, "/cart").await
}

/// Remove item from cart.
#[instrument(skip(state, session, user), fields(username = %user.username))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    Form(form): Form<RemoveItemForm>,
) -> Response {
    let flash = match CartService::new(state.pool(), state.storage())
        .remove_from_cart(form.cart_id, &user.username)
        .await
    {
        Ok(true) => Flash::success("Item removed from cart"),
        Ok(false) => Flash::error("Failed to remove item from cart"),
        Err(e) => {
            tracing::error!(error = %e, "Error removing item from cart");
            Flash::error("An error occurred while removing item")
        }
    };
    flash_redirect(&session, flash, "/cart").await
}

/// Empty the cart.
#[instrument(skip(state, session, user), fields(username = %user.username))]
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
) -> Response {
    let flash = match CartService::new(state.pool(), state.storage())
        .clear_cart(&user.username)
        .await
    {
        Ok(()) => Flash::success("Cart cleared successfully"),
        Err(e) => {
            tracing::error!(error = %e, "Error clearing cart");
            Flash::error("An error occurred while clearing cart")
        }
    };
    flash_redirect(&session, flash, "/cart").await
}

// =============================================================================
// Checkout Routes
// =============================================================================

/// Review the cart before placing orders.
#[instrument(skip(state, session, page, user), fields(username = %user.username))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    page: PageContext,
) -> Result<Response> {
    let lines = CartService::new(state.pool(), state.storage())
        .get_cart_items(&user.username)
        .await?;
    if lines.is_empty() {
        return Ok(flash_redirect(&session, Flash::error("Your cart is empty"), "/cart").await);
    }
    let total = cart_total(&lines);
    Ok(CheckoutTemplate { page, lines, total }.into_response())
}

/// Place the orders.
#[instrument(skip(state, session, user), fields(username = %user.username))]
pub async fn checkout_confirmed(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
) -> Response {
    place_cart_orders(&state, &session, &user).await
}

pub async fn confirmation(RequireAuth(_user): RequireAuth, page: PageContext) -> impl IntoResponse {
    ConfirmationTemplate { page }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::Request;

    use super::*;

    #[test]
    fn test_add_response_shape() {
        let ok = AddToCartResponse {
            success: true,
            message: "Item added to cart".to_string(),
            item_count: Some(3),
        };
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({"success": true, "message": "Item added to cart", "itemCount": 3})
        );

        let Json(failed) = AddToCartResponse::failure("Please login to add items to cart");
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["success"], false);
        assert!(value.get("itemCount").is_none());
    }

    #[tokio::test]
    async fn test_add_form_defaults_quantity() {
        let request = Request::builder()
            .method("POST")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("product_id=p1"))
            .unwrap();
        let Form(form) = Form::<AddToCartForm>::from_request(request, &())
            .await
            .unwrap();
        assert_eq!(form.product_id, "p1");
        assert_eq!(form.quantity, 1);
    }
}
