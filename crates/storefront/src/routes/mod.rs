//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page (signed-in users go to their dashboard)
//! GET  /dashboard/admin        - Admin dashboard
//! GET  /dashboard/customer     - Customer dashboard
//! GET  /privacy, /contact      - Static pages
//! POST /storage/initialize     - Provision storage (admin)
//!
//! # Auth
//! GET  /auth/login             - Login page
//! POST /auth/login             - Login action (rate limited)
//! GET  /auth/register          - Register page
//! POST /auth/register          - Register action (rate limited)
//! POST /auth/logout            - Logout action
//! GET  /auth/access-denied     - Shown to non-admins on admin pages
//!
//! # Products (writes are admin-only)
//! GET  /products               - Product listing
//! GET  /products/new           - Create form
//! POST /products               - Create (multipart)
//! GET  /products/{id}          - Product detail
//! GET  /products/{id}/edit     - Edit form
//! POST /products/{id}/edit     - Update (multipart)
//! GET  /products/{id}/delete   - Delete confirmation
//! POST /products/{id}/delete   - Delete
//!
//! # Customers (admin)
//! GET  /customers              - Customer listing
//! GET  /customers/new, POST /customers
//! GET  /customers/{id}
//! GET  /customers/{id}/edit, POST /customers/{id}/edit
//! GET  /customers/{id}/delete, POST /customers/{id}/delete
//!
//! # Orders
//! GET  /orders                 - All orders (admin) or the user's own
//! GET  /orders/mine            - The user's own orders
//! GET  /orders/manage          - All orders with admin actions
//! GET  /orders/product-price   - Product price/stock JSON (?productId=)
//! POST /orders/from-cart       - Turn the cart into orders
//! GET  /orders/new, POST /orders (admin)
//! GET  /orders/{id}
//! GET  /orders/{id}/edit, POST /orders/{id}/edit (admin)
//! GET  /orders/{id}/delete, POST /orders/{id}/delete (admin)
//!
//! # Cart
//! GET  /cart                   - Cart page
//! POST /cart/add               - Add to cart (JSON)
//! POST /cart/update            - Update quantity
//! POST /cart/remove            - Remove item
//! POST /cart/clear             - Empty the cart
//! GET  /cart/checkout          - Review before placing orders
//! POST /cart/checkout          - Place orders
//! GET  /cart/confirmation      - Orders placed
//!
//! # Uploads
//! GET  /upload                 - Proof-of-payment form
//! POST /upload                 - Store a proof (multipart)
//! GET  /upload/contracts/{file} - Download a stored proof (admin)
//! ```

pub mod auth;
pub mod cart;
pub mod customers;
pub mod home;
pub mod multipart;
pub mod orders;
pub mod products;
pub mod upload;

use axum::{
    Router,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use tower_sessions::Session;

use crate::error::AppError;
use crate::middleware::{auth_rate_limiter, set_flash};
use crate::models::Flash;
use crate::state::AppState;

/// Queue `flash` and redirect to `to`.
pub(crate) async fn flash_redirect(session: &Session, flash: Flash, to: &str) -> Response {
    set_flash(session, flash).await;
    Redirect::to(to).into_response()
}

/// Flash text for a failed action. Server-side details stay in the log.
pub(crate) fn failure_message(action: &str, err: impl Into<AppError>) -> String {
    format!("{action}: {}", err.into().user_message())
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    let limiter = auth_rate_limiter();
    Router::new()
        .route(
            "/login",
            get(auth::login_page).merge(post(auth::login).layer(limiter.clone())),
        )
        .route(
            "/register",
            get(auth::register_page).merge(post(auth::register).layer(limiter)),
        )
        .route("/logout", post(auth::logout))
        .route("/access-denied", get(auth::access_denied))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route("/new", get(products::new))
        .route("/{id}", get(products::show))
        .route("/{id}/edit", get(products::edit).post(products::update))
        .route(
            "/{id}/delete",
            get(products::delete_confirm).post(products::delete),
        )
}

/// Create the customer routes router.
pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(customers::index).post(customers::create))
        .route("/new", get(customers::new))
        .route("/{id}", get(customers::show))
        .route("/{id}/edit", get(customers::edit).post(customers::update))
        .route(
            "/{id}/delete",
            get(customers::delete_confirm).post(customers::delete),
        )
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/new", get(orders::new))
        .route("/mine", get(orders::mine))
        .route("/manage", get(orders::manage))
        .route("/product-price", get(orders::product_price))
        .route("/from-cart", post(orders::from_cart))
        .route("/{id}", get(orders::show))
        .route("/{id}/edit", get(orders::edit).post(orders::update))
        .route(
            "/{id}/delete",
            get(orders::delete_confirm).post(orders::delete),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route(
            "/checkout",
            get(cart::checkout).post(cart::checkout_confirmed),
        )
        .route("/confirmation", get(cart::confirmation))
}

/// Create the upload routes router.
pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(upload::index).post(upload::upload))
        .route("/contracts/{file}", get(upload::download_contract))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Home and dashboards
        .route("/", get(home::index))
        .route("/dashboard/admin", get(home::admin_dashboard))
        .route("/dashboard/customer", get(home::customer_dashboard))
        .route("/privacy", get(home::privacy))
        .route("/contact", get(home::contact))
        .route("/storage/initialize", post(home::initialize_storage))
        // Feature routes
        .nest("/auth", auth_routes())
        .nest("/products", product_routes())
        .nest("/customers", customer_routes())
        .nest("/orders", order_routes())
        .nest("/cart", cart_routes())
        .nest("/upload", upload_routes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{OrderError, ProductError};
    use crate::storage::StorageError;

    #[test]
    fn test_failure_message_hides_storage_details() {
        let err = OrderError::Storage(StorageError::Service {
            status: 403,
            code: "AuthenticationFailed".to_string(),
            message: "signature mismatch for account devstoreaccount1".to_string(),
        });
        assert_eq!(
            failure_message("Error deleting order", err),
            "Error deleting order: Storage service error"
        );
        assert_eq!(
            failure_message(
                "Failed to initialize storage",
                StorageError::Signing("bad key".to_string())
            ),
            "Failed to initialize storage: Storage service error"
        );
    }

    #[test]
    fn test_failure_message_keeps_user_errors() {
        assert_eq!(
            failure_message("Error deleting product", ProductError::NotFound),
            format!("Error deleting product: {}", ProductError::NotFound)
        );
        assert_eq!(
            failure_message("Error creating order", OrderError::TotalTooLarge),
            "Error creating order: Order total is too large."
        );
    }
}
