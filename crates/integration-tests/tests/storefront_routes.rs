//! Requests through the fully assembled router.
//!
//! Only paths that never reach Postgres are exercised: the pool in
//! [`cloudmart_integration_tests::test_state`] is never connected.

#![allow(clippy::unwrap_used)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, StatusCode, header},
};
use tower::ServiceExt;

use cloudmart_integration_tests::{test_app, test_state};
use cloudmart_storefront::services::{ProductInput, ProductService};
use cloudmart_storefront::state::AppState;

async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

async fn seed_product(state: &AppState, name: &str) -> String {
    ProductService::new(state.storage())
        .create(
            &ProductInput {
                product_name: name.to_string(),
                description: "Seeded".to_string(),
                price: "19.99".to_string(),
                stock_available: 5,
            },
            None,
        )
        .await
        .unwrap()
        .row_key
}

// ============================================================================
// Health and middleware
// ============================================================================

#[tokio::test]
async fn test_health_carries_request_id_and_security_headers() {
    let app = test_app(test_state());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers.get("x-request-id").unwrap(), "req-123");
    assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "DENY");
    assert_eq!(headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
    assert_eq!(body_text(response).await, "ok");
}

// ============================================================================
// Access control
// ============================================================================

#[tokio::test]
async fn test_anonymous_visitors_are_sent_to_login() {
    let state = test_state();
    for uri in [
        "/cart",
        "/cart/checkout",
        "/orders",
        "/orders/mine",
        "/upload",
        "/dashboard/customer",
        "/dashboard/admin",
        "/customers",
        "/products/new",
        "/orders/manage",
    ] {
        let response = get(test_app(state.clone()), uri).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&response), "/auth/login", "{uri}");
    }
}

#[tokio::test]
async fn test_json_callers_get_unauthorized() {
    let app = test_app(test_state());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/orders/product-price?productId=abc")
                .header(header::ACCEPT, "application/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_anonymous_add_to_cart_is_refused_as_json() {
    let app = test_app(test_state());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/cart/add")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("product_id=abc&quantity=1"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Please login to add items to cart");
}

// ============================================================================
// Public pages
// ============================================================================

#[tokio::test]
async fn test_login_and_register_pages_render() {
    let state = test_state();
    let login = get(test_app(state.clone()), "/auth/login").await;
    assert_eq!(login.status(), StatusCode::OK);
    assert!(body_text(login).await.contains("<h1>Login</h1>"));

    let register = get(test_app(state), "/auth/register").await;
    assert_eq!(register.status(), StatusCode::OK);
    assert!(body_text(register).await.contains("password_confirm"));
}

#[tokio::test]
async fn test_catalog_pages_list_seeded_products() {
    let state = test_state();
    let id = seed_product(&state, "Ceramic Mug").await;

    let home = get(test_app(state.clone()), "/").await;
    assert_eq!(home.status(), StatusCode::OK);
    let html = body_text(home).await;
    assert!(html.contains("Welcome to CloudMart"));
    assert!(html.contains("Ceramic Mug"));

    let index = get(test_app(state.clone()), "/products").await;
    assert_eq!(index.status(), StatusCode::OK);
    assert!(body_text(index).await.contains("Ceramic Mug"));

    let detail = get(test_app(state), &format!("/products/{id}")).await;
    assert_eq!(detail.status(), StatusCode::OK);
    assert!(body_text(detail).await.contains("$19.99"));
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let response = get(test_app(test_state()), "/products/does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Registration
// ============================================================================

fn register_request(client_ip: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("x-forwarded-for", client_ip)
        .body(Body::from(
            "username=newshopper&password=longenough1&password_confirm=different1",
        ))
        .unwrap()
}

#[tokio::test]
async fn test_register_password_mismatch_rerenders_form() {
    let response = test_app(test_state())
        .oneshot(register_request("203.0.113.10"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Passwords do not match."));
    assert!(html.contains("newshopper"));
}

#[tokio::test]
async fn test_auth_posts_are_rate_limited_per_client() {
    // One router, so the limiter's state is shared across requests.
    let app = test_app(test_state());
    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(register_request("198.51.100.20"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let limited = app
        .clone()
        .oneshot(register_request("198.51.100.20"))
        .await
        .unwrap();
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);

    // Another client still gets through.
    let other = app.oneshot(register_request("198.51.100.21")).await.unwrap();
    assert_eq!(other.status(), StatusCode::OK);
}
