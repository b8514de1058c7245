//! Product route handlers.
//!
//! Listing and details are public. Create, edit and delete are admin-only
//! and take `multipart/form-data` so an image can ride along.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Multipart, Path, State},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{PageContext, RequireAdmin};
use crate::models::{Flash, Product};
use crate::services::{ProductError, ProductInput, ProductService};
use crate::state::AppState;

use super::{failure_message, flash_redirect};
use super::multipart::MultipartForm;

// =============================================================================
// Templates
// =============================================================================

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub page: PageContext,
    pub products: Vec<Product>,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub page: PageContext,
    pub product: Product,
}

/// Create and edit form template.
#[derive(Template, WebTemplate)]
#[template(path = "products/form.html")]
pub struct ProductFormTemplate {
    pub page: PageContext,
    /// `None` when creating.
    pub product_id: Option<String>,
    pub image_url: String,
    pub input: ProductInput,
    pub error: Option<String>,
}

/// Delete confirmation template.
#[derive(Template, WebTemplate)]
#[template(path = "products/delete.html")]
pub struct ProductDeleteTemplate {
    pub page: PageContext,
    pub product: Product,
}

fn input_from(form: &MultipartForm) -> ProductInput {
    ProductInput {
        product_name: form.text("product_name").to_owned(),
        description: form.text("description").to_owned(),
        price: form.text("price").to_owned(),
        stock_available: form.int("stock_available").unwrap_or_default(),
    }
}

fn not_found(id: &str) -> impl FnOnce(ProductError) -> AppError + '_ {
    move |e| match e {
        ProductError::NotFound => AppError::NotFound(format!("product {id}")),
        other => other.into(),
    }
}

// =============================================================================
// Public Routes
// =============================================================================

/// Display all products.
#[instrument(skip(state, page))]
pub async fn index(State(state): State<AppState>, page: PageContext) -> Result<impl IntoResponse> {
    let mut products = ProductService::new(state.storage()).list().await?;
    products.sort_by(|a, b| a.product_name.cmp(&b.product_name));
    Ok(ProductsIndexTemplate { page, products })
}

/// Display a single product.
#[instrument(skip(state, page))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
    page: PageContext,
) -> Result<impl IntoResponse> {
    let product = ProductService::new(state.storage())
        .get(&id)
        .await
        .map_err(not_found(&id))?;
    Ok(ProductShowTemplate { page, product })
}

// =============================================================================
// Admin Routes
// =============================================================================

/// Display the empty create form.
pub async fn new(RequireAdmin(_admin): RequireAdmin, page: PageContext) -> impl IntoResponse {
    ProductFormTemplate {
        page,
        product_id: None,
        image_url: String::new(),
        input: ProductInput::default(),
        error: None,
    }
}

/// Handle the create form.
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    session: Session,
    page: PageContext,
    multipart: Multipart,
) -> Result<Response> {
    let mut form = MultipartForm::read(multipart).await?;
    let input = input_from(&form);
    let image = form.take_file("image");

    match ProductService::new(state.storage())
        .create(&input, image.as_ref())
        .await
    {
        Ok(product) => {
            let message = format!(
                "Product '{}' created successfully with price {}!",
                product.product_name,
                product.price.display()
            );
            Ok(flash_redirect(&session, Flash::success(message), "/products").await)
        }
        Err(ProductError::Invalid(error)) => Ok(ProductFormTemplate {
            page,
            product_id: None,
            image_url: String::new(),
            input,
            error: Some(error),
        }
        .into_response()),
        Err(e) => Err(e.into()),
    }
}

/// Display the edit form.
#[instrument(skip(state, page, _admin))]
pub async fn edit(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
    page: PageContext,
) -> Result<impl IntoResponse> {
    let product = ProductService::new(state.storage())
        .get(&id)
        .await
        .map_err(not_found(&id))?;
    Ok(ProductFormTemplate {
        page,
        product_id: Some(product.row_key.clone()),
        image_url: product.image_url.clone(),
        input: ProductInput::from(&product),
        error: None,
    })
}

/// Handle the edit form.
#[instrument(skip(state, session, page, multipart, _admin))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
    session: Session,
    page: PageContext,
    multipart: Multipart,
) -> Result<Response> {
    let mut form = MultipartForm::read(multipart).await?;
    let input = input_from(&form);
    let image = form.take_file("image");

    let products = ProductService::new(state.storage());
    match products.update(&id, &input, image.as_ref()).await {
        Ok(_) => Ok(flash_redirect(
            &session,
            Flash::success("Product updated successfully!"),
            "/products",
        )
        .await),
        Err(ProductError::Invalid(error)) => {
            let image_url = products
                .get(&id)
                .await
                .map(|p| p.image_url)
                .unwrap_or_default();
            Ok(ProductFormTemplate {
                page,
                product_id: Some(id),
                image_url,
                input,
                error: Some(error),
            }
            .into_response())
        }
        Err(e) => Err(not_found(&id)(e)),
    }
}

/// Display the delete confirmation.
#[instrument(skip(state, page, _admin))]
pub async fn delete_confirm(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
    page: PageContext,
) -> Result<impl IntoResponse> {
    let product = ProductService::new(state.storage())
        .get(&id)
        .await
        .map_err(not_found(&id))?;
    Ok(ProductDeleteTemplate { page, product })
}

/// Delete a product and its image.
#[instrument(skip(state, session, _admin))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
    session: Session,
) -> Response {
    let flash = match ProductService::new(state.storage()).delete(&id).await {
        Ok(()) => Flash::success("Product deleted successfully!"),
        Err(e) => {
            tracing::warn!(product_id = %id, error = %e, "Product delete failed");
            Flash::error(failure_message("Error deleting product", e))
        }
    };
    flash_redirect(&session, flash, "/products").await
}
