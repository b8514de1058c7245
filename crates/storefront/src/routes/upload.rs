//! Proof-of-payment uploads.
//!
//! A proof is stored twice: as a blob in `payment-proofs` and as a file
//! under `contracts/payments`. Admins download the file-share copy.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{PageContext, RequireAdmin, RequireAuth};
use crate::models::Flash;
use crate::storage::{StorageError, UploadedFile, names};
use crate::state::AppState;

use super::failure_message;
use super::multipart::MultipartForm;

/// Upload form template.
#[derive(Template, WebTemplate)]
#[template(path = "upload/index.html")]
pub struct UploadTemplate {
    pub page: PageContext,
    pub order_id: String,
    pub customer_name: String,
    pub error: Option<String>,
}

/// Display the upload form.
pub async fn index(RequireAuth(_user): RequireAuth, page: PageContext) -> impl IntoResponse {
    UploadTemplate {
        page,
        order_id: String::new(),
        customer_name: String::new(),
        error: None,
    }
}

/// Store a proof of payment.
#[instrument(skip_all, fields(username = %user.username))]
pub async fn upload(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    page: PageContext,
    multipart: Multipart,
) -> Result<Response> {
    let mut form = MultipartForm::read(multipart).await?;
    let order_id = form.text("order_id").trim().to_owned();
    let customer_name = form.text("customer_name").trim().to_owned();

    let Some(file) = form.take_file("proof_of_payment") else {
        tracing::warn!("No file selected for upload");
        return Ok(UploadTemplate {
            page,
            order_id,
            customer_name,
            error: Some("Please select a file to upload.".to_string()),
        }
        .into_response());
    };

    tracing::info!(
        file_name = %file.file_name,
        size = file.data.len(),
        order_id = %order_id,
        customer = %customer_name,
        "Storing proof of payment"
    );
    match store_proof(&state, &file).await {
        Ok(blob_name) => {
            let flash = Flash::success(format!(
                "File uploaded successfully! File name: {blob_name}"
            ));
            Ok(UploadTemplate {
                page: page.with_flash(flash),
                order_id: String::new(),
                customer_name: String::new(),
                error: None,
            }
            .into_response())
        }
        Err(e) => {
            tracing::error!(error = %e, order_id = %order_id, "Proof of payment upload failed");
            Ok(UploadTemplate {
                page,
                order_id,
                customer_name,
                error: Some(failure_message("Error uploading file", e)),
            }
            .into_response())
        }
    }
}

/// Blob first, then the file share. Returns the blob name.
async fn store_proof(state: &AppState, file: &UploadedFile) -> std::result::Result<String, StorageError> {
    let storage = state.storage();
    let blob_name = storage
        .upload_file(file, names::PAYMENT_PROOFS_CONTAINER)
        .await?;
    let share_name = storage
        .upload_to_file_share(file, names::CONTRACTS_SHARE, names::PAYMENTS_DIRECTORY)
        .await?;
    tracing::info!(blob = %blob_name, share_file = %share_name, "Proof of payment stored");
    Ok(blob_name)
}

/// Download a stored proof from `contracts/payments`.
#[instrument(skip(state, _admin))]
pub async fn download_contract(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(file_name): Path<String>,
) -> Result<Response> {
    if !is_plain_file_name(&file_name) {
        return Err(AppError::BadRequest("invalid file name".to_string()));
    }

    let data = state
        .storage()
        .download_from_file_share(names::CONTRACTS_SHARE, &file_name, names::PAYMENTS_DIRECTORY)
        .await
        .map_err(|e| match e {
            StorageError::NotFound(_) => AppError::NotFound(format!("file {file_name}")),
            other => other.into(),
        })?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        file_name.replace(['"', '\\'], "_")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}

/// A single path segment with no traversal or control characters.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_file_names() {
        assert!(is_plain_file_name("20240101_120000_proof.pdf"));
        assert!(!is_plain_file_name(""));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name("../secret"));
        assert!(!is_plain_file_name(r"a\b"));
        assert!(!is_plain_file_name("a\nb"));
    }
}
