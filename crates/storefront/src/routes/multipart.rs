//! Collecting `multipart/form-data` bodies into text fields and files.

use std::collections::HashMap;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;

use crate::error::AppError;
use crate::storage::UploadedFile;

/// A fully read multipart form.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    /// Read every part. Parts with a file name become files, others text.
    ///
    /// A file input left empty arrives as a part with an empty name and no
    /// data; it is dropped.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if the body is malformed or exceeds
    /// the body limit.
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            match field.file_name().map(file_name_only) {
                Some(file_name) => {
                    let content_type = field.content_type().unwrap_or_default().to_owned();
                    let data = field.bytes().await.map_err(bad_request)?;
                    if file_name.is_empty() && data.is_empty() {
                        continue;
                    }
                    form.files
                        .insert(name, UploadedFile::new(file_name, content_type, data));
                }
                None => {
                    let value = field.text().await.map_err(bad_request)?;
                    form.fields.insert(name, value);
                }
            }
        }
        Ok(form)
    }

    /// A text field, or empty.
    #[must_use]
    pub fn text(&self, name: &str) -> &str {
        self.fields.get(name).map_or("", String::as_str)
    }

    /// An integer field. Blank or unparsable input gives `None`.
    #[must_use]
    pub fn int(&self, name: &str) -> Option<i32> {
        self.text(name).trim().parse().ok()
    }

    /// Take a non-empty uploaded file.
    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name).filter(|f| !f.is_empty())
    }
}

fn bad_request(e: MultipartError) -> AppError {
    tracing::warn!(error = %e, "Rejected multipart body");
    AppError::BadRequest(e.body_text())
}

/// Strip any directory part a browser may send.
fn file_name_only(raw: &str) -> String {
    raw.rsplit(['/', '\\']).next().unwrap_or_default().to_owned()
}
