//! Catalog maintenance.
//!
//! Prices arrive as form text and are parsed strictly. Product images go to
//! the `product-images` container; replacing or deleting a product removes
//! its previous image blob on a best-effort basis.

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use cloudmart_core::{Price, PriceError};

use crate::models::Product;
use crate::storage::{
    StorageError, StorageService, TableEntity, UploadedFile, blob_name_from_url, names,
};

#[derive(Debug, Error)]
pub enum ProductError {
    /// Form input rejected; the message is shown to the user.
    #[error("{0}")]
    Invalid(String),

    #[error("product not found")]
    NotFound,

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<PriceError> for ProductError {
    fn from(err: PriceError) -> Self {
        Self::Invalid(err.to_string())
    }
}

/// Product form fields as submitted.
#[derive(Debug, Clone, Default)]
pub struct ProductInput {
    pub product_name: String,
    pub description: String,
    /// Raw price text, e.g. `"29.99"`.
    pub price: String,
    pub stock_available: i32,
}

impl ProductInput {
    fn validate(&self) -> Result<Price, ProductError> {
        if self.product_name.trim().is_empty() {
            return Err(ProductError::Invalid("Product name is required".to_string()));
        }
        if self.stock_available < 0 {
            return Err(ProductError::Invalid("Stock cannot be negative".to_string()));
        }
        Ok(Price::parse_input(&self.price)?)
    }
}

impl From<&Product> for ProductInput {
    fn from(product: &Product) -> Self {
        Self {
            product_name: product.product_name.clone(),
            description: product.description.clone(),
            price: product.price.to_storage_string(),
            stock_available: product.stock_available,
        }
    }
}

pub struct ProductService<'a> {
    storage: &'a StorageService,
}

impl<'a> ProductService<'a> {
    #[must_use]
    pub const fn new(storage: &'a StorageService) -> Self {
        Self { storage }
    }

    /// # Errors
    ///
    /// Returns `ProductError::Storage` if the query fails.
    pub async fn list(&self) -> Result<Vec<Product>, ProductError> {
        Ok(self.storage.get_all_entities::<Product>().await?)
    }

    /// # Errors
    ///
    /// Returns `ProductError::NotFound` if there is no such product.
    pub async fn get(&self, id: &str) -> Result<Product, ProductError> {
        self.storage
            .get_entity::<Product>(Product::KIND, id)
            .await?
            .ok_or(ProductError::NotFound)
    }

    /// Create a product, uploading its image first when one was sent.
    ///
    /// # Errors
    ///
    /// Returns `ProductError::Invalid` for a blank name, a bad price, or a
    /// price that is not above zero.
    #[instrument(skip(self, input, image), fields(product_name = %input.product_name))]
    pub async fn create(
        &self,
        input: &ProductInput,
        image: Option<&UploadedFile>,
    ) -> Result<Product, ProductError> {
        let price = input.validate()?;
        if !price.is_positive() {
            return Err(ProductError::Invalid(
                "Price must be greater than $0.00".to_string(),
            ));
        }

        let mut product = Product::new(
            &input.product_name,
            &input.description,
            price,
            input.stock_available,
        );
        product.updated_at = Some(Utc::now());
        if let Some(image) = image.filter(|f| !f.is_empty()) {
            product.image_url = self
                .storage
                .upload_image(image, names::PRODUCT_IMAGES_CONTAINER)
                .await?;
        }

        self.storage.add_entity(&product).await?;
        info!(product_id = %product.id(), price = %product.price, "Product created");
        Ok(product)
    }

    /// Update a product in place, keeping its ETag.
    ///
    /// # Errors
    ///
    /// Returns `ProductError::NotFound` if the product is gone and
    /// `ProductError::Invalid` for bad input.
    #[instrument(skip(self, input, image))]
    pub async fn update(
        &self,
        id: &str,
        input: &ProductInput,
        image: Option<&UploadedFile>,
    ) -> Result<Product, ProductError> {
        let price = input.validate()?;
        let mut product = self.get(id).await?;

        product.product_name = input.product_name.trim().to_owned();
        product.description = input.description.trim().to_owned();
        product.price = price;
        product.stock_available = input.stock_available;
        product.updated_at = Some(Utc::now());

        let mut replaced_image = None;
        if let Some(image) = image.filter(|f| !f.is_empty()) {
            let url = self
                .storage
                .upload_image(image, names::PRODUCT_IMAGES_CONTAINER)
                .await?;
            replaced_image = Some(std::mem::replace(&mut product.image_url, url));
        }

        self.storage.update_entity(&product).await?;
        if let Some(old_url) = replaced_image {
            self.remove_image(&old_url).await;
        }
        info!(product_id = id, "Product updated");
        Ok(product)
    }

    /// Delete a product and its image.
    ///
    /// # Errors
    ///
    /// Returns `ProductError::NotFound` if the product does not exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), ProductError> {
        let product = self.get(id).await?;
        self.storage
            .delete_entity::<Product>(Product::KIND, id)
            .await?;
        if product.has_image() {
            self.remove_image(&product.image_url).await;
        }
        info!(product_id = id, "Product deleted");
        Ok(())
    }

    async fn remove_image(&self, url: &str) {
        let Some(blob_name) = blob_name_from_url(url) else {
            return;
        };
        if let Err(e) = self
            .storage
            .delete_blob(&blob_name, names::PRODUCT_IMAGES_CONTAINER)
            .await
        {
            warn!(blob = %blob_name, error = %e, "Failed to delete old product image");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(price: &str) -> ProductInput {
        ProductInput {
            product_name: "Mug".to_string(),
            description: String::new(),
            price: price.to_string(),
            stock_available: 3,
        }
    }

    fn message(err: ProductError) -> String {
        match err {
            ProductError::Invalid(msg) => msg,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_price_validation_messages() {
        assert_eq!(message(input("").validate().unwrap_err()), "Price is required");
        assert_eq!(
            message(input("abc").validate().unwrap_err()),
            "Please enter a valid price (e.g., 29.99)"
        );
        assert_eq!(
            message(input("100000000000000000000000000").validate().unwrap_err()),
            "Price must not exceed $1,000,000,000.00"
        );
        assert_eq!(input("29.99").validate().unwrap(), Price::from_cents(2999));
    }

    #[tokio::test]
    async fn test_create_rejects_zero_price() {
        let storage = StorageService::in_memory();
        let err = ProductService::new(&storage)
            .create(&input("0"), None)
            .await
            .unwrap_err();
        assert_eq!(message(err), "Price must be greater than $0.00");
    }

    #[test]
    fn test_blank_name_rejected() {
        let mut form = input("1.00");
        form.product_name = "  ".to_string();
        assert_eq!(message(form.validate().unwrap_err()), "Product name is required");
    }
}
