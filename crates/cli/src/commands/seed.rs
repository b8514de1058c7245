//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! - name: Wireless Mouse
//!   description: Two-button mouse with USB receiver
//!   price: "29.99"
//!   stock: 120
//! ```
//!
//! Products are created through the same service the admin pages use, so
//! the same validation applies. Images are not seeded.

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use cloudmart_storefront::services::{ProductInput, ProductService};

/// One product entry in the seed file.
#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Kept as text so `29.9` and `"29.90"` both parse the same way.
    pub price: serde_yaml::Value,
    #[serde(default)]
    pub stock: i32,
}

impl SeedProduct {
    fn to_input(&self) -> ProductInput {
        let price = match &self.price {
            serde_yaml::Value::String(s) => s.clone(),
            serde_yaml::Value::Number(n) => n.to_string(),
            _ => String::new(),
        };
        ProductInput {
            product_name: self.name.clone(),
            description: self.description.clone(),
            price,
            stock_available: self.stock,
        }
    }
}

/// Parse a seed file's contents.
///
/// # Errors
///
/// Returns `serde_yaml::Error` if the YAML is not a list of products.
pub fn parse_products(content: &str) -> Result<Vec<SeedProduct>, serde_yaml::Error> {
    serde_yaml::from_str(content)
}

/// Create every product in `file_path`.
///
/// Invalid entries are logged and skipped.
///
/// # Errors
///
/// Returns an error if storage settings are missing, the file cannot be
/// read, or it is not valid YAML.
pub async fn products(file_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !file_path.exists() {
        return Err(format!("File not found: {}", file_path.display()).into());
    }

    info!(path = %file_path.display(), "Loading products from file");
    let content = tokio::fs::read_to_string(file_path).await?;
    let entries = parse_products(&content)?;
    info!(products = entries.len(), "Parsed seed file");

    let storage = super::storage::connect()?;
    let service = ProductService::new(&storage);

    let mut created = 0_usize;
    let mut failed = 0_usize;
    for entry in &entries {
        match service.create(&entry.to_input(), None).await {
            Ok(product) => {
                created += 1;
                info!(product_id = %product.row_key, name = %product.product_name, "Seeded product");
            }
            Err(e) => {
                failed += 1;
                error!(name = %entry.name, error = %e, "Skipping product");
            }
        }
    }

    info!("Seeding complete!");
    info!("  Products created: {created}");
    if failed > 0 {
        error!("  Products skipped: {failed}");
    }
    Ok(())
}
