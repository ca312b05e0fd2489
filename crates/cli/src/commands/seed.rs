//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! categories:
//!   - name: Stationery
//!     image_url: https://example.com/stationery.png
//! products:
//!   - name: Pen
//!     price: "10"
//!     final_price: "8"
//!     description: Blue ink
//!     category: Stationery
//!     units: 5
//! ```
//!
//! Categories are created before products. A record that fails is reported
//! and the rest are still attempted.

use std::path::Path;

use serde::Deserialize;
use shopping_admin::state::AdminState;
use shopping_admin_core::{CategoryRecord, ProductRecord};
use tracing::{error, info};

use super::{CommandResult, follow};

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeedFile {
    pub categories: Vec<SeedCategory>,
    pub products: Vec<SeedProduct>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedCategory {
    pub name: String,
    #[serde(default)]
    pub image_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedProduct {
    pub name: String,
    pub price: String,
    pub final_price: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    pub category: String,
    #[serde(default)]
    pub units: i32,
}

impl From<SeedCategory> for CategoryRecord {
    fn from(seed: SeedCategory) -> Self {
        Self::new(seed.name, seed.image_url)
    }
}

impl From<SeedProduct> for ProductRecord {
    fn from(seed: SeedProduct) -> Self {
        Self {
            name: seed.name,
            price: seed.price,
            final_price: seed.final_price,
            description: seed.description,
            image_url: seed.image_url,
            category: seed.category,
            available_units: seed.units,
            ..Default::default()
        }
    }
}

/// Create every category and product in `file`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if any record
/// failed to be created.
pub async fn run(state: &AdminState, file: &Path) -> CommandResult {
    info!(path = %file.display(), "Loading seed file");

    let content = tokio::fs::read_to_string(file).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;

    info!(
        categories = seed.categories.len(),
        products = seed.products.len(),
        "Parsed seed file"
    );

    let use_cases = state.use_cases();
    let mut created = 0usize;
    let mut failures = Vec::new();

    for category in seed.categories {
        let label = format!("category {}", category.name);
        match follow(&label, use_cases.add_category(category.into())).await {
            Ok(_) => created += 1,
            Err(e) => failures.push(e),
        }
    }

    for product in seed.products {
        let label = format!("product {}", product.name);
        match follow(&label, use_cases.add_product(product.into())).await {
            Ok(_) => created += 1,
            Err(e) => failures.push(e),
        }
    }

    println!("Seeding complete: {created} created, {} failed", failures.len());

    if failures.is_empty() {
        Ok(())
    } else {
        for failure in &failures {
            error!("  - {failure}");
        }
        Err(format!("{} records failed", failures.len()).into())
    }
}
