//! Catalog product records.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A product as stored in the product collection.
///
/// Prices are kept as the strings the operator typed; `category` is the
/// category's display name (denormalized, not a reference to a document).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProductRecord {
    /// Product name.
    pub name: String,
    /// List price.
    pub price: String,
    /// Price after discounts.
    pub final_price: String,
    /// Free-form description.
    pub description: String,
    /// Download URL of the product image.
    pub image_url: String,
    /// Name of the category this product belongs to.
    pub category: String,
    /// Creation time in milliseconds since the Unix epoch.
    #[serde(rename = "date")]
    pub created_at_epoch_millis: i64,
    /// Units in stock.
    pub available_units: i32,
}

impl Default for ProductRecord {
    fn default() -> Self {
        Self {
            name: String::new(),
            price: String::new(),
            final_price: String::new(),
            description: String::new(),
            image_url: String::new(),
            category: String::new(),
            created_at_epoch_millis: Utc::now().timestamp_millis(),
            available_units: 0,
        }
    }
}

impl ProductRecord {
    /// Returns true if any field the catalog needs to list the product is blank.
    #[must_use]
    pub fn has_missing_details(&self) -> bool {
        [
            &self.name,
            &self.price,
            &self.final_price,
            &self.description,
            &self.category,
        ]
        .iter()
        .any(|field| field.trim().is_empty())
    }
}
