//! Catalog category records.

use serde::{Deserialize, Serialize};

/// A product category as stored in the category collection.
///
/// Identity is the document id assigned by the backend, which is not
/// modeled here. Category names are not required to be unique.
///
/// Field names on the wire are `categoryName` and `categoryImageUrl`; a
/// document missing either field deserializes with an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryRecord {
    /// Display name of the category.
    #[serde(rename = "categoryName")]
    pub name: String,
    /// Download URL of the category image.
    #[serde(rename = "categoryImageUrl")]
    pub image_url: String,
}

impl CategoryRecord {
    /// Create a new category record.
    #[must_use]
    pub fn new(name: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image_url: image_url.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_serializes_with_document_field_names() {
        let category = CategoryRecord::new("Stationery", "https://cdn/stationery.png");
        let json = serde_json::to_value(&category).expect("serialize");

        assert_eq!(json["categoryName"], "Stationery");
        assert_eq!(json["categoryImageUrl"], "https://cdn/stationery.png");
    }

    #[test]
    fn test_category_missing_fields_default_to_empty() {
        let category: CategoryRecord =
            serde_json::from_str(r#"{"categoryName":"Books"}"#).expect("deserialize");

        assert_eq!(category.name, "Books");
        assert!(category.image_url.is_empty());
    }

    #[test]
    fn test_category_wrong_field_type_is_rejected() {
        let result = serde_json::from_str::<CategoryRecord>(r#"{"categoryName":42}"#);
        assert!(result.is_err());
    }
}
