//! Use-case layer.
//!
//! One method per catalog operation, forwarding to an injected
//! [`CatalogRepository`]. Callers depend on this type so the repository can
//! be swapped in tests.

use std::sync::Arc;

use shopping_admin_core::{CategoryRecord, ProductRecord};

use crate::gateway::{CatalogRepository, ImageSource};
use crate::stream::ProgressStream;

#[derive(Clone)]
pub struct CatalogUseCases {
    repository: Arc<dyn CatalogRepository>,
}

impl std::fmt::Debug for CatalogUseCases {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogUseCases").finish_non_exhaustive()
    }
}

impl CatalogUseCases {
    #[must_use]
    pub fn new(repository: Arc<dyn CatalogRepository>) -> Self {
        Self { repository }
    }

    #[must_use]
    pub fn add_category(&self, category: CategoryRecord) -> ProgressStream<String> {
        self.repository.add_category(category)
    }

    #[must_use]
    pub fn get_all_categories(&self) -> ProgressStream<Vec<CategoryRecord>> {
        self.repository.get_all_categories()
    }

    #[must_use]
    pub fn add_product(&self, product: ProductRecord) -> ProgressStream<String> {
        self.repository.add_product(product)
    }

    #[must_use]
    pub fn add_product_image(&self, image: Option<ImageSource>) -> ProgressStream<String> {
        self.repository.add_product_image(image)
    }

    #[must_use]
    pub fn add_category_image(&self, image: Option<ImageSource>) -> ProgressStream<String> {
        self.repository.add_category_image(image)
    }
}
