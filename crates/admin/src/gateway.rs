//! Catalog gateway.
//!
//! Every operation returns a [`ProgressStream`] that emits `Loading` when
//! first polled, then exactly one `Success` or `Error`. Backend failures are
//! reported with the backend's own message. Nothing here retries.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use shopping_admin_core::{CategoryRecord, ProductRecord};
use tracing::debug;

use crate::backend::{BackendError, BlobStore, DocumentStore};
use crate::config::{CollectionNames, EmptyImagePolicy};
use crate::stream::{ProgressStream, progress_stream};

/// Success message for [`CatalogRepository::add_category`].
pub const CATEGORY_ADDED: &str = "Category added successfully";

/// Success message for [`CatalogRepository::add_product`].
pub const PRODUCT_ADDED: &str = "Product added successfully";

/// Error message when an empty image is rejected.
pub const NO_IMAGE_SELECTED: &str = "No image selected";

/// Image content to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// A local file; its content type is guessed from the extension.
    File(PathBuf),
    /// In-memory bytes.
    Bytes {
        data: Vec<u8>,
        content_type: Option<String>,
    },
}

impl ImageSource {
    async fn load(self) -> Result<(Vec<u8>, Option<String>), BackendError> {
        match self {
            Self::File(path) => {
                let data = tokio::fs::read(&path).await?;
                Ok((data, guess_content_type(&path).map(String::from)))
            }
            Self::Bytes { data, content_type } => Ok((data, content_type)),
        }
    }
}

/// Catalog operations exposed to the use-case layer.
pub trait CatalogRepository: Send + Sync {
    /// Insert a category document.
    fn add_category(&self, category: CategoryRecord) -> ProgressStream<String>;

    /// List every category that deserializes cleanly.
    fn get_all_categories(&self) -> ProgressStream<Vec<CategoryRecord>>;

    /// Insert a product document.
    fn add_product(&self, product: ProductRecord) -> ProgressStream<String>;

    /// Upload a product image and return its download URL.
    fn add_product_image(&self, image: Option<ImageSource>) -> ProgressStream<String>;

    /// Upload a category image and return its download URL.
    fn add_category_image(&self, image: Option<ImageSource>) -> ProgressStream<String>;
}

/// [`CatalogRepository`] over a document store and a blob store.
#[derive(Clone)]
pub struct CatalogGateway {
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    collections: CollectionNames,
    empty_image_policy: EmptyImagePolicy,
}

impl std::fmt::Debug for CatalogGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogGateway")
            .field("collections", &self.collections)
            .field("empty_image_policy", &self.empty_image_policy)
            .finish_non_exhaustive()
    }
}

impl CatalogGateway {
    #[must_use]
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        collections: CollectionNames,
        empty_image_policy: EmptyImagePolicy,
    ) -> Self {
        Self {
            documents,
            blobs,
            collections,
            empty_image_policy,
        }
    }

    fn insert<R>(
        &self,
        collection: &str,
        record: &R,
        message: &'static str,
    ) -> ProgressStream<String>
    where
        R: serde::Serialize,
    {
        let documents = Arc::clone(&self.documents);
        let collection = collection.to_string();
        let data = serde_json::to_value(record);

        progress_stream(move || async move {
            let id = documents.add(&collection, data?).await?;
            debug!(collection = %collection, id = %id, "Record inserted");
            Ok::<_, BackendError>(message.to_string())
        })
    }

    fn upload_image(&self, prefix: &str, image: Option<ImageSource>) -> ProgressStream<String> {
        let blobs = Arc::clone(&self.blobs);
        let prefix = prefix.to_string();
        let policy = self.empty_image_policy;

        progress_stream(move || async move {
            let (data, content_type) = match image {
                Some(source) => source.load().await?,
                None if policy == EmptyImagePolicy::Reject => {
                    return Err(BackendError::Rejected(NO_IMAGE_SELECTED.to_string()));
                }
                None => (Vec::new(), None),
            };

            // Two uploads in the same millisecond share a path; the later one wins
            let path = image_path(&prefix, Utc::now().timestamp_millis());
            blobs.upload(&path, data, content_type.as_deref()).await?;
            blobs.download_url(&path).await
        })
    }
}

impl CatalogRepository for CatalogGateway {
    fn add_category(&self, category: CategoryRecord) -> ProgressStream<String> {
        self.insert(&self.collections.categories, &category, CATEGORY_ADDED)
    }

    fn get_all_categories(&self) -> ProgressStream<Vec<CategoryRecord>> {
        let documents = Arc::clone(&self.documents);
        let collection = self.collections.categories.clone();

        progress_stream(move || async move {
            let docs = documents.list(&collection).await?;
            let categories = docs
                .into_iter()
                .filter_map(
                    |doc| match serde_json::from_value::<CategoryRecord>(doc.data) {
                        Ok(category) => Some(category),
                        Err(e) => {
                            debug!(id = %doc.id, error = %e, "Skipping malformed category");
                            None
                        }
                    },
                )
                .collect::<Vec<_>>();
            Ok::<_, BackendError>(categories)
        })
    }

    fn add_product(&self, product: ProductRecord) -> ProgressStream<String> {
        self.insert(&self.collections.products, &product, PRODUCT_ADDED)
    }

    fn add_product_image(&self, image: Option<ImageSource>) -> ProgressStream<String> {
        self.upload_image(&self.collections.products, image)
    }

    fn add_category_image(&self, image: Option<ImageSource>) -> ProgressStream<String> {
        self.upload_image(&self.collections.categories, image)
    }
}

/// Blob path for an image uploaded at `epoch_millis`.
#[must_use]
pub fn image_path(prefix: &str, epoch_millis: i64) -> String {
    format!("{prefix}/{epoch_millis}")
}

fn guess_content_type(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures::StreamExt;
    use serde_json::json;
    use shopping_admin_core::ProgressEvent;

    use super::*;
    use crate::backend::InMemoryBackend;

    fn gateway(backend: &InMemoryBackend, policy: EmptyImagePolicy) -> CatalogGateway {
        CatalogGateway::new(
            Arc::new(backend.clone()),
            Arc::new(backend.clone()),
            CollectionNames::default(),
            policy,
        )
    }

    #[test]
    fn test_image_path() {
        assert_eq!(image_path("Products", 1_700_000_000_000), "Products/1700000000000");
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type(Path::new("a/b.PNG")), Some("image/png"));
        assert_eq!(guess_content_type(Path::new("photo.jpeg")), Some("image/jpeg"));
        assert_eq!(guess_content_type(Path::new("notes.txt")), None);
        assert_eq!(guess_content_type(Path::new("no_extension")), None);
    }

    #[tokio::test]
    async fn test_add_category_events() {
        let backend = InMemoryBackend::new();
        let events: Vec<_> = gateway(&backend, EmptyImagePolicy::default())
            .add_category(CategoryRecord::new("Books", "https://img/books.png"))
            .collect()
            .await;

        assert_eq!(
            events,
            vec![
                ProgressEvent::Loading,
                ProgressEvent::success(CATEGORY_ADDED.to_string())
            ]
        );

        let docs = backend.documents("Category").await;
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].str_field("categoryName"), Some("Books"));
        assert_eq!(
            docs[0].str_field("categoryImageUrl"),
            Some("https://img/books.png")
        );
    }

    #[tokio::test]
    async fn test_add_product_failure_is_verbatim() {
        let backend = InMemoryBackend::new();
        backend.set_failure(Some("PERMISSION_DENIED: writes disabled")).await;

        let outcome = gateway(&backend, EmptyImagePolicy::default())
            .add_product(ProductRecord::default())
            .outcome()
            .await;

        assert_eq!(outcome, Err("PERMISSION_DENIED: writes disabled".to_string()));
    }

    #[tokio::test]
    async fn test_add_product_stores_date_field() {
        let backend = InMemoryBackend::new();
        let product = ProductRecord {
            name: "Pen".to_string(),
            created_at_epoch_millis: 1_700_000_000_000,
            available_units: 5,
            ..Default::default()
        };

        gateway(&backend, EmptyImagePolicy::default())
            .add_product(product)
            .outcome()
            .await
            .unwrap();

        let docs = backend.documents("Products").await;
        assert_eq!(docs[0].data["date"], json!(1_700_000_000_000_i64));
        assert_eq!(docs[0].data["availableUnits"], json!(5));
    }

    #[tokio::test]
    async fn test_get_all_categories_skips_malformed() {
        let backend = InMemoryBackend::new();
        backend
            .insert_document("Category", "a", json!({"categoryName": "Books"}))
            .await;
        backend
            .insert_document("Category", "b", json!({"categoryName": 7}))
            .await;
        backend
            .insert_document("Category", "c", json!("not an object"))
            .await;
        backend
            .insert_document(
                "Category",
                "d",
                json!({"categoryName": "Pens", "categoryImageUrl": "u"}),
            )
            .await;

        let categories = gateway(&backend, EmptyImagePolicy::default())
            .get_all_categories()
            .outcome()
            .await
            .unwrap();

        assert_eq!(
            categories,
            vec![
                CategoryRecord::new("Books", ""),
                CategoryRecord::new("Pens", "u")
            ]
        );
    }

    #[tokio::test]
    async fn test_product_image_upload_returns_url() {
        let backend = InMemoryBackend::new();

        let url = gateway(&backend, EmptyImagePolicy::default())
            .add_product_image(Some(ImageSource::Bytes {
                data: b"png".to_vec(),
                content_type: Some("image/png".to_string()),
            }))
            .outcome()
            .await
            .unwrap();

        let paths = backend.blob_paths().await;
        assert_eq!(paths.len(), 1);
        assert!(paths[0].starts_with("Products/"));
        assert_eq!(url, format!("memory://{}", paths[0]));
        assert_eq!(backend.blob(&paths[0]).await, Some(b"png".to_vec()));
    }

    #[tokio::test]
    async fn test_category_image_from_file() {
        let backend = InMemoryBackend::new();
        let dir = std::env::temp_dir().join(format!("gateway-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("books.jpg");
        std::fs::write(&path, b"jpeg-bytes").unwrap();

        let url = gateway(&backend, EmptyImagePolicy::default())
            .add_category_image(Some(ImageSource::File(path)))
            .outcome()
            .await
            .unwrap();

        assert!(url.starts_with("memory://Category/"));
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error_event() {
        let backend = InMemoryBackend::new();

        let events: Vec<_> = gateway(&backend, EmptyImagePolicy::default())
            .add_category_image(Some(ImageSource::File("/nonexistent/x.png".into())))
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], ProgressEvent::Error { .. }));
        assert!(backend.blob_paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_image_is_uploaded_by_default() {
        let backend = InMemoryBackend::new();

        let url = gateway(&backend, EmptyImagePolicy::UploadEmpty)
            .add_product_image(None)
            .outcome()
            .await
            .unwrap();

        let paths = backend.blob_paths().await;
        assert_eq!(url, format!("memory://{}", paths[0]));
        assert_eq!(backend.blob(&paths[0]).await, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_empty_image_can_be_rejected() {
        let backend = InMemoryBackend::new();

        let outcome = gateway(&backend, EmptyImagePolicy::Reject)
            .add_product_image(None)
            .outcome()
            .await;

        assert_eq!(outcome, Err(NO_IMAGE_SELECTED.to_string()));
        assert!(backend.blob_paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_nothing_runs_until_polled() {
        let backend = InMemoryBackend::new();
        let stream = gateway(&backend, EmptyImagePolicy::default())
            .add_category(CategoryRecord::new("Books", ""));

        drop(stream);

        assert!(backend.documents("Category").await.is_empty());
    }
}
