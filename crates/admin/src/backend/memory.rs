//! In-memory document and blob store.
//!
//! Used by tests and by the CLI's `--dry-run` mode. Supports injecting a
//! failure message and an artificial latency to exercise error and
//! cancellation paths.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{BackendError, BlobStore, Document, DocumentStore};

/// Scheme used for download URLs of in-memory blobs.
pub const MEMORY_URL_SCHEME: &str = "memory://";

/// Process-local document and blob store.
///
/// Cloning shares the underlying data.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    inner: Arc<RwLock<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    collections: HashMap<String, Vec<Document>>,
    blobs: HashMap<String, Vec<u8>>,
    failure: Option<String>,
    latency: Option<Duration>,
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackend").finish_non_exhaustive()
    }
}

impl InMemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `message`, or clear the failure.
    pub async fn set_failure(&self, message: Option<&str>) {
        self.inner.write().await.failure = message.map(String::from);
    }

    /// Delay every subsequent call by `latency`.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        self.inner.write().await.latency = latency;
    }

    /// Insert a document with an explicit id, bypassing serialization.
    pub async fn insert_document(&self, collection: &str, id: &str, data: Value) {
        self.inner
            .write()
            .await
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(Document::new(id, data));
    }

    /// Snapshot of a collection's documents.
    pub async fn documents(&self, collection: &str) -> Vec<Document> {
        self.inner
            .read()
            .await
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Contents of an uploaded blob.
    pub async fn blob(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.read().await.blobs.get(path).cloned()
    }

    /// Paths of every uploaded blob, sorted.
    pub async fn blob_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.inner.read().await.blobs.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Apply the configured latency, then the configured failure.
    async fn before_call(&self) -> Result<(), BackendError> {
        let latency = self.inner.read().await.latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        match &self.inner.read().await.failure {
            Some(message) => Err(BackendError::Rejected(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryBackend {
    async fn add(&self, collection: &str, data: Value) -> Result<String, BackendError> {
        self.before_call().await?;

        let id = Uuid::new_v4().simple().to_string();
        self.insert_document(collection, &id, data).await;
        debug!(collection = %collection, id = %id, "Document added");

        Ok(id)
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, BackendError> {
        self.before_call().await?;
        Ok(self.documents(collection).await)
    }
}

#[async_trait]
impl BlobStore for InMemoryBackend {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _content_type: Option<&str>,
    ) -> Result<(), BackendError> {
        self.before_call().await?;

        debug!(path = %path, size = bytes.len(), "Blob uploaded");
        self.inner.write().await.blobs.insert(path.to_string(), bytes);

        Ok(())
    }

    async fn download_url(&self, path: &str) -> Result<String, BackendError> {
        self.before_call().await?;

        if self.inner.read().await.blobs.contains_key(path) {
            Ok(format!("{MEMORY_URL_SCHEME}{path}"))
        } else {
            Err(BackendError::Rejected(format!(
                "Object does not exist at location: {path}"
            )))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_add_and_list() {
        let backend = InMemoryBackend::new();

        let id = backend
            .add("Category", json!({"categoryName": "Books"}))
            .await
            .unwrap();
        let docs = backend.list("Category").await.unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, id);
        assert_eq!(docs[0].str_field("categoryName"), Some("Books"));
        assert!(backend.list("Products").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let backend = InMemoryBackend::new();
        backend.set_failure(Some("quota exceeded")).await;

        let err = backend.add("Category", json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "quota exceeded");

        backend.set_failure(None).await;
        assert!(backend.add("Category", json!({})).await.is_ok());
    }

    #[tokio::test]
    async fn test_blob_roundtrip() {
        let backend = InMemoryBackend::new();

        backend
            .upload("Products/1", vec![1, 2, 3], Some("image/png"))
            .await
            .unwrap();

        assert_eq!(backend.blob("Products/1").await, Some(vec![1, 2, 3]));
        assert_eq!(
            backend.download_url("Products/1").await.unwrap(),
            "memory://Products/1"
        );
    }

    #[tokio::test]
    async fn test_download_url_of_missing_blob() {
        let backend = InMemoryBackend::new();
        let err = backend.download_url("Products/404").await.unwrap_err();
        assert!(err.to_string().contains("Products/404"));
    }
}
