//! Document store and blob store abstractions.
//!
//! The gateway talks to the catalog backend only through [`DocumentStore`]
//! and [`BlobStore`]. Implementations:
//!
//! - [`memory::InMemoryBackend`] - process-local store for tests and dry runs
//! - [`firestore::FirestoreClient`] - Cloud Firestore REST API
//! - [`storage::CloudStorageClient`] - Firebase Cloud Storage
//!
//! Errors carry the backend's own message text, unmodified, so callers can
//! surface it verbatim.

pub mod firestore;
pub mod memory;
pub mod storage;

pub use firestore::FirestoreClient;
pub use memory::InMemoryBackend;
pub use storage::CloudStorageClient;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::credentials::CredentialError;

/// Errors that can occur when talking to the document or blob store.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend rejected the call; the message is the backend's own text.
    #[error("{0}")]
    Rejected(String),

    /// HTTP request failed.
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    /// No credential was available to authorize the call.
    #[error("{0}")]
    Credential(#[from] CredentialError),

    /// Reading local content (e.g. an image file) failed.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// A record could not be converted to or from a document.
    #[error("{0}")]
    Serialization(#[from] serde_json::Error),
}

/// A document read from a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Backend-assigned document id.
    pub id: String,
    /// Document fields as a JSON object.
    pub data: Value,
}

impl Document {
    /// Create a document.
    #[must_use]
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Get a string field, if present and a string.
    #[must_use]
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }
}

/// A schemaless, collection-oriented document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document with a backend-assigned id and return that id.
    async fn add(&self, collection: &str, data: Value) -> Result<String, BackendError>;

    /// List every document in a collection.
    async fn list(&self, collection: &str) -> Result<Vec<Document>, BackendError>;
}

/// A store for binary objects addressed by path.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload `bytes` to `path`, replacing any existing object.
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), BackendError>;

    /// Resolve the durable download URL of an uploaded object.
    async fn download_url(&self, path: &str) -> Result<String, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_error_is_verbatim() {
        let err = BackendError::Rejected("Missing or insufficient permissions.".to_string());
        assert_eq!(err.to_string(), "Missing or insufficient permissions.");
    }

    #[test]
    fn test_document_str_field() {
        let doc = Document::new("abc", serde_json::json!({"token": "t-1", "count": 3}));

        assert_eq!(doc.str_field("token"), Some("t-1"));
        assert_eq!(doc.str_field("count"), None);
        assert_eq!(doc.str_field("missing"), None);
    }
}
