//! Firebase Cloud Storage client.
//!
//! Implements [`BlobStore`] with the Firebase Storage REST endpoints:
//!
//! - upload - `POST /v0/b/{bucket}/o?name={path}` with the raw bytes
//! - download URL - `GET /v0/b/{bucket}/o/{path}` for the object metadata,
//!   then `.../o/{path}?alt=media&token={downloadToken}`
//!
//! Object paths are percent-encoded as a single segment (`/` becomes `%2F`),
//! matching the URLs the Firebase SDKs hand out.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{BackendError, BlobStore};
use crate::credentials::CredentialProvider;

/// Firebase Storage REST API base URL.
const STORAGE_API_BASE: &str = "https://firebasestorage.googleapis.com/v0";

/// Content type used when the caller does not know one.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Firebase Cloud Storage client for a single bucket.
#[derive(Clone)]
pub struct CloudStorageClient {
    client: reqwest::Client,
    credentials: CredentialProvider,
    /// `{base}/b/{bucket}/o`
    objects_url: String,
}

impl std::fmt::Debug for CloudStorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudStorageClient")
            .field("objects_url", &self.objects_url)
            .finish_non_exhaustive()
    }
}

/// Object metadata returned by upload and metadata requests.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMetadata {
    /// Comma-separated download tokens.
    #[serde(default)]
    download_tokens: Option<String>,
}

/// Firebase Storage error envelope.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl CloudStorageClient {
    /// Create a client for `bucket`.
    #[must_use]
    pub fn new(client: reqwest::Client, credentials: CredentialProvider, bucket: &str) -> Self {
        Self::with_base_url(client, credentials, STORAGE_API_BASE, bucket)
    }

    /// Create a client against a non-default API base (emulators, tests).
    #[must_use]
    pub fn with_base_url(
        client: reqwest::Client,
        credentials: CredentialProvider,
        base_url: &str,
        bucket: &str,
    ) -> Self {
        Self {
            client,
            credentials,
            objects_url: format!("{}/b/{bucket}/o", base_url.trim_end_matches('/')),
        }
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/{}", self.objects_url, urlencoding::encode(path))
    }

    async fn fetch_metadata(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<ObjectMetadata, BackendError> {
        let token = self.credentials.get_valid_token().await?;
        let response = request
            .bearer_auth(token.value.expose_secret())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(serde_json::from_str(&body)?);
        }

        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|envelope| envelope.error.message)
            .unwrap_or_else(|_| format!("HTTP {status}: {body}"));
        Err(BackendError::Rejected(message))
    }
}

#[async_trait]
impl BlobStore for CloudStorageClient {
    #[instrument(skip(self, bytes), fields(path = %path, size = bytes.len()))]
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), BackendError> {
        let mut url = Url::parse(&self.objects_url)
            .map_err(|e| BackendError::Rejected(format!("Invalid bucket URL: {e}")))?;
        url.query_pairs_mut().append_pair("name", path);

        let request = self
            .client
            .post(url)
            .header(
                reqwest::header::CONTENT_TYPE,
                content_type.unwrap_or(DEFAULT_CONTENT_TYPE),
            )
            .body(bytes);

        self.fetch_metadata(request).await?;
        debug!("Object uploaded");

        Ok(())
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn download_url(&self, path: &str) -> Result<String, BackendError> {
        let object_url = self.object_url(path);
        let metadata = self
            .fetch_metadata(self.client.get(&object_url))
            .await?;

        let token = metadata
            .download_tokens
            .as_deref()
            .and_then(|tokens| tokens.split(',').map(str::trim).find(|t| !t.is_empty()));

        Ok(match token {
            Some(token) => format!("{object_url}?alt=media&token={token}"),
            None => format!("{object_url}?alt=media"),
        })
    }
}
