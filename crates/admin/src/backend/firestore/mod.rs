//! Cloud Firestore REST client.
//!
//! Implements [`DocumentStore`] on top of the Firestore v1 REST API:
//!
//! - `add` - `POST .../documents/{collection}` (server-assigned id)
//! - `list` - `GET .../documents/{collection}`, following `nextPageToken`
//!
//! Requests are authorized with a bearer token from a [`CredentialProvider`]
//! scoped to `cloud-platform`.

pub mod values;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};
use url::Url;

use super::{BackendError, Document, DocumentStore};
use crate::credentials::CredentialProvider;

/// Firestore REST API base URL.
const FIRESTORE_API_BASE: &str = "https://firestore.googleapis.com/v1";

/// Documents requested per list page.
const LIST_PAGE_SIZE: u32 = 300;

/// Firestore REST client for a single project's default database.
#[derive(Clone)]
pub struct FirestoreClient {
    client: reqwest::Client,
    credentials: CredentialProvider,
    /// `{base}/projects/{project}/databases/(default)/documents`
    documents_url: String,
}

impl std::fmt::Debug for FirestoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirestoreClient")
            .field("documents_url", &self.documents_url)
            .finish_non_exhaustive()
    }
}

/// A document as returned by the REST API.
#[derive(Debug, Deserialize)]
struct RestDocument {
    /// Full resource name; the id is the last path segment.
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<RestDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Google API error envelope.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl FirestoreClient {
    /// Create a client for `project_id`'s default database.
    #[must_use]
    pub fn new(client: reqwest::Client, credentials: CredentialProvider, project_id: &str) -> Self {
        Self::with_base_url(client, credentials, FIRESTORE_API_BASE, project_id)
    }

    /// Create a client against a non-default API base (emulators, tests).
    #[must_use]
    pub fn with_base_url(
        client: reqwest::Client,
        credentials: CredentialProvider,
        base_url: &str,
        project_id: &str,
    ) -> Self {
        Self {
            client,
            credentials,
            documents_url: format!(
                "{}/projects/{project_id}/databases/(default)/documents",
                base_url.trim_end_matches('/')
            ),
        }
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{}", self.documents_url, urlencoding::encode(collection))
    }
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    #[instrument(skip(self, data), fields(collection = %collection))]
    async fn add(&self, collection: &str, data: Value) -> Result<String, BackendError> {
        let fields = values::to_fields(&data).ok_or_else(|| {
            BackendError::Rejected("Document data must be a JSON object".to_string())
        })?;
        let token = self.credentials.get_valid_token().await?;

        let response = self
            .client
            .post(self.collection_url(collection))
            .bearer_auth(token.value.expose_secret())
            .json(&json!({ "fields": fields }))
            .send()
            .await?;

        let document: RestDocument = parse_response(response).await?;
        let id = document_id(&document.name).to_string();
        debug!(id = %id, "Document created");

        Ok(id)
    }

    #[instrument(skip(self), fields(collection = %collection))]
    async fn list(&self, collection: &str) -> Result<Vec<Document>, BackendError> {
        let token = self.credentials.get_valid_token().await?;
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = Url::parse(&self.collection_url(collection))
                .map_err(|e| BackendError::Rejected(format!("Invalid collection URL: {e}")))?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("pageSize", &LIST_PAGE_SIZE.to_string());
                if let Some(ref page) = page_token {
                    query.append_pair("pageToken", page);
                }
            }

            let response = self
                .client
                .get(url)
                .bearer_auth(token.value.expose_secret())
                .send()
                .await?;

            let page: ListDocumentsResponse = parse_response(response).await?;
            documents.extend(page.documents.into_iter().map(|doc| {
                Document::new(document_id(&doc.name), values::from_fields(&doc.fields))
            }));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!(count = documents.len(), "Documents listed");
        Ok(documents)
    }
}

/// Last path segment of a document resource name.
fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Decode a successful response, or surface the API's error message verbatim.
async fn parse_response<T>(response: reqwest::Response) -> Result<T, BackendError>
where
    T: serde::de::DeserializeOwned,
{
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
