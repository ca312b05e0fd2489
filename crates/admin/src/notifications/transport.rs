//! Messaging transport.
//!
//! [`HttpTransport`] posts to the FCM HTTP v1 endpoint. Tests substitute
//! their own [`MessagingTransport`] to record or fail sends.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

use super::payload::SendRequest;

/// FCM HTTP v1 API base URL.
const FCM_API_BASE: &str = "https://fcm.googleapis.com/v1";

/// Errors from a single send.
#[derive(Debug, Error)]
pub enum SendError {
    /// Network failure before a status was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-2xx status.
    #[error("Send failed with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// No bearer token was available.
    #[error("Credential error: {0}")]
    Credential(String),
}

/// Delivers one message to the messaging service.
#[async_trait]
pub trait MessagingTransport: Send + Sync {
    /// Send `request` authorized by `bearer`.
    ///
    /// Returns the message name assigned by the service, if any.
    async fn send(
        &self,
        bearer: &SecretString,
        request: &SendRequest,
    ) -> Result<Option<String>, SendError>;
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(default)]
    name: Option<String>,
}

/// FCM HTTP v1 transport for one project.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Transport for `project_id` on the public FCM endpoint.
    #[must_use]
    pub fn new(client: reqwest::Client, project_id: &str) -> Self {
        Self::with_endpoint(
            client,
            format!("{FCM_API_BASE}/projects/{project_id}/messages:send"),
        )
    }

    /// Transport posting to an explicit endpoint URL.
    #[must_use]
    pub fn with_endpoint(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// The URL messages are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl MessagingTransport for HttpTransport {
    #[instrument(skip(self, bearer, request))]
    async fn send(
        &self,
        bearer: &SecretString,
        request: &SendRequest,
    ) -> Result<Option<String>, SendError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(bearer.expose_secret())
            .json(request)
            .send()
            .await?;

        let status = response.status();

        if status.is_success() {
            // Any 2xx is a delivery; the body only supplies the message name
            let body = response.text().await.unwrap_or_default();
            let name = match serde_json::from_str::<SendResponse>(&body) {
                Ok(parsed) => parsed.name,
                Err(e) => {
                    debug!(error = %e, "Unparsed send response body");
                    None
                }
            };
            Ok(name)
        } else {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            Err(SendError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}
