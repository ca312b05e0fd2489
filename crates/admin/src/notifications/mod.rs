//! Push-notification fan-out.
//!
//! [`NotificationDispatcher::notify_all_recipients`] loads every recipient
//! token from the document store, then sends one FCM message per token with
//! bounded concurrency. A failed send is recorded in the [`DispatchReport`]
//! and never stops the rest of the batch.

pub mod payload;
pub mod transport;

pub use payload::SendRequest;
pub use transport::{HttpTransport, MessagingTransport, SendError};

use std::sync::Arc;

use futures::StreamExt;
use shopping_admin_core::RecipientToken;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::backend::{BackendError, DocumentStore};
use crate::credentials::CredentialProvider;

/// Document field holding a recipient's device token.
pub const TOKEN_FIELD: &str = "token";

/// Errors that abort a whole dispatch.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The recipient collection could not be read.
    #[error("Failed to load recipients: {0}")]
    Recipients(#[from] BackendError),
}

/// Result of sending to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Accepted by the messaging service.
    Delivered { message_name: Option<String> },
    /// Not delivered.
    Failed { error: String },
}

/// Outcome for one recipient token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientOutcome {
    pub recipient: RecipientToken,
    pub status: DeliveryStatus,
}

impl RecipientOutcome {
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self.status, DeliveryStatus::Delivered { .. })
    }
}

/// Per-recipient outcomes of one dispatch, in completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub outcomes: Vec<RecipientOutcome>,
}

impl DispatchReport {
    /// Number of recipients attempted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether there were no recipients.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Number of messages accepted.
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_delivered()).count()
    }

    /// Number of messages not delivered.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.len() - self.delivered()
    }

    /// Outcome for a specific token, if it was attempted.
    #[must_use]
    pub fn outcome_for(&self, token: &str) -> Option<&RecipientOutcome> {
        self.outcomes.iter().find(|o| o.recipient.as_str() == token)
    }
}

/// Lowest fan-out width; one stalled recipient never serializes the rest.
pub const MIN_CONCURRENCY: usize = 2;

/// Sends new-product notifications to every registered device.
///
/// Cloning shares the underlying store, credentials and transport.
#[derive(Clone)]
pub struct NotificationDispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    documents: Arc<dyn DocumentStore>,
    credentials: CredentialProvider,
    transport: Arc<dyn MessagingTransport>,
    recipient_collection: String,
    max_concurrency: usize,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("recipient_collection", &self.inner.recipient_collection)
            .field("max_concurrency", &self.inner.max_concurrency)
            .finish_non_exhaustive()
    }
}

impl NotificationDispatcher {
    /// Create a dispatcher.
    ///
    /// `max_concurrency` is raised to [`MIN_CONCURRENCY`] if lower.
    #[must_use]
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        credentials: CredentialProvider,
        transport: Arc<dyn MessagingTransport>,
        recipient_collection: impl Into<String>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                documents,
                credentials,
                transport,
                recipient_collection: recipient_collection.into(),
                max_concurrency: max_concurrency.max(MIN_CONCURRENCY),
            }),
        }
    }

    /// Load every recipient token.
    ///
    /// Documents without a string `token` field are skipped.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::Recipients` if the collection cannot be read.
    pub async fn recipient_tokens(&self) -> Result<Vec<RecipientToken>, NotificationError> {
        let documents = self
            .inner
            .documents
            .list(&self.inner.recipient_collection)
            .await?;

        Ok(documents
            .iter()
            .filter_map(|doc| {
                let token = doc.str_field(TOKEN_FIELD);
                if token.is_none() {
                    debug!(id = %doc.id, "Skipping recipient document without token");
                }
                token.map(RecipientToken::new)
            })
            .collect())
    }

    /// Notify every recipient that `product_name` was added.
    ///
    /// With no recipients this makes no HTTP calls. If no bearer token can
    /// be obtained, nothing is sent and every recipient is reported failed.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::Recipients` if the recipient collection
    /// cannot be read. Individual send failures are reported, not returned.
    #[instrument(skip_all, fields(product = %product_name))]
    pub async fn notify_all_recipients(
        &self,
        product_name: &str,
        image_url: &str,
    ) -> Result<DispatchReport, NotificationError> {
        let recipients = self.recipient_tokens().await?;

        if recipients.is_empty() {
            info!("No recipients registered; nothing to send");
            return Ok(DispatchReport::default());
        }

        let token = match self.inner.credentials.get_valid_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!(
                    error = %e,
                    recipients = recipients.len(),
                    "No access token; skipping dispatch"
                );
                let error = SendError::Credential(e.to_string()).to_string();
                return Ok(DispatchReport {
                    outcomes: recipients
                        .into_iter()
                        .map(|recipient| RecipientOutcome {
                            recipient,
                            status: DeliveryStatus::Failed {
                                error: error.clone(),
                            },
                        })
                        .collect(),
                });
            }
        };

        let bearer = &token.value;
        let transport = &self.inner.transport;

        let outcomes: Vec<RecipientOutcome> = futures::stream::iter(recipients)
            .map(|recipient| async move {
                let request = SendRequest::new_product(recipient.as_str(), product_name, image_url);
                let status = match transport.send(bearer, &request).await {
                    Ok(message_name) => {
                        debug!(token = %token_hint(&recipient), "Notification sent");
                        DeliveryStatus::Delivered { message_name }
                    }
                    Err(e) => {
                        warn!(token = %token_hint(&recipient), error = %e, "Notification failed");
                        DeliveryStatus::Failed {
                            error: e.to_string(),
                        }
                    }
                };
                RecipientOutcome { recipient, status }
            })
            .buffer_unordered(self.inner.max_concurrency)
            .collect()
            .await;

        let report = DispatchReport { outcomes };
        info!(
            recipients = report.len(),
            delivered = report.delivered(),
            failed = report.failed(),
            "Notification dispatch complete"
        );

        Ok(report)
    }

    /// Run [`notify_all_recipients`](Self::notify_all_recipients) on a
    /// background task and return immediately.
    pub fn spawn_notify_all_recipients(
        &self,
        product_name: String,
        image_url: String,
    ) -> JoinHandle<Result<DispatchReport, NotificationError>> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let result = dispatcher
                .notify_all_recipients(&product_name, &image_url)
                .await;
            if let Err(ref e) = result {
                warn!(
                    error = %e,
                    product = %product_name,
                    "Background notification dispatch failed"
                );
            }
            result
        })
    }
}

/// Leading characters of a token, safe to log or print.
#[must_use]
pub fn token_hint(token: &RecipientToken) -> String {
    token.as_str().chars().take(8).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use secrecy::{ExposeSecret, SecretString};
    use serde_json::json;

    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::credentials::{AccessToken, CredentialError, StaticTokenSource, TokenSource};

    const RECIPIENTS: &str = "USER_FCM_TOKEN";

    /// Records every send; fails for tokens in `failing`.
    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(String, SendRequest)>>,
        failing: Vec<String>,
    }

    #[async_trait]
    impl MessagingTransport for RecordingTransport {
        async fn send(
            &self,
            bearer: &SecretString,
            request: &SendRequest,
        ) -> Result<Option<String>, SendError> {
            self.sent
                .lock()
                .unwrap()
                .push((bearer.expose_secret().to_string(), request.clone()));
            if self.failing.contains(&request.message.token) {
                return Err(SendError::Status {
                    status: 404,
                    body: "UNREGISTERED".to_string(),
                });
            }
            Ok(Some(format!("messages/{}", request.message.token)))
        }
    }

    /// Holds the send for `stalled` until `release` fires, then fails it.
    struct StallingTransport {
        stalled: String,
        release: tokio::sync::Notify,
        delivered: tokio::sync::Notify,
        sent: Mutex<Vec<String>>,
    }

    impl StallingTransport {
        fn new(stalled: &str) -> Self {
            Self {
                stalled: stalled.to_string(),
                release: tokio::sync::Notify::new(),
                delivered: tokio::sync::Notify::new(),
                sent: Mutex::default(),
            }
        }
    }

    #[async_trait]
    impl MessagingTransport for StallingTransport {
        async fn send(
            &self,
            _bearer: &SecretString,
            request: &SendRequest,
        ) -> Result<Option<String>, SendError> {
            self.sent.lock().unwrap().push(request.message.token.clone());
            if request.message.token == self.stalled {
                self.release.notified().await;
                return Err(SendError::Status {
                    status: 503,
                    body: "UNAVAILABLE".to_string(),
                });
            }
            self.delivered.notify_one();
            Ok(Some(format!("messages/{}", request.message.token)))
        }
    }

    struct FailingSource(Arc<AtomicUsize>);

    #[async_trait]
    impl TokenSource for FailingSource {
        async fn fetch_token(&self) -> Result<AccessToken, CredentialError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(CredentialError::ExchangeFailed("invalid_grant".to_string()))
        }
    }

    async fn backend_with(tokens: &[&str]) -> InMemoryBackend {
        let backend = InMemoryBackend::new();
        for (i, token) in tokens.iter().enumerate() {
            backend
                .insert_document(RECIPIENTS, &format!("r{i}"), json!({ "token": token }))
                .await;
        }
        backend
    }

    fn dispatcher(
        backend: InMemoryBackend,
        credentials: CredentialProvider,
        transport: Arc<RecordingTransport>,
    ) -> NotificationDispatcher {
        NotificationDispatcher::new(Arc::new(backend), credentials, transport, RECIPIENTS, 4)
    }

    fn static_credentials() -> CredentialProvider {
        CredentialProvider::new(StaticTokenSource::new("ya29.test"))
    }

    #[tokio::test]
    async fn test_sends_one_message_per_recipient() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = dispatcher(
            backend_with(&["tok-a", "tok-b", "tok-c"]).await,
            static_credentials(),
            Arc::clone(&transport),
        );

        let report = dispatcher
            .notify_all_recipients("Pen", "https://img/pen.png")
            .await
            .unwrap();

        assert_eq!(report.len(), 3);
        assert_eq!(report.delivered(), 3);

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        for (bearer, request) in sent.iter() {
            assert_eq!(bearer, "ya29.test");
            assert_eq!(request.message.notification.body, "Check out new product: Pen");
            assert_eq!(request.message.notification.image, "https://img/pen.png");
        }
    }

    #[tokio::test]
    async fn test_no_recipients_is_a_no_op() {
        let transport = Arc::new(RecordingTransport::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(
            InMemoryBackend::new(),
            CredentialProvider::new(FailingSource(Arc::clone(&calls))),
            Arc::clone(&transport),
        );

        let report = dispatcher.notify_all_recipients("Pen", "").await.unwrap();

        assert!(report.is_empty());
        assert!(transport.sent.lock().unwrap().is_empty());
        // No token is requested when there is nobody to notify
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_others() {
        let transport = Arc::new(RecordingTransport {
            failing: vec!["tok-a".to_string()],
            ..Default::default()
        });
        let dispatcher = dispatcher(
            backend_with(&["tok-a", "tok-b"]).await,
            static_credentials(),
            Arc::clone(&transport),
        );

        let report = dispatcher.notify_all_recipients("Pen", "").await.unwrap();

        assert_eq!(report.delivered(), 1);
        assert_eq!(report.failed(), 1);
        assert!(!report.outcome_for("tok-a").unwrap().is_delivered());
        assert_eq!(
            report.outcome_for("tok-b").unwrap().status,
            DeliveryStatus::Delivered {
                message_name: Some("messages/tok-b".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_stalled_recipient_does_not_block_others() {
        let transport = Arc::new(StallingTransport::new("tok-a"));
        // A limit of 1 is raised to MIN_CONCURRENCY
        let dispatcher = NotificationDispatcher::new(
            Arc::new(backend_with(&["tok-a", "tok-b"]).await),
            static_credentials(),
            Arc::clone(&transport) as Arc<dyn MessagingTransport>,
            RECIPIENTS,
            1,
        );

        let handle = dispatcher.spawn_notify_all_recipients("Pen".to_string(), String::new());

        tokio::time::timeout(Duration::from_secs(5), transport.delivered.notified())
            .await
            .expect("tok-b should be delivered while tok-a is stalled");
        assert!(!handle.is_finished());
        let mut sent = transport.sent.lock().unwrap().clone();
        sent.sort();
        assert_eq!(sent, vec!["tok-a", "tok-b"]);

        transport.release.notify_one();
        let report = handle.await.unwrap().unwrap();

        assert!(report.outcome_for("tok-b").unwrap().is_delivered());
        assert!(!report.outcome_for("tok-a").unwrap().is_delivered());
    }

    #[tokio::test]
    async fn test_credential_failure_sends_nothing() {
        let transport = Arc::new(RecordingTransport::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(
            backend_with(&["tok-a", "tok-b"]).await,
            CredentialProvider::new(FailingSource(Arc::clone(&calls))),
            Arc::clone(&transport),
        );

        let report = dispatcher.notify_all_recipients("Pen", "").await.unwrap();

        assert_eq!(report.len(), 2);
        assert_eq!(report.failed(), 2);
        assert!(transport.sent.lock().unwrap().is_empty());
        match &report.outcomes[0].status {
            DeliveryStatus::Failed { error } => assert!(error.contains("invalid_grant")),
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_documents_without_token_are_skipped() {
        let backend = backend_with(&["tok-a"]).await;
        backend
            .insert_document(RECIPIENTS, "bad-1", json!({ "token": 42 }))
            .await;
        backend
            .insert_document(RECIPIENTS, "bad-2", json!({ "other": "x" }))
            .await;
        let dispatcher = dispatcher(
            backend,
            static_credentials(),
            Arc::new(RecordingTransport::default()),
        );

        let tokens = dispatcher.recipient_tokens().await.unwrap();
        assert_eq!(tokens, vec![RecipientToken::new("tok-a")]);
    }

    #[tokio::test]
    async fn test_recipient_load_failure_is_returned() {
        let backend = backend_with(&["tok-a"]).await;
        backend.set_failure(Some("unavailable")).await;
        let dispatcher = dispatcher(
            backend,
            static_credentials(),
            Arc::new(RecordingTransport::default()),
        );

        let err = dispatcher.notify_all_recipients("Pen", "").await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to load recipients: unavailable");
    }

    #[tokio::test]
    async fn test_spawned_dispatch_completes() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = dispatcher(
            backend_with(&["tok-a"]).await,
            static_credentials(),
            Arc::clone(&transport),
        );

        let handle = dispatcher.spawn_notify_all_recipients("Pen".to_string(), String::new());
        let report = handle.await.unwrap().unwrap();

        assert_eq!(report.delivered(), 1);
    }

    #[test]
    fn test_token_hint_truncates() {
        assert_eq!(token_hint(&RecipientToken::new("abcdefghijkl")), "abcdefgh");
        assert_eq!(token_hint(&RecipientToken::new("abc")), "abc");
    }
}
