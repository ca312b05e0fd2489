//! Shared application state.
//!
//! Wires configuration, backends, credentials and the dispatcher into one
//! cheaply clonable handle.

use std::sync::Arc;

use crate::backend::{BlobStore, CloudStorageClient, DocumentStore, FirestoreClient};
use crate::config::AdminConfig;
use crate::credentials::{
    CLOUD_PLATFORM_SCOPE, CredentialProvider, MESSAGING_SCOPE, ServiceAccountTokenSource,
};
use crate::gateway::CatalogGateway;
use crate::notifications::{HttpTransport, MessagingTransport, NotificationDispatcher};
use crate::use_cases::CatalogUseCases;

/// Application state shared across commands.
#[derive(Clone)]
pub struct AdminState {
    inner: Arc<AdminStateInner>,
}

struct AdminStateInner {
    config: AdminConfig,
    use_cases: CatalogUseCases,
    dispatcher: NotificationDispatcher,
    messaging_credentials: CredentialProvider,
}

impl std::fmt::Debug for AdminState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminState")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl AdminState {
    /// Assemble state from explicit parts.
    #[must_use]
    pub fn new(
        config: AdminConfig,
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        messaging_credentials: CredentialProvider,
        transport: Arc<dyn MessagingTransport>,
    ) -> Self {
        let gateway = CatalogGateway::new(
            Arc::clone(&documents),
            blobs,
            config.collections.clone(),
            config.empty_image_policy,
        );

        let dispatcher = NotificationDispatcher::new(
            documents,
            messaging_credentials.clone(),
            transport,
            config.collections.recipients.clone(),
            config.notify_max_concurrency,
        );

        Self {
            inner: Arc::new(AdminStateInner {
                config,
                use_cases: CatalogUseCases::new(Arc::new(gateway)),
                dispatcher,
                messaging_credentials,
            }),
        }
    }

    /// Build state against the live Firebase project.
    ///
    /// Starts fetching the messaging token in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn from_config(config: AdminConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        let key_path = &config.firebase.credentials_path;
        let backend_credentials = CredentialProvider::new(ServiceAccountTokenSource::new(
            client.clone(),
            key_path,
            CLOUD_PLATFORM_SCOPE,
        ));
        let messaging_credentials = CredentialProvider::new(ServiceAccountTokenSource::new(
            client.clone(),
            key_path,
            MESSAGING_SCOPE,
        ));
        messaging_credentials.start();

        let firestore = FirestoreClient::new(
            client.clone(),
            backend_credentials.clone(),
            &config.firebase.project_id,
        );
        let storage = CloudStorageClient::new(
            client.clone(),
            backend_credentials,
            &config.firebase.storage_bucket,
        );
        let transport = HttpTransport::new(client, &config.firebase.project_id);

        tracing::info!(
            project = %config.firebase.project_id,
            bucket = %config.firebase.storage_bucket,
            "Firebase services configured"
        );

        Ok(Self::new(
            config,
            Arc::new(firestore),
            Arc::new(storage),
            messaging_credentials,
            Arc::new(transport),
        ))
    }

    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn use_cases(&self) -> &CatalogUseCases {
        &self.inner.use_cases
    }

    #[must_use]
    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.inner.dispatcher
    }

    /// Credentials used for messaging requests.
    #[must_use]
    pub fn messaging_credentials(&self) -> &CredentialProvider {
        &self.inner.messaging_credentials
    }
}
