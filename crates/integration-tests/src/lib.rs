//! Integration tests for Shopping Admin.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopping-admin-integration-tests
//! ```
//!
//! Everything runs against [`InMemoryBackend`] and a [`RecordingTransport`];
//! no Firebase project is needed.
//!
//! # Test Categories
//!
//! - `catalog_flow` - use cases through the gateway and progress streams
//! - `notification_flow` - recipient fan-out and failure isolation

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use secrecy::SecretString;
use shopping_admin::backend::InMemoryBackend;
use shopping_admin::config::{AdminConfig, ConfigError};
use shopping_admin::credentials::{CredentialProvider, StaticTokenSource};
use shopping_admin::notifications::{MessagingTransport, SendError, SendRequest};
use shopping_admin::state::AdminState;

/// Bearer token handed out by test credentials.
pub const TEST_BEARER: &str = "test-bearer";

/// Configuration with every optional value at its default.
///
/// # Errors
///
/// Never fails in practice; required variables are supplied.
pub fn test_config() -> Result<AdminConfig, ConfigError> {
    AdminConfig::from_lookup(|key| match key {
        "FIREBASE_PROJECT_ID" => Some("integration".to_string()),
        "GOOGLE_APPLICATION_CREDENTIALS" => Some("/dev/null".to_string()),
        _ => None,
    })
}

/// Messaging transport that records every request and fails chosen tokens.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SendRequest>>,
    failing: HashSet<String>,
}

impl RecordingTransport {
    /// Transport that rejects sends to any of `tokens`.
    #[must_use]
    pub fn failing_for(tokens: &[&str]) -> Self {
        Self {
            sent: Mutex::default(),
            failing: tokens.iter().map(|t| (*t).to_string()).collect(),
        }
    }

    /// Every request received so far, in arrival order.
    pub fn sent(&self) -> Vec<SendRequest> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Tokens that were sent to, sorted.
    pub fn sent_tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = self
            .sent()
            .into_iter()
            .map(|request| request.message.token)
            .collect();
        tokens.sort();
        tokens
    }
}

#[async_trait]
impl MessagingTransport for RecordingTransport {
    async fn send(
        &self,
        _bearer: &SecretString,
        request: &SendRequest,
    ) -> Result<Option<String>, SendError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if self.failing.contains(&request.message.token) {
            return Err(SendError::Status {
                status: 404,
                body: "Requested entity was not found.".to_string(),
            });
        }
        Ok(Some(format!(
            "projects/integration/messages/{}",
            request.message.token
        )))
    }
}

/// A fully wired state over an in-memory store.
pub struct TestContext {
    pub backend: InMemoryBackend,
    pub transport: Arc<RecordingTransport>,
    pub state: AdminState,
}

impl TestContext {
    /// Context with a transport that accepts every send.
    ///
    /// # Errors
    ///
    /// Returns an error if the test configuration cannot be built.
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_transport(RecordingTransport::default())
    }

    /// Context with the given transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the test configuration cannot be built.
    pub fn with_transport(transport: RecordingTransport) -> Result<Self, ConfigError> {
        Ok(Self::with_parts(
            test_config()?,
            CredentialProvider::new(StaticTokenSource::new(TEST_BEARER)),
            transport,
        ))
    }

    /// Context with explicit configuration and credentials.
    #[must_use]
    pub fn with_parts(
        config: AdminConfig,
        credentials: CredentialProvider,
        transport: RecordingTransport,
    ) -> Self {
        let backend = InMemoryBackend::new();
        let transport = Arc::new(transport);
        let state = AdminState::new(
            config,
            Arc::new(backend.clone()),
            Arc::new(backend.clone()),
            credentials,
            Arc::clone(&transport) as Arc<dyn MessagingTransport>,
        );

        Self {
            backend,
            transport,
            state,
        }
    }

    /// Register device tokens in the recipient collection.
    pub async fn register_recipients(&self, tokens: &[&str]) {
        let collection = &self.state.config().collections.recipients;
        for (i, token) in tokens.iter().enumerate() {
            self.backend
                .insert_document(
                    collection,
                    &format!("recipient-{i}"),
                    serde_json::json!({ "token": token }),
                )
                .await;
        }
    }
}
