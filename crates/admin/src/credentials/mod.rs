//! OAuth2 bearer credentials for Google APIs.
//!
//! A [`CredentialProvider`] caches one access token and refreshes it on
//! demand through a [`TokenSource`]:
//!
//! - [`ServiceAccountTokenSource`] - service-account key → signed JWT → token
//! - [`StaticTokenSource`] - a fixed token (emulators, tests)
//!
//! # Lifecycle
//!
//! `Uninitialized → Fetching → Ready`, with `Failed` after an unsuccessful
//! attempt. A failed attempt leaves the previously cached token in place and
//! is retried on the next [`CredentialProvider::get_valid_token`] call.

pub mod service_account;

pub use service_account::{ServiceAccountKey, ServiceAccountTokenSource};

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// OAuth2 scope for Firebase Cloud Messaging.
pub const MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

/// OAuth2 scope covering Firestore and Cloud Storage.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Tokens this close to expiry are refreshed before use.
const REFRESH_BUFFER_SECS: i64 = 60;

/// Errors that can occur while obtaining an access token.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The service-account key file could not be read.
    #[error("Failed to read service account key: {0}")]
    KeyRead(#[from] std::io::Error),

    /// The service-account key file is not a usable key.
    #[error("Invalid service account key: {0}")]
    InvalidKey(String),

    /// Signing the JWT assertion failed.
    #[error("Failed to sign assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The token endpoint rejected the exchange.
    #[error("Token exchange failed: {0}")]
    ExchangeFailed(String),

    /// The token endpoint returned a non-bearer token.
    #[error("Unsupported token type: {0}")]
    UnsupportedTokenType(String),
}

/// An OAuth2 access token with its scope and expiry.
#[derive(Clone)]
pub struct AccessToken {
    /// Bearer token value.
    pub value: SecretString,
    /// Space-separated scopes the token was requested for.
    pub scope: String,
    /// Unix timestamp when the token expires.
    pub expires_at: i64,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AccessToken {
    /// Check if the token has expired.
    ///
    /// Tokens with less than a minute left count as expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_within(REFRESH_BUFFER_SECS)
    }

    /// Check if the token will expire within the given number of seconds.
    #[must_use]
    pub fn expires_within(&self, seconds: i64) -> bool {
        let now = chrono::Utc::now().timestamp();
        now >= self.expires_at - seconds
    }
}

/// Lifecycle state of a [`CredentialProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// No fetch has been attempted.
    Uninitialized,
    /// A fetch is in flight.
    Fetching,
    /// The last fetch succeeded.
    Ready,
    /// The last fetch failed; the previous token (if any) is kept.
    Failed,
}

/// Something that can mint a fresh access token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Obtain a new access token.
    async fn fetch_token(&self) -> Result<AccessToken, CredentialError>;
}

/// A token source that always returns the same token.
///
/// Useful against local emulators, which accept any bearer token.
#[derive(Clone)]
pub struct StaticTokenSource {
    token: SecretString,
}

impl StaticTokenSource {
    /// Create a source that hands out `token`.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn fetch_token(&self) -> Result<AccessToken, CredentialError> {
        Ok(AccessToken {
            value: self.token.clone(),
            scope: String::new(),
            expires_at: i64::MAX,
        })
    }
}

/// Cached bearer credential with on-demand refresh.
///
/// Cloning shares the cache. Reads are concurrent; refreshes are serialized
/// so at most one token exchange is in flight.
#[derive(Clone)]
pub struct CredentialProvider {
    inner: Arc<CredentialProviderInner>,
}

struct CredentialProviderInner {
    source: Box<dyn TokenSource>,
    cache: RwLock<TokenCache>,
    refresh_lock: Mutex<()>,
}

struct TokenCache {
    token: Option<AccessToken>,
    state: CredentialState,
}

impl std::fmt::Debug for CredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialProvider").finish_non_exhaustive()
    }
}

impl CredentialProvider {
    /// Create a provider with an empty cache.
    #[must_use]
    pub fn new(source: impl TokenSource + 'static) -> Self {
        Self {
            inner: Arc::new(CredentialProviderInner {
                source: Box::new(source),
                cache: RwLock::new(TokenCache {
                    token: None,
                    state: CredentialState::Uninitialized,
                }),
                refresh_lock: Mutex::new(()),
            }),
        }
    }

    /// Start fetching the first token in the background.
    ///
    /// Failures are logged; the next `get_valid_token` call retries.
    pub fn start(&self) -> JoinHandle<()> {
        let provider = self.clone();
        tokio::spawn(async move {
            if let Err(e) = provider.refresh().await {
                warn!(error = %e, "Initial access token fetch failed");
            }
        })
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> CredentialState {
        self.inner.cache.read().await.state
    }

    /// The cached token, even if expired.
    pub async fn cached_token(&self) -> Option<AccessToken> {
        self.inner.cache.read().await.token.clone()
    }

    /// Return a token that is not about to expire, refreshing if necessary.
    ///
    /// # Errors
    ///
    /// Returns the token source's error if a refresh was needed and failed.
    pub async fn get_valid_token(&self) -> Result<AccessToken, CredentialError> {
        if let Some(token) = self.fresh_token().await {
            return Ok(token);
        }

        let _guard = self.inner.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock
        if let Some(token) = self.fresh_token().await {
            return Ok(token);
        }

        self.refresh_locked().await
    }

    /// Fetch a new token unconditionally.
    ///
    /// # Errors
    ///
    /// Returns the token source's error; the previous token stays cached.
    pub async fn refresh(&self) -> Result<AccessToken, CredentialError> {
        let _guard = self.inner.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn fresh_token(&self) -> Option<AccessToken> {
        self.inner
            .cache
            .read()
            .await
            .token
            .as_ref()
            .filter(|token| !token.is_expired())
            .cloned()
    }

    /// Must be called with `refresh_lock` held.
    #[instrument(skip(self))]
    async fn refresh_locked(&self) -> Result<AccessToken, CredentialError> {
        self.inner.cache.write().await.state = CredentialState::Fetching;

        match self.inner.source.fetch_token().await {
            Ok(token) => {
                let mut cache = self.inner.cache.write().await;
                cache.token = Some(token.clone());
                cache.state = CredentialState::Ready;
                info!(expires_at = token.expires_at, "Access token refreshed");
                Ok(token)
            }
            Err(e) => {
                self.inner.cache.write().await.state = CredentialState::Failed;
                warn!(error = %e, "Access token refresh failed");
                Err(e)
            }
        }
    }
}
