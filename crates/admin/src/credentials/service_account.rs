//! Google service-account authentication.
//!
//! Signs an RS256 JWT assertion with the service account's private key and
//! exchanges it for an access token at the key's `token_uri`
//! (the OAuth2 JWT-bearer grant).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{AccessToken, CredentialError, TokenSource};

/// Default Google OAuth2 token endpoint.
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// OAuth2 grant type for JWT-bearer assertions.
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime of a signed assertion. Google rejects anything over an hour.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// A parsed service-account key file.
#[derive(Clone)]
pub struct ServiceAccountKey {
    /// Service account email, used as the assertion issuer.
    pub client_email: String,
    /// Key id, sent as the JWT `kid` header.
    pub private_key_id: Option<String>,
    /// PEM-encoded RSA private key.
    pub private_key: SecretString,
    /// OAuth2 token endpoint.
    pub token_uri: String,
    /// Project the account belongs to.
    pub project_id: Option<String>,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"[REDACTED]")
            .field("token_uri", &self.token_uri)
            .field("project_id", &self.project_id)
            .finish()
    }
}

/// Key file as stored on disk.
#[derive(Deserialize)]
struct RawServiceAccountKey {
    #[serde(rename = "type", default)]
    key_type: Option<String>,
    client_email: String,
    private_key: String,
    #[serde(default)]
    private_key_id: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
    #[serde(default)]
    project_id: Option<String>,
}

/// JWT claims for the assertion.
#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

/// Successful token endpoint response.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    /// Token lifetime in seconds.
    expires_in: i64,
}

/// OAuth2 error response.
#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl ServiceAccountKey {
    /// Parse a key from the JSON downloaded from the Cloud console.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::InvalidKey` if the JSON is malformed or is
    /// not a service-account key.
    pub fn from_json(json: &str) -> Result<Self, CredentialError> {
        let raw: RawServiceAccountKey =
            serde_json::from_str(json).map_err(|e| CredentialError::InvalidKey(e.to_string()))?;

        if let Some(key_type) = raw.key_type.as_deref()
            && key_type != "service_account"
        {
            return Err(CredentialError::InvalidKey(format!(
                "expected type service_account, found {key_type}"
            )));
        }

        Ok(Self {
            client_email: raw.client_email,
            private_key_id: raw.private_key_id,
            private_key: SecretString::from(raw.private_key),
            token_uri: raw
                .token_uri
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            project_id: raw.project_id,
        })
    }

    /// Read and parse a key file.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::KeyRead` if the file cannot be read, or
    /// `CredentialError::InvalidKey` if it cannot be parsed.
    pub async fn from_file(path: &Path) -> Result<Self, CredentialError> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }

    /// Sign a JWT assertion requesting `scope`, issued at `now`.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::Signing` if the private key is not a valid
    /// RSA PEM key.
    pub fn sign_assertion(&self, scope: &str, now: i64) -> Result<String, CredentialError> {
        let key = EncodingKey::from_rsa_pem(self.private_key.expose_secret().as_bytes())?;

        let mut header = Header::new(Algorithm::RS256);
        header.kid.clone_from(&self.private_key_id);

        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: scope.to_string(),
            aud: self.token_uri.clone(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        Ok(jsonwebtoken::encode(&header, &claims, &key)?)
    }
}

/// Exchange a signed assertion for an access token.
///
/// # Errors
///
/// Returns `CredentialError::ExchangeFailed` if the endpoint rejects the
/// assertion, or `CredentialError::UnsupportedTokenType` if it hands back
/// something other than a bearer token.
#[instrument(skip(client, assertion), fields(token_uri = %token_uri))]
pub async fn exchange_assertion(
    client: &reqwest::Client,
    token_uri: &str,
    assertion: &str,
    scope: &str,
) -> Result<AccessToken, CredentialError> {
    let now = chrono::Utc::now().timestamp();

    let response = client
        .post(token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion)])
        .send()
        .await?;

    let status = response.status();

    if status.is_success() {
        let token: TokenResponse = response.json().await?;

        if let Some(token_type) = token.token_type.as_deref()
            && !token_type.eq_ignore_ascii_case("bearer")
        {
            return Err(CredentialError::UnsupportedTokenType(token_type.to_string()));
        }

        Ok(AccessToken {
            value: SecretString::from(token.access_token),
            scope: scope.to_string(),
            expires_at: now + token.expires_in,
        })
    } else {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let message = match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(TokenErrorResponse {
                error,
                error_description: Some(description),
            }) => format!("{error}: {description}"),
            Ok(TokenErrorResponse { error, .. }) => error,
            Err(_) => format!("HTTP {status}: {body}"),
        };

        Err(CredentialError::ExchangeFailed(message))
    }
}

/// Token source backed by a service-account key file.
///
/// The key file is re-read on every fetch so a rotated key is picked up
/// without a restart.
#[derive(Debug, Clone)]
pub struct ServiceAccountTokenSource {
    client: reqwest::Client,
    key_path: PathBuf,
    scope: String,
}

impl ServiceAccountTokenSource {
    /// Create a source for `scope` using the key at `key_path`.
    #[must_use]
    pub fn new(client: reqwest::Client, key_path: impl Into<PathBuf>, scope: &str) -> Self {
        Self {
            client,
            key_path: key_path.into(),
            scope: scope.to_string(),
        }
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    #[instrument(skip(self), fields(scope = %self.scope))]
    async fn fetch_token(&self) -> Result<AccessToken, CredentialError> {
        let key = ServiceAccountKey::from_file(&self.key_path).await?;
        let assertion = key.sign_assertion(&self.scope, chrono::Utc::now().timestamp())?;
        exchange_assertion(&self.client, &key.token_uri, &assertion, &self.scope).await
    }
}
