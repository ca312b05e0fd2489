//! Admin configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `FIREBASE_PROJECT_ID` - Firebase project the catalog lives in
//! - `GOOGLE_APPLICATION_CREDENTIALS` - Path to the service-account JSON key
//!
//! ## Optional
//! - `FIREBASE_STORAGE_BUCKET` - Storage bucket (default: `<project>.appspot.com`)
//! - `CATEGORY_COLLECTION` - Category collection (default: `Category`)
//! - `PRODUCT_COLLECTION` - Product collection (default: `Products`)
//! - `RECIPIENT_COLLECTION` - Device token collection (default: `USER_FCM_TOKEN`)
//! - `NOTIFY_MAX_CONCURRENCY` - Concurrent messaging requests (default: 16, minimum: 2)
//! - `HTTP_TIMEOUT_SECS` - Timeout for every outbound HTTP request (default: 30)
//! - `EMPTY_IMAGE_POLICY` - `upload-empty` (default) or `reject`
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::notifications::MIN_CONCURRENCY;

const DEFAULT_CATEGORY_COLLECTION: &str = "Category";
const DEFAULT_PRODUCT_COLLECTION: &str = "Products";
const DEFAULT_RECIPIENT_COLLECTION: &str = "USER_FCM_TOKEN";
const DEFAULT_NOTIFY_MAX_CONCURRENCY: usize = 16;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Admin client configuration.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Firebase project configuration
    pub firebase: FirebaseConfig,
    /// Document store collection names
    pub collections: CollectionNames,
    /// Maximum number of in-flight messaging requests per fan-out, at least 2
    pub notify_max_concurrency: usize,
    /// Timeout applied to every outbound HTTP request
    pub http_timeout: Duration,
    /// What to do when an image upload has no content
    pub empty_image_policy: EmptyImagePolicy,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
}

/// Firebase project configuration.
#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    /// Firebase project ID (used in Firestore and messaging URLs)
    pub project_id: String,
    /// Cloud Storage bucket holding uploaded images
    pub storage_bucket: String,
    /// Path to the service-account JSON key
    pub credentials_path: PathBuf,
}

/// Names of the document store collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionNames {
    /// Category documents; also the blob prefix for category images
    pub categories: String,
    /// Product documents; also the blob prefix for product images
    pub products: String,
    /// One document per notification recipient token
    pub recipients: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            categories: DEFAULT_CATEGORY_COLLECTION.to_string(),
            products: DEFAULT_PRODUCT_COLLECTION.to_string(),
            recipients: DEFAULT_RECIPIENT_COLLECTION.to_string(),
        }
    }
}

/// Handling of image uploads whose reference is missing or empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptyImagePolicy {
    /// Upload a zero-length object and return its URL.
    #[default]
    UploadEmpty,
    /// Fail the upload with an error event.
    Reject,
}

impl FromStr for EmptyImagePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upload-empty" | "upload_empty" => Ok(Self::UploadEmpty),
            "reject" => Ok(Self::Reject),
            other => Err(format!(
                "expected 'upload-empty' or 'reject', got '{other}'"
            )),
        }
    }
}

impl AdminConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let project_id = env.required("FIREBASE_PROJECT_ID")?;
        let storage_bucket = env.or_default(
            "FIREBASE_STORAGE_BUCKET",
            &format!("{project_id}.appspot.com"),
        );
        let credentials_path = PathBuf::from(env.required("GOOGLE_APPLICATION_CREDENTIALS")?);

        let collections = CollectionNames {
            categories: env.or_default("CATEGORY_COLLECTION", DEFAULT_CATEGORY_COLLECTION),
            products: env.or_default("PRODUCT_COLLECTION", DEFAULT_PRODUCT_COLLECTION),
            recipients: env.or_default("RECIPIENT_COLLECTION", DEFAULT_RECIPIENT_COLLECTION),
        };

        let notify_max_concurrency = env
            .parsed("NOTIFY_MAX_CONCURRENCY", DEFAULT_NOTIFY_MAX_CONCURRENCY)?
            .max(MIN_CONCURRENCY);
        let http_timeout =
            Duration::from_secs(env.parsed("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?);
        let empty_image_policy = env.parsed("EMPTY_IMAGE_POLICY", EmptyImagePolicy::default())?;

        Ok(Self {
            firebase: FirebaseConfig {
                project_id,
                storage_bucket,
                credentials_path,
            },
            collections,
            notify_max_concurrency,
            http_timeout,
            empty_image_policy,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Get an optional variable, treating blank values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |value| {
            value
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }
}
