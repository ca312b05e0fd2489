//! CLI command implementations.

pub mod category;
pub mod notify;
pub mod product;
pub mod seed;

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use secrecy::SecretString;
use shopping_admin::backend::InMemoryBackend;
use shopping_admin::config::{AdminConfig, ConfigError};
use shopping_admin::credentials::{CredentialProvider, StaticTokenSource};
use shopping_admin::notifications::{MessagingTransport, SendError, SendRequest};
use shopping_admin::state::AdminState;
use shopping_admin::stream::{CANCELLED_MESSAGE, ProgressStream};
use shopping_admin_core::ProgressEvent;
use tracing::info;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Project id used when `--dry-run` has no real project configured.
const DRY_RUN_PROJECT: &str = "dry-run";

/// Load configuration, filling in the Firebase settings a dry run never uses.
pub fn load_config(dry_run: bool) -> Result<AdminConfig, ConfigError> {
    if !dry_run {
        return AdminConfig::from_env();
    }

    let _ = dotenvy::dotenv();
    AdminConfig::from_lookup(|key| {
        std::env::var(key).ok().or_else(|| match key {
            "FIREBASE_PROJECT_ID" => Some(DRY_RUN_PROJECT.to_string()),
            "GOOGLE_APPLICATION_CREDENTIALS" => Some(String::from("/dev/null")),
            _ => None,
        })
    })
}

/// Build application state, in memory for dry runs.
pub fn build_state(
    config: AdminConfig,
    dry_run: bool,
) -> Result<AdminState, Box<dyn std::error::Error>> {
    if !dry_run {
        return Ok(AdminState::from_config(config)?);
    }

    info!("Dry run: using in-memory store, notifications are logged only");
    let backend = InMemoryBackend::new();
    Ok(AdminState::new(
        config,
        Arc::new(backend.clone()),
        Arc::new(backend),
        CredentialProvider::new(StaticTokenSource::new(DRY_RUN_PROJECT)),
        Arc::new(LoggingTransport),
    ))
}

/// Drive a progress stream to completion, printing each event.
pub async fn follow<T>(label: &str, mut stream: ProgressStream<T>) -> Result<T, String> {
    while let Some(event) = stream.next().await {
        match event {
            ProgressEvent::Loading => println!("{label}: working..."),
            ProgressEvent::Success { value } => return Ok(value),
            ProgressEvent::Error { message } => {
                println!("{label}: failed: {message}");
                return Err(format!("{label}: {message}"));
            }
        }
    }
    Err(format!("{label}: {CANCELLED_MESSAGE}"))
}

/// Transport that logs messages instead of sending them.
struct LoggingTransport;

#[async_trait]
impl MessagingTransport for LoggingTransport {
    async fn send(
        &self,
        _bearer: &SecretString,
        request: &SendRequest,
    ) -> Result<Option<String>, SendError> {
        let notification = &request.message.notification;
        info!(
            token = %request.message.token,
            title = %notification.title,
            body = %notification.body,
            image = %notification.image,
            "Dry run: notification not sent"
        );
        Ok(None)
    }
}
