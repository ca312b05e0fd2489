//! Notification recipient tokens.

use serde::{Deserialize, Serialize};

/// Opaque device token identifying one notification-capable device.
///
/// Stored one document per token under the `token` field. Tokens are not
/// deduplicated and carry no expiry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientToken(String);

impl RecipientToken {
    /// Wrap a raw device token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the raw token string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecipientToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RecipientToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}
