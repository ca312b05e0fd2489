//! Tri-state progress events reported by backend operations.

use serde::{Deserialize, Serialize};

/// Progress of a single backend operation.
///
/// Every operation reports `Loading` first and then exactly one terminal
/// event (`Success` or `Error`). Nothing is reported after the terminal event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProgressEvent<T> {
    /// The operation has started and has not finished yet.
    Loading,
    /// The operation finished successfully.
    Success {
        /// Value produced by the operation.
        value: T,
    },
    /// The operation failed.
    Error {
        /// Error text as reported by the backend.
        message: String,
    },
}

impl<T> ProgressEvent<T> {
    /// Build a success event.
    #[must_use]
    pub const fn success(value: T) -> Self {
        Self::Success { value }
    }

    /// Build an error event.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Returns true for `Success` and `Error`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Loading)
    }

    /// Convert a terminal event into a `Result`.
    ///
    /// Returns `None` for `Loading`.
    #[must_use]
    pub fn into_result(self) -> Option<Result<T, String>> {
        match self {
            Self::Loading => None,
            Self::Success { value } => Some(Ok(value)),
            Self::Error { message } => Some(Err(message)),
        }
    }
}

impl<T> From<Result<T, String>> for ProgressEvent<T> {
    fn from(result: Result<T, String>) -> Self {
        match result {
            Ok(value) => Self::Success { value },
            Err(message) => Self::Error { message },
        }
    }
}
