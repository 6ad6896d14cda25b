//! Error types for the notification processor.
//!
//! Only stdin decode failures, configuration problems, and unknown hook
//! events ever reach the process exit code. Everything else is logged and
//! swallowed by the dispatcher.

use std::path::PathBuf;

use thiserror::Error;

use crate::webhook::WebhookError;

/// Main application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Stdin did not contain a decodable hook input record.
    #[error("invalid hook input: {0}")]
    BadInput(String),

    /// Configuration failed to load or validate.
    #[error("configuration error: {0}")]
    Config(String),

    /// The CLI was invoked with a hook event outside the closed set.
    #[error("unknown hook event: {0}")]
    UnknownHookEvent(String),

    /// Local filesystem failure in the lock, state, or transcript layers.
    #[error("failed to {operation} '{}'", path.display())]
    Io {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// Desktop notification could not be delivered.
    #[error("desktop notification failed: {0}")]
    Desktop(String),

    #[error(transparent)]
    Webhook(#[from] WebhookError),
}

/// Convenience alias used throughout the crate.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }
}
