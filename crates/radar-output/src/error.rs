//! Forwarding errors.

use thiserror::Error;

/// Errors from [`ReliableForwarder`](crate::ReliableForwarder).
///
/// Individual failed attempts are never surfaced; they are logged and
/// retried according to the [`RetryPolicy`](crate::RetryPolicy).
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Invalid header '{name}': {message}")]
    InvalidHeader { name: String, message: String },

    #[error("Gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}
