//! Error types for the ITWS bridge.

use thiserror::Error;

/// Result type alias using WxError.
pub type WxResult<T> = Result<T, WxError>;

/// Primary error type shared by the bridge crates.
#[derive(Debug, Error)]
pub enum WxError {
    // === Configuration Errors ===
    #[error("Missing required setting: {0}")]
    MissingSetting(String),

    #[error("Invalid value for '{key}': {message}")]
    InvalidSetting { key: String, message: String },

    // === Transport Errors ===
    #[error("Queue error: {0}")]
    QueueError(String),

    // === Output Errors ===
    #[error("Encoding failed: {0}")]
    EncodeError(String),

    // === Infrastructure Errors ===
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl WxError {
    /// Whether the error is raised once at startup and should abort the process.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WxError::MissingSetting(_) | WxError::InvalidSetting { .. }
        )
    }
}

impl From<std::io::Error> for WxError {
    fn from(err: std::io::Error) -> Self {
        WxError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for WxError {
    fn from(err: serde_json::Error) -> Self {
        WxError::EncodeError(format!("JSON error: {}", err))
    }
}
