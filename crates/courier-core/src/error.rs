//! Unified error types for Courier.

use thiserror::Error;

/// Result type alias using CourierError.
pub type Result<T> = std::result::Result<T, CourierError>;

#[derive(Error, Debug)]
pub enum CourierError {
    // Store errors
    #[error("Store error: {0}")]
    Store(String),

    // Transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Transport not connected: {0}")]
    TransportNotConnected(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    // Template rendering errors
    #[error("Compose error: {0}")]
    Compose(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl CourierError {
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn compose(msg: impl Into<String>) -> Self {
        Self::Compose(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
