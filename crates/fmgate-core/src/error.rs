//! Error types for the gain controller

use thiserror::Error;

/// Errors that can occur while loading or watching configuration.
///
/// None of these are fatal to the controller: config errors fall back to
/// defaults and transport errors feed the reconnect machinery. The enum
/// exists so the daemon boundary can decide what is worth surfacing.
#[derive(Debug, Error)]
pub enum GateError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parse or render error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Structurally invalid configuration document
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// File watch error
    #[error("file watch error: {0}")]
    Watch(#[from] notify::Error),
}
