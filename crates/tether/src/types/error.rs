/*! Error types for Tether operations. */

use super::BackendState;

/// Errors that can occur while managing the backend or the window.
#[derive(Debug, thiserror::Error)]
pub enum TetherError {
  #[error("Backend already started (state: {0})")]
  AlreadyStarted(BackendState),

  #[error("Backend is not running")]
  NotRunning,

  #[error("Failed to spawn backend {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("Bridge relay is disabled for this backend")]
  RelayDisabled,

  #[error("Bridge relay closed: {0}")]
  Relay(String),

  #[error("Failed to encode bridge message: {0}")]
  Encode(#[from] serde_json::Error),

  #[error("Window error: {0}")]
  Window(String),

  #[error("Failed to load {path}: {reason}")]
  ContentLoad { path: String, reason: String },
}

/// Result type for Tether operations.
pub type TetherResult<T> = Result<T, TetherError>;
