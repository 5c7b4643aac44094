//! Error types for moodtrace

use thiserror::Error;

/// Errors surfaced by the session facade.
///
/// Sensor irregularities never show up here; they are absorbed by the
/// metrics accumulator. The only lifecycle failure is using a session that
/// was never started or has already been torn down.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No active session: the engine must be used within a running session")]
    Uninitialized,

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse export payload: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No async runtime to host the session: {0}")]
    Runtime(String),

    #[error("Session read failed: the reader panicked")]
    ReadPanicked,
}
