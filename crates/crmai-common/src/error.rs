//! Assistant Error Types
//!
//! Centralized error handling for all assistant components

use std::fmt;

/// Main error type for assistant operations
#[derive(Debug)]
pub enum AssistError {
    /// Generic error with message
    Generic(String),
    /// Request could not be completed (connection, timeout, body read)
    Transport(String),
    /// Backend answered with a non-success status
    Status { endpoint: String, status: u16 },
    /// The response stream carried an explicit error record
    Stream(String),
    /// Microphone could not be opened
    RecordingAcquisition(String),
    /// Voice input failed or produced no transcription
    Transcription(String),
    /// Speech synthesis, decoding or playback failed
    Playback(String),
    /// Configuration errors
    Config(String),
    /// Serialization/deserialization errors
    Serde(serde_json::Error),
}

impl AssistError {
    /// True for failures caused by the request/response transport itself.
    pub fn is_transport(&self) -> bool {
        matches!(self, AssistError::Transport(_) | AssistError::Status { .. })
    }
}

impl fmt::Display for AssistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssistError::Generic(msg) => write!(f, "Assistant error: {}", msg),
            AssistError::Transport(msg) => write!(f, "Transport error: {}", msg),
            AssistError::Status { endpoint, status } => {
                write!(f, "Request to {} failed with status {}", endpoint, status)
            }
            AssistError::Stream(msg) => write!(f, "Stream error: {}", msg),
            AssistError::RecordingAcquisition(msg) => {
                write!(f, "Recording acquisition error: {}", msg)
            }
            AssistError::Transcription(msg) => write!(f, "Transcription error: {}", msg),
            AssistError::Playback(msg) => write!(f, "Playback error: {}", msg),
            AssistError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AssistError::Serde(err) => write!(f, "Serialization error: {}", err),
        }
    }
}

impl std::error::Error for AssistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AssistError::Serde(err) => Some(err),
            _ => None,
        }
    }
}

/// Convenience result type for assistant operations
pub type Result<T> = std::result::Result<T, AssistError>;

impl From<serde_json::Error> for AssistError {
    fn from(err: serde_json::Error) -> Self {
        AssistError::Serde(err)
    }
}

impl From<anyhow::Error> for AssistError {
    fn from(err: anyhow::Error) -> Self {
        AssistError::Generic(err.to_string())
    }
}
