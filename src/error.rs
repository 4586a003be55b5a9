//! Error types for the voice stream gateway

use std::fmt;

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage that talks to an upstream service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Transcribe,
    Respond,
    Synthesize,
}

impl Stage {
    /// Stage name used in logs and error messages
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transcribe => "transcribe",
            Self::Respond => "respond",
            Self::Synthesize => "synthesize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in the gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Declared MIME type cannot be mapped to an accepted container
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Speech-to-text failed (network, quota, malformed audio)
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),

    /// Chat completion or speech synthesis failed
    #[error("{stage} failed: {message}")]
    Upstream { stage: Stage, message: String },

    /// Chunk arrived for a client with no open stream
    #[error("no active stream for client {0}")]
    UnknownSession(String),

    /// Malformed wire payload
    #[error("invalid payload: {0}")]
    Payload(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Build an upstream failure for the given stage
    pub fn upstream(stage: Stage, message: impl Into<String>) -> Self {
        Self::Upstream {
            stage,
            message: message.into(),
        }
    }

    /// Pipeline stage this error originated in, if any
    #[must_use]
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::TranscriptionFailed(_) => Some(Stage::Transcribe),
            Self::Upstream { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_message_names_stage() {
        let err = Error::upstream(Stage::Synthesize, "429 Too Many Requests");
        assert_eq!(err.to_string(), "synthesize failed: 429 Too Many Requests");
        assert_eq!(err.stage(), Some(Stage::Synthesize));
    }

    #[test]
    fn transcription_failure_maps_to_transcribe_stage() {
        let err = Error::TranscriptionFailed("bad audio".to_string());
        assert_eq!(err.stage(), Some(Stage::Transcribe));
        assert!(Error::UnsupportedFormat("x".to_string()).stage().is_none());
    }
}
