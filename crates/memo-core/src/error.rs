//! Error types for the memo cache adapter.

use thiserror::Error;

/// Boxed error produced by a transform stage.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    // Transform errors
    #[error("Encode failed in stage '{stage}': {source}")]
    Encode {
        stage: String,
        #[source]
        source: BoxError,
    },

    #[error("Decode failed in stage '{stage}': {source}")]
    Decode {
        stage: String,
        #[source]
        source: BoxError,
    },

    // Backend errors
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Purge failed for {failed} of {total} keys: {first}")]
    PartialPurge {
        failed: usize,
        total: usize,
        #[source]
        first: Box<Error>,
    },

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build an encode error for the named stage.
    pub fn encode(stage: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Encode {
            stage: stage.into(),
            source: source.into(),
        }
    }

    /// Build a decode error for the named stage.
    pub fn decode(stage: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Decode {
            stage: stage.into(),
            source: source.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }

    pub fn is_encode(&self) -> bool {
        matches!(self, Error::Encode { .. })
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode { .. })
    }

    pub fn is_backend(&self) -> bool {
        matches!(self, Error::Backend(_))
    }

    /// Stage name for encode/decode failures.
    pub fn stage(&self) -> Option<&str> {
        match self {
            Error::Encode { stage, .. } | Error::Decode { stage, .. } => Some(stage),
            _ => None,
        }
    }
}
