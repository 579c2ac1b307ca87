//! Error taxonomy for the story pipeline
//!
//! Information Hiding:
//! - Per-attempt failures of the remote call stay inside the generation client
//! - Callers only see the pipeline-level error kinds

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Pipeline-level failure surfaced to callers
#[derive(Debug, Error)]
pub enum StoryError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("failed to generate content after {attempts} attempts: {last_error}")]
    Generation { attempts: u32, last_error: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("story generation was cancelled")]
    Cancelled,

    #[error("session '{0}' not found")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl StoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoryError::InvalidUrl(_) => ErrorKind::InvalidUrl,
            StoryError::Generation { .. } => ErrorKind::GenerationError,
            StoryError::Storage(_) => ErrorKind::StorageError,
            StoryError::Cancelled => ErrorKind::Cancelled,
            StoryError::NotFound(_) => ErrorKind::NotFound,
            StoryError::InvalidConfig(_) => ErrorKind::ConfigError,
        }
    }

    pub(crate) fn storage(context: impl fmt::Display, err: impl fmt::Display) -> Self {
        StoryError::Storage(format!("{}: {}", context, err))
    }
}

/// Serializable discriminant of [`StoryError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidUrl,
    GenerationError,
    StorageError,
    Cancelled,
    NotFound,
    ConfigError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidUrl => "InvalidUrl",
            ErrorKind::GenerationError => "GenerationError",
            ErrorKind::StorageError => "StorageError",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::ConfigError => "ConfigError",
        };
        f.write_str(name)
    }
}

/// Why a single call to the generation endpoint was rejected.
/// Every variant is retryable.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("API request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    #[error("response decode error: {0}")]
    Decode(String),

    #[error("response carried no generated text")]
    MissingText,

    #[error("generated text too short ({len} < {min} characters)")]
    TooShort { len: usize, min: usize },
}

pub type StoryResult<T> = std::result::Result<T, StoryError>;
