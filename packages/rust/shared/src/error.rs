//! Error types for Researcher.
//!
//! Library crates use [`ResearcherError`] via `thiserror`.
//! App crates (cli/tui) wrap this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Researcher operations.
#[derive(Debug, thiserror::Error)]
pub enum ResearcherError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Search collaborator unreachable or returned malformed data.
    #[error("search error: {0}")]
    Search(String),

    /// Inference collaborator unreachable, model missing, or malformed reply.
    #[error("inference error: {0}")]
    Inference(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (empty query, bad URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ResearcherError>;

impl ResearcherError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error came from the search collaborator.
    pub fn is_search(&self) -> bool {
        matches!(self, Self::Search(_))
    }

    /// Whether this error came from the inference collaborator.
    pub fn is_inference(&self) -> bool {
        matches!(self, Self::Inference(_))
    }
}
