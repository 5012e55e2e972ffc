//! Error types for sitearchiver.
//!
//! Library crates use [`SiteArchiverError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all sitearchiver operations.
#[derive(Debug, thiserror::Error)]
pub enum SiteArchiverError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level HTTP error (connect, timeout, body read).
    #[error("network error: {0}")]
    Network(String),

    /// The remote answered a fetch with a non-success status.
    #[error("fetch of {url} failed with HTTP {status}: {body}")]
    Fetch {
        url: String,
        status: u16,
        body: String,
    },

    /// Malformed XML or an unexpected document shape.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (oversized response, bad URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SiteArchiverError>;

impl SiteArchiverError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a fetch error for a non-success response.
    pub fn fetch(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            status,
            body: body.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// HTTP status carried by a [`SiteArchiverError::Fetch`], if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Fetch { status, .. } => Some(*status),
            _ => None,
        }
    }
}
