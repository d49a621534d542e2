//! Error types for gitcorpus.
//!
//! Library crates use [`GitCorpusError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all gitcorpus operations.
#[derive(Debug, thiserror::Error)]
pub enum GitCorpusError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A configured path pattern is not a valid regular expression.
    #[error("invalid pattern '{pattern}': {source}")]
    MalformedPattern {
        pattern: String,
        source: regex::Error,
    },

    /// No bearer token could be obtained from any credential source.
    #[error("missing credential: {message}")]
    MissingCredential { message: String },

    /// Tree or blob retrieval from the hosting service failed.
    #[error("remote fetch error: {message}")]
    RemoteFetch {
        message: String,
        /// HTTP status, when the service answered at all.
        status: Option<u16>,
    },

    /// Blob payload could not be decoded from its transport encoding.
    #[error("decode error: {0}")]
    Decode(String),

    /// Persisted dataset exists but cannot be read back.
    #[error("persistence error at {path:?}: {message}")]
    Persistence { path: PathBuf, message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The operation was cancelled before it completed.
    #[error("operation cancelled")]
    Cancelled,
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, GitCorpusError>;

impl GitCorpusError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a missing-credential error.
    pub fn missing_credential(msg: impl Into<String>) -> Self {
        Self::MissingCredential {
            message: msg.into(),
        }
    }

    /// Create a remote fetch error without an HTTP status (transport failure).
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::RemoteFetch {
            message: msg.into(),
            status: None,
        }
    }

    /// Create a remote fetch error for a non-success HTTP status.
    pub fn remote_status(msg: impl Into<String>, status: u16) -> Self {
        Self::RemoteFetch {
            message: msg.into(),
            status: Some(status),
        }
    }

    /// Create a persistence error for the dataset file at `path`.
    pub fn persistence(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Persistence {
            path: path.into(),
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

    /// Whether this error belongs to the remote-service boundary.
    ///
    /// Remote failures degrade to an empty fetch result; everything else is fatal.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteFetch { .. } | Self::Decode(_))
    }
}
