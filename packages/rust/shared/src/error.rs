//! Error types for PageDigest.
//!
//! Library crates use [`PageDigestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for all PageDigest operations.
#[derive(Debug, thiserror::Error)]
pub enum PageDigestError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Data validation error (bad URL, zero budget, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Page retrieval or parsing failed. Fatal to the run.
    #[error("fetch error for {url}: {message}")]
    Fetch { url: String, message: String },

    /// The completion provider rejected or failed a request.
    #[error(
        "provider error{}: {message}",
        .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
    )]
    Provider {
        status: Option<u16>,
        message: String,
    },

    /// A per-chunk completion request failed and aborted the run.
    #[error("chunk {index} failed: {source}")]
    ChunkDispatch {
        index: usize,
        source: Box<PageDigestError>,
    },

    /// The final summarization request failed.
    #[error("aggregation failed: {0}")]
    Aggregation(#[source] Box<PageDigestError>),

    /// The caller-level timeout elapsed before the run finished.
    #[error("pipeline timed out after {0:?}")]
    Timeout(Duration),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PageDigestError>;

impl PageDigestError {
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

    /// Create a fetch error for `url`.
    pub fn fetch(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create a provider error with an optional HTTP status.
    pub fn provider(status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::Provider {
            status,
            message: msg.into(),
        }
    }

    /// Whether retrying the same request might succeed (rate limits, 5xx, transport).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Provider { status: None, .. } => true,
            Self::Provider {
                status: Some(code), ..
            } => *code == 429 || *code >= 500,
            Self::Timeout(_) => true,
            _ => false,
        }
    }
}
