//! Error types for AccessCMS.
//!
//! Library crates use [`AccessCmsError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! The adaptation engine never propagates errors from a generator; it falls
//! back to the original record instead. Only [`is_retryable`] errors are
//! attempted again before that happens.
//!
//! [`is_retryable`]: AccessCmsError::is_retryable

use std::path::PathBuf;

/// Top-level error type for all AccessCMS operations.
#[derive(Debug, thiserror::Error)]
pub enum AccessCmsError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Content failed structural validation against its schema.
    #[error("schema error: {message}")]
    Schema { message: String },

    /// The text-generation capability failed (network, HTTP status, payload).
    #[error("generation error: {0}")]
    Generation(String),

    /// The text-generation call did not finish within its time budget.
    #[error("generation timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// No text-generation capability is configured.
    #[error("text generation is not configured")]
    CapabilityUnavailable,

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// A requested entity does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: String, id: String },

    /// A disability profile identifier outside the catalog.
    #[error("unknown disability profile '{0}'")]
    UnknownProfile(String),

    /// An entity kind identifier that is not hotel, tour or care service.
    #[error("unknown entity kind '{0}'")]
    UnknownKind(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AccessCmsError>;

impl AccessCmsError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a schema error from any displayable message.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema {
            message: msg.into(),
        }
    }

    /// Create a generation error from any displayable message.
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    /// Create a not-found error for an entity.
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether another generation attempt could succeed where this one
    /// failed. Transport failures and timeouts qualify; configuration and
    /// schema problems do not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Generation(_) | Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = AccessCmsError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = AccessCmsError::schema("field 'name' is required");
        assert!(err.to_string().contains("field 'name'"));

        let err = AccessCmsError::not_found("hotel", "abc");
        assert_eq!(err.to_string(), "hotel abc not found");
    }

    #[test]
    fn retryable_kinds() {
        assert!(AccessCmsError::generation("503").is_retryable());
        assert!(AccessCmsError::Timeout { after_ms: 10 }.is_retryable());

        assert!(!AccessCmsError::schema("bad").is_retryable());
        assert!(!AccessCmsError::config("no key").is_retryable());
        assert!(!AccessCmsError::CapabilityUnavailable.is_retryable());
        assert!(!AccessCmsError::UnknownProfile("x".into()).is_retryable());
        assert!(!AccessCmsError::Storage("disk".into()).is_retryable());
    }
}
