//! Error taxonomy shared by every pipeline stage.
//!
//! Each variant names the layer that failed so that the coordinators can
//! decide whether a failure leaves the stores untouched, needs compensation,
//! or has left them partially applied.

use thiserror::Error;

/// Errors raised by loaders, providers, and stores.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    /// The loader has no handler for this file extension.
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// A supported file could not be read or parsed.
    #[error("failed to load {path}: {message}")]
    LoadFailed { path: String, message: String },

    /// The document produced no indexable text.
    #[error("document {0} contains no indexable text")]
    NoContent(String),

    /// Network, auth, or rate-limit failure from the embedding backend.
    #[error("embedding provider error ({provider}): {message}")]
    EmbeddingProvider { provider: String, message: String },

    /// Failure from the text-generation backend.
    #[error("generation error ({provider}): {message}")]
    Generation { provider: String, message: String },

    /// Vector index insert, search, or delete failed.
    #[error("vector index {operation} failed: {message}")]
    IndexOperationFailed {
        operation: &'static str,
        message: String,
    },

    /// Relational catalog operation failed.
    #[error("catalog {operation} failed: {message}")]
    CatalogOperationFailed {
        operation: &'static str,
        message: String,
    },

    /// The requested model is not in the configured allow-list.
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// Caller-supplied input was rejected before any work was done.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn embedding(provider: impl Into<String>, message: impl ToString) -> Self {
        Error::EmbeddingProvider {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    pub fn generation(provider: impl Into<String>, message: impl ToString) -> Self {
        Error::Generation {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    pub fn index(operation: &'static str, message: impl ToString) -> Self {
        Error::IndexOperationFailed {
            operation,
            message: message.to_string(),
        }
    }

    pub fn catalog(operation: &'static str, message: impl ToString) -> Self {
        Error::CatalogOperationFailed {
            operation,
            message: message.to_string(),
        }
    }

    /// Whether a caller may reasonably retry the whole request.
    ///
    /// Only remote-capability failures are transient; format and input
    /// errors will fail the same way again. Store failures are reported as
    /// non-retryable because a retry may race with compensation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::EmbeddingProvider { .. } | Error::Generation { .. }
        )
    }
}

/// Convenience result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
