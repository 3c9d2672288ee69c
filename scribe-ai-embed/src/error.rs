//! Error types for the embedding gateway

use std::time::Duration;

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for every embedding gateway operation.
///
/// A gateway call fails as a whole: there is never a partial batch of vectors
/// next to an error. Callers that only need to know "the gateway is unavailable"
/// can treat every variant the same way.
///
/// # Error Categories
///
/// - **Configuration Errors**: unknown provider, missing API key, zero dimension
/// - **Transport Errors**: the request could not be sent or returned a failure status
/// - **Protocol Errors**: the response could not be understood, or had the wrong shape
/// - **Timeouts**: the caller-supplied deadline elapsed
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Error when the gateway configuration is invalid
    #[error("Invalid embedding configuration: {message}")]
    InvalidConfig { message: String },

    /// The request to the embedding service failed
    #[error("Embedding request failed: {source}")]
    Request {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The service answered with a non-success status
    #[error("Embedding service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not have the expected shape
    #[error("Malformed embedding response: {message}")]
    MalformedResponse { message: String },

    /// Fewer (or more) vectors than input texts
    #[error("Embedding batch mismatch: expected {expected} vectors, got {actual}")]
    BatchMismatch { expected: usize, actual: usize },

    /// The call did not finish within the deadline
    #[error("Embedding request timed out after {}ms", .timeout.as_millis())]
    Timeout { timeout: Duration },

    /// Generic errors from other libraries
    #[error("External error: {source}")]
    External {
        #[from]
        source: anyhow::Error,
    },
}

impl EmbedError {
    /// Wrap a transport-level failure.
    pub fn request<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Request {
            source: Box::new(source),
        }
    }

    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Whether retrying the same call later might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request { .. } | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
