//! Error types for vault operations.

use thiserror::Error;

/// Result type alias using [`BitwardenError`].
pub type Result<T> = std::result::Result<T, BitwardenError>;

/// Errors that can occur while driving the Bitwarden CLI.
///
/// Variants that originate at the CLI boundary carry the tool's own output so
/// callers always see what `bw` actually said.
#[derive(Debug, Error)]
pub enum BitwardenError {
    /// Unlock failed (bad password, tool missing, server refused).
    #[error("unlock failed: {0}")]
    Auth(String),

    /// Forced vault refresh failed.
    #[error("sync failed: {0}")]
    Sync(String),

    /// The subprocess could not start, exited non-zero, or the local
    /// server never became healthy.
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body was not valid JSON or did not match the expected shape.
    #[error("could not decode response: {message}\n{body}")]
    Decode {
        /// Parser message
        message: String,
        /// Raw response body
        body: String,
    },

    /// Installed `bw` is older than the supported floor.
    #[error("bw version {found} is below the minimum supported version {required}")]
    Version {
        /// Version reported by `bw --version`
        found: String,
        /// Minimum version required
        required: String,
    },

    /// Item was not found in the vault.
    #[error("item not found: {0}")]
    NotFound(String),

    /// No unlocked session (never unlocked, or the client was closed).
    #[error("not authenticated")]
    NotAuthenticated,

    /// Input rejected before reaching the CLI.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Provider configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Required CLI tool is not installed.
    #[error("bw CLI not installed: {0}")]
    BackendNotInstalled(String),

    /// Operation failed with context.
    #[error("{operation} {id}: {source}")]
    Operation {
        /// Operation name (create, get, update, move, delete)
        operation: String,
        /// Item id, or organization id for create
        id: String,
        /// Underlying error
        #[source]
        source: Box<BitwardenError>,
    },

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error talking to `bw serve`.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl BitwardenError {
    /// Wraps an error with the operation and item it belongs to.
    ///
    /// # Example
    ///
    /// ```
    /// use bitwarden_sync::BitwardenError;
    ///
    /// let err = BitwardenError::NotFound("Not found.".to_string());
    /// let wrapped = BitwardenError::op("get", "5f2b1c9e", err);
    ///
    /// assert_eq!(wrapped.to_string(), "get 5f2b1c9e: item not found: Not found.");
    /// ```
    pub fn op(operation: impl Into<String>, id: impl Into<String>, err: BitwardenError) -> Self {
        Self::Operation {
            operation: operation.into(),
            id: id.into(),
            source: Box::new(err),
        }
    }

    /// Builds a decode error keeping the raw body for diagnostics.
    pub fn decode(message: impl std::fmt::Display, body: &[u8]) -> Self {
        Self::Decode {
            message: message.to_string(),
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }

    /// Strips any [`BitwardenError::Operation`] context.
    pub fn root(&self) -> &BitwardenError {
        match self {
            Self::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns true if this error, or the error it wraps, is [`BitwardenError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NotFound(_))
    }
}
