//! Error types for the document store protocol.
//!
//! Every store backend reports failures through [`CouchError`]. The variants
//! mirror the answers a CouchDB server gives over HTTP so callers can tell a
//! stale revision apart from a missing document or a transport failure.

use thiserror::Error;

/// Convenience type alias for Results using [`CouchError`].
pub type Result<T, E = CouchError> = std::result::Result<T, E>;

/// Diagnostic code used for failures that never reached the server.
pub const CODE_TRANSPORT: u16 = 0;

/// Top-level store errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CouchError {
    /// The document (or database) does not exist.
    #[error("document not found: {id}")]
    NotFound {
        /// Identifier that was looked up.
        id: String,
    },

    /// The revision sent with a write is not the current one.
    #[error("document update conflict: {id}")]
    Conflict {
        /// Identifier of the conflicting document.
        id: String,
    },

    /// Any other non-success answer from the server.
    #[error("store responded {status}: {error} ({reason})")]
    Status {
        /// HTTP status code.
        status: u16,
        /// CouchDB error keyword (e.g. `unauthorized`).
        error: String,
        /// Human readable reason.
        reason: String,
    },

    /// The request never produced a response.
    #[cfg(feature = "http")]
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A body could not be encoded or decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A document body did not have the expected shape.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// The configured server address cannot address documents.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The backend does not support the requested operation.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl CouchError {
    /// Build an error from a non-success HTTP status and CouchDB error body.
    ///
    /// `id` names the document the request addressed; it is used for the
    /// `NotFound` and `Conflict` variants.
    pub fn from_status(status: u16, id: &str, error: Option<&str>, reason: Option<&str>) -> Self {
        match status {
            404 => Self::NotFound { id: id.to_string() },
            409 => Self::Conflict { id: id.to_string() },
            _ => Self::Status {
                status,
                error: error.unwrap_or("unknown_error").to_string(),
                reason: reason.unwrap_or("no reason given").to_string(),
            },
        }
    }

    /// HTTP-like diagnostic code for logging and error chaining.
    pub fn code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::Status { status, .. } => *status,
            #[cfg(feature = "http")]
            Self::Transport(e) => e.status().map(|s| s.as_u16()).unwrap_or(CODE_TRANSPORT),
            Self::Decode(_) | Self::InvalidDocument(_) | Self::InvalidUrl(_) => CODE_TRANSPORT,
            Self::Unsupported(_) => 501,
        }
    }

    /// True when the write was rejected because of a stale revision.
    #[inline]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// True when the addressed document does not exist.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
