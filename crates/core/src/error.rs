//! Unified error types for proxc.
//!
//! Display strings start with a stable code so failures can be grepped in
//! logs and CLI output.

use std::io;

use proxc_encoding::EncodingError;

/// Unified error type for the cache core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A content-coding name is not registered.
    #[error("UNSUPPORTED_ENCODING: {0}")]
    UnsupportedEncoding(String),

    /// Negotiation found nothing the client accepts.
    #[error("NO_ACCEPTABLE_ENCODING: {0}")]
    NoAcceptableEncoding(String),

    /// A codec stream failed while transcoding a body.
    #[error("TRANSCODE_FAILED: {0}")]
    TranscodeFailed(#[source] EncodingError),

    /// The origin response body could not be drained.
    #[error("BODY_READ_FAILED: {0}")]
    BodyReadFailed(#[source] io::Error),

    /// A storage handle could not be opened or its schema applied.
    #[error("STORAGE_INIT: {key}: {reason}")]
    StorageInit { key: String, reason: String },

    /// A schema migration failed to apply.
    #[error("STORAGE_INIT: migration failed: {0}")]
    MigrationFailed(String),

    /// Reading from a storage handle failed.
    #[error("STORAGE_READ_FAILED: {0}")]
    StorageRead(tokio_rusqlite::Error),

    /// Writing to a storage handle failed.
    #[error("STORAGE_WRITE_FAILED: {0}")]
    StorageWrite(tokio_rusqlite::Error),

    /// A response record points at file content that does not exist.
    #[error("DATA_INTEGRITY: {0}")]
    DataIntegrity(String),

    /// A stored record or a captured response cannot be represented.
    #[error("INVALID_RECORD: {0}")]
    InvalidRecord(String),

    /// The upstream round trip failed.
    #[error("UPSTREAM_FAILED: {0}")]
    Upstream(String),
}

impl From<EncodingError> for Error {
    fn from(err: EncodingError) -> Self {
        match err {
            EncodingError::Unsupported(name) => Error::UnsupportedEncoding(name),
            EncodingError::NoAcceptable(accept) => Error::NoAcceptableEncoding(accept),
            other => Error::TranscodeFailed(other),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidRecord(err.to_string())
    }
}
