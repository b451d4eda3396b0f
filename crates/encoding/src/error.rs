//! Error types for codec lookup and transcoding.

use std::io;

/// Errors raised by the codec registry and the transfer engine.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    /// The named content-coding is not registered.
    #[error("UNSUPPORTED_ENCODING: {0:?}")]
    Unsupported(String),

    /// No candidate in an `Accept-Encoding` list could be served.
    #[error("NO_ACCEPTABLE_ENCODING: {0:?}")]
    NoAcceptable(String),

    /// Reading, writing or finishing a codec stream failed.
    #[error("TRANSCODE_IO: {0}")]
    Transcode(#[source] io::Error),

    /// The copy failed and finishing the encoder failed as well.
    #[error("TRANSCODE_IO: {source}; finishing encoder also failed: {close}")]
    TranscodeClose { source: io::Error, close: io::Error },
}
