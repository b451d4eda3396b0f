//! HTTP content-coding support for proxc.
//!
//! This crate provides:
//! - Streaming codecs for `identity`, `gzip`, `deflate`, `br` and `zstd`
//! - A codec registry with a process-wide built-in instance
//! - `from -> to` transcoding and simplified `Accept-Encoding` negotiation

pub mod codec;
pub mod error;
pub mod negotiate;
pub mod registry;
pub mod transfer;

pub use codec::{BROTLI, Codec, DEFLATE, FinishWrite, GZIP, IDENTITY, ZSTD};
pub use error::EncodingError;
pub use registry::{Registry, canonical};
