//! Upstream client for proxc.
//!
//! This crate provides the reqwest-backed round trip that the caching
//! transport delegates misses to, plus URL canonicalization for cache keys.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, UrlError, canonicalize, request_uri};
