//! Core of the proxc response cache.
//!
//! This crate provides:
//! - Per-key SQLite storage handles with a content-addressed file store
//! - The response cache and the caching transport built on it
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod httpcache;

pub use cache::{CacheDb, Conflict, FileContent, FileRef, HttpResponseRecord, StoreSet};
pub use config::{CacheConfig, ConfigError};
pub use error::Error;
pub use httpcache::{Body, CachingTransport, HttpCache, StoreOptions, Upstream};
