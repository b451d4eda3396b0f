//! SQLite-backed storage for cached responses and file bodies.
//!
//! This module provides persistent storage using SQLite with async access
//! via tokio-rusqlite. It supports:
//!
//! - Lazily opened handles, one per host plus a shared file handle
//! - Content-addressed file storage using SHA-256 hashing
//! - Named schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod files;
pub mod hash;
pub mod migrations;
pub mod responses;
pub mod set;

pub use crate::Error;

pub use connection::CacheDb;
pub use files::{DetectExt, FileContent, FileRef, ext_from_name};
pub use hash::{content_hash, content_hash_reader};
pub use migrations::Schema;
pub use responses::{Conflict, HttpResponseRecord, ResponseSummary};
pub use set::{Location, StoreSet};
