//! Write path of the cache.
//!
//! Storing a response produces up to two [`WriteOp`]s: the offloaded file
//! body and the response record. A [`RecordWriter`] decides whether they are
//! committed right away or collected for later.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::HttpCache;
use crate::Error;
use crate::cache::{Conflict, FileContent, FileRef, HttpResponseRecord};

/// One pending storage mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Insert a file body and reference it from a URL.
    File { content: FileContent, file_ref: FileRef },
    /// Upsert a response record.
    Response { record: HttpResponseRecord, conflict: Conflict },
}

#[async_trait]
pub trait RecordWriter: Send + Sync {
    async fn write(&self, cache: &HttpCache, op: WriteOp) -> Result<(), Error>;
}

/// Commits every op as soon as it is produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectWriter;

#[async_trait]
impl RecordWriter for DirectWriter {
    async fn write(&self, cache: &HttpCache, op: WriteOp) -> Result<(), Error> {
        cache.apply(op).await.map(|_| ())
    }
}

/// Collects ops in order instead of writing them.
///
/// Used for dry runs and bulk import: inspect or [`take`](Self::take) the
/// ops, then hand them to [`HttpCache::commit`].
#[derive(Debug, Default)]
pub struct BatchWriter {
    ops: Mutex<Vec<WriteOp>>,
}

impl BatchWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ops.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the collected ops.
    pub fn ops(&self) -> Vec<WriteOp> {
        self.ops.lock().clone()
    }

    /// Remove and return the collected ops.
    pub fn take(&self) -> Vec<WriteOp> {
        std::mem::take(&mut *self.ops.lock())
    }
}

#[async_trait]
impl RecordWriter for BatchWriter {
    async fn write(&self, _cache: &HttpCache, op: WriteOp) -> Result<(), Error> {
        self.ops.lock().push(op);
        Ok(())
    }
}

/// Options for one store call.
#[derive(Clone, Copy)]
pub struct StoreOptions<'a> {
    pub conflict: Conflict,
    pub writer: &'a dyn RecordWriter,
}

impl Default for StoreOptions<'_> {
    fn default() -> Self {
        Self { conflict: Conflict::ReplaceAll, writer: &DirectWriter }
    }
}

impl<'a> StoreOptions<'a> {
    /// Leave an existing record for the same key untouched.
    pub fn keep_existing(mut self) -> Self {
        self.conflict = Conflict::KeepExisting;
        self
    }

    pub fn with_writer(mut self, writer: &'a dyn RecordWriter) -> Self {
        self.writer = writer;
        self
    }
}

impl std::fmt::Debug for StoreOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreOptions").field("conflict", &self.conflict).finish_non_exhaustive()
    }
}
