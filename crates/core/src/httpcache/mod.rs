//! HTTP response cache.
//!
//! [`HttpCache`] ties captured exchanges to storage handles: one response
//! database per host plus a shared file database, or a single in-memory
//! database holding both. Bodies are re-encoded on write to the storage
//! encoding and transcoded on read to whatever the requesting client
//! accepts.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH};
use http::{HeaderName, HeaderValue, Request, Response, response};
use proxc_encoding::{EncodingError, IDENTITY, Registry, canonical};

use crate::Error;
use crate::cache::{
    CacheDb, DetectExt, FileContent, FileRef, Location, Schema, StoreSet, content_hash, ext_from_name,
};
use crate::config::CacheConfig;

pub mod body;
pub mod compress;
pub mod record;
pub mod transport;
pub mod writer;

pub use body::Body;
pub use compress::{COMPRESSIBLE_TYPES, StoragePolicy};
pub use record::{Uncompressed, request_host};
pub use transport::{CachingTransport, Freshness, FreshnessFn, Upstream, X_FROM_CACHE, always_fresh};
pub use writer::{BatchWriter, DirectWriter, RecordWriter, StoreOptions, WriteOp};

/// Set on responses whose body was served from the file store.
pub const CONTENT_HASH: HeaderName = HeaderName::from_static("content-hash");

/// Storage key of the shared file database.
pub const FILE_KEY: &str = "file";
/// Storage key of the single in-memory database.
pub const MEMORY_KEY: &str = "mem";

/// Persistent response cache.
pub struct HttpCache {
    stores: StoreSet,
    registry: Arc<Registry>,
    policy: StoragePolicy,
    detect_ext: DetectExt,
}

impl std::fmt::Debug for HttpCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCache")
            .field("stores", &self.stores)
            .field("registry", &self.registry)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl HttpCache {
    pub fn new(stores: StoreSet, registry: Arc<Registry>, policy: StoragePolicy) -> Self {
        Self { stores, registry, policy, detect_ext: Arc::new(ext_from_name) }
    }

    /// Per-host databases plus `file.sqlite` under `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(StoreSet::in_dir(dir), Arc::new(Registry::builtin()), StoragePolicy::default())
    }

    /// One shared in-memory database.
    pub fn in_memory() -> Self {
        Self::new(StoreSet::in_memory(), Arc::new(Registry::builtin()), StoragePolicy::default())
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        let stores =
            if config.in_memory { StoreSet::in_memory() } else { StoreSet::in_dir(config.db_dir.clone()) };
        Self::new(stores, Arc::new(Registry::builtin()), config.storage_policy())
    }

    /// Override how a file's extension is derived.
    pub fn with_ext_detector(mut self, detect_ext: DetectExt) -> Self {
        self.detect_ext = detect_ext;
        self
    }

    pub fn with_policy(mut self, policy: StoragePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn policy(&self) -> &StoragePolicy {
        &self.policy
    }

    pub fn stores(&self) -> &StoreSet {
        &self.stores
    }

    /// Handle holding the response records of `host`.
    pub async fn response_store(&self, host: &str) -> Result<CacheDb, Error> {
        match self.stores.location() {
            Location::Memory => self.stores.get(MEMORY_KEY, Schema::All).await,
            Location::Dir(_) => self.stores.get(host, Schema::Responses).await,
        }
    }

    /// Handle holding file bodies.
    pub async fn file_store(&self) -> Result<CacheDb, Error> {
        match self.stores.location() {
            Location::Memory => self.stores.get(MEMORY_KEY, Schema::All).await,
            Location::Dir(_) => self.stores.get(FILE_KEY, Schema::Files).await,
        }
    }

    /// Store a captured response and hand it back with a replayable body.
    ///
    /// The body is drained once; an absent body stays absent.
    ///
    /// # Errors
    ///
    /// `BodyReadFailed` if the body cannot be drained, otherwise any error
    /// of [`store_response`](Self::store_response). The response is lost on
    /// error; use `store_response` directly to keep it.
    pub async fn set_response<B: Sync>(&self, req: &Request<B>, resp: Response<Body>) -> Result<Response<Body>, Error> {
        self.set_response_with(req, resp, StoreOptions::default()).await
    }

    pub async fn set_response_with<B: Sync>(
        &self,
        req: &Request<B>,
        resp: Response<Body>,
        opts: StoreOptions<'_>,
    ) -> Result<Response<Body>, Error> {
        let (parts, body) = resp.into_parts();
        let (bytes, body) = body.drain().await.map_err(Error::BodyReadFailed)?;
        self.store_response(req, &parts, bytes, opts).await?;
        Ok(Response::from_parts(parts, body))
    }

    /// Store an already drained response body.
    ///
    /// A body with a `Content-Disposition` file name is moved to the file
    /// store, keyed by the hash of its decoded bytes; anything else is kept
    /// inline in the storage encoding.
    pub async fn store_response<B: Sync>(
        &self,
        req: &Request<B>,
        parts: &response::Parts,
        body: Bytes,
        opts: StoreOptions<'_>,
    ) -> Result<(), Error> {
        let mut record = record::build_record(req, parts)?;
        record.storage_encoding = self.policy.storage_encoding(&record.origin_encoding, &record.content_type);

        match record.file_name.clone() {
            Some(name) if !body.is_empty() => {
                let (raw, _) = self.transcode(&record.origin_encoding, body, IDENTITY).await?;
                let hash = content_hash(&raw);
                let file_ref = FileRef { hash: hash.clone(), url: record.url.clone(), name: name.clone() };
                let content = FileContent {
                    hash: hash.clone(),
                    ext: (self.detect_ext)(&name, &raw),
                    name,
                    size: raw.len() as i64,
                    content_type: record.content_type.clone(),
                    content: raw,
                };

                record.raw_size = content.size;
                record.body_size = 0;
                record.body = Vec::new();
                record.storage_encoding = String::new();
                record.content_hash = Some(hash);

                opts.writer.write(self, WriteOp::File { content, file_ref }).await?;
            }
            _ => {
                let storage_encoding = record.storage_encoding.clone();
                let (stored, raw_size) = self.transcode(&record.origin_encoding, body, &storage_encoding).await?;
                record.raw_size = raw_size as i64;
                record.body_size = stored.len() as i64;
                record.body = stored;
            }
        }

        tracing::debug!(
            url = %record.url,
            host = %record.host,
            encoding = %record.storage_encoding,
            hash = record.content_hash.as_deref(),
            "storing response"
        );
        opts.writer.write(self, WriteOp::Response { record, conflict: opts.conflict }).await
    }

    /// Look up the cached response for a request.
    ///
    /// Returns `Ok(None)` when nothing is cached. The body is delivered in
    /// the first coding of the request's `Accept-Encoding` that is either
    /// the stored coding or a registered one.
    ///
    /// # Errors
    ///
    /// `NoAcceptableEncoding` if the client accepts none of them, unless the
    /// policy allows falling back to identity.
    pub async fn get_response<B: Sync>(&self, req: &Request<B>) -> Result<Option<Response<Body>>, Error> {
        let host = request_host(req);
        let url = req.uri().to_string();
        let store = self.response_store(&host).await?;

        let Some(record) = store.get_response(req.method().as_str(), &url).await? else {
            tracing::debug!(%url, "cache miss");
            return Ok(None);
        };

        let mut parts = record::response_parts(&record)?;
        let (stored, source_encoding) = match &record.content_hash {
            Some(hash) => match self.file_store().await?.get_file(hash).await? {
                Some(file) => {
                    let value = HeaderValue::from_str(hash).map_err(|e| Error::InvalidRecord(e.to_string()))?;
                    parts.headers.insert(CONTENT_HASH, value);
                    (Bytes::from(file.content), String::new())
                }
                None => {
                    let fault = Error::DataIntegrity(format!("missing file content {hash} for {url}"));
                    tracing::error!(%hash, %url, "{fault}");
                    (Bytes::new(), String::new())
                }
            },
            None => (Bytes::from(record.body), record.storage_encoding),
        };

        parts.headers.remove(CONTENT_LENGTH);
        if stored.is_empty() {
            parts.headers.remove(CONTENT_ENCODING);
            tracing::debug!(%url, "cache hit, empty body");
            return Ok(Some(Response::from_parts(parts, Body::Empty)));
        }

        let accept = req
            .headers()
            .get(http::header::ACCEPT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let delivery = match self.registry.negotiate(&source_encoding, accept) {
            Ok(encoding) => encoding,
            Err(err) if self.policy.identity_fallback => {
                tracing::debug!(%url, error = %err, "falling back to identity");
                String::new()
            }
            Err(err) => return Err(err.into()),
        };

        let (delivered, _) = self.transcode(&source_encoding, stored, &delivery).await?;
        if canonical(&delivery).is_empty() {
            parts.headers.remove(CONTENT_ENCODING);
        } else {
            let value = HeaderValue::from_str(&delivery).map_err(|e| Error::InvalidRecord(e.to_string()))?;
            parts.headers.insert(CONTENT_ENCODING, value);
        }

        tracing::debug!(%url, stored = %source_encoding, encoding = %delivery, "cache hit");
        Ok(Some(Response::from_parts(parts, Body::Full(delivered.into()))))
    }

    /// Remove the cached response for a request. File bodies are kept.
    ///
    /// Returns whether a record existed.
    pub async fn delete_response<B: Sync>(&self, req: &Request<B>) -> Result<bool, Error> {
        let store = self.response_store(&request_host(req)).await?;
        let removed = store.delete_response(req.method().as_str(), &req.uri().to_string()).await?;
        Ok(removed > 0)
    }

    /// Apply one op against the right handle.
    ///
    /// Returns whether anything was written.
    pub async fn apply(&self, op: WriteOp) -> Result<bool, Error> {
        match op {
            WriteOp::File { content, file_ref } => self.file_store().await?.put_file(content, file_ref).await,
            WriteOp::Response { record, conflict } => {
                self.response_store(&record.host).await?.upsert_response(record, conflict).await
            }
        }
    }

    /// Apply ops collected by a [`BatchWriter`], in order.
    ///
    /// Stops at the first failure. Returns how many ops wrote something.
    pub async fn commit(&self, ops: Vec<WriteOp>) -> Result<usize, Error> {
        let mut written = 0;
        for op in ops {
            if self.apply(op).await? {
                written += 1;
            }
        }
        Ok(written)
    }

    /// Run a transfer on the blocking pool.
    async fn transcode(&self, from: &str, input: Bytes, to: &str) -> Result<(Vec<u8>, u64), Error> {
        let registry = Arc::clone(&self.registry);
        let (from, to) = (from.to_string(), to.to_string());

        tokio::task::spawn_blocking(move || registry.transfer_bytes(&from, &input, &to))
            .await
            .map_err(|e| Error::TranscodeFailed(EncodingError::Transcode(io::Error::other(e))))?
            .map_err(Error::from)
    }
}
