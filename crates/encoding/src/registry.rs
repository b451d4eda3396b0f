//! Codec registry.
//!
//! A registry maps content-coding names to codecs. `""` and `"identity"`
//! always resolve to the pass-through codec and cannot be replaced.
//! Registration happens up front; lookups afterwards take `&self` only, so
//! a built registry can be shared freely between threads.

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::{Arc, OnceLock};

use crate::EncodingError;
use crate::codec::{BROTLI, Brotli, Codec, DEFLATE, Deflate, FinishWrite, GZIP, Gzip, IDENTITY, Identity, ZSTD, Zstd};

/// Normalize a content-coding name.
///
/// Trims whitespace and lowercases. `identity` and the empty string both
/// become `""`.
pub fn canonical(name: &str) -> Cow<'_, str> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(IDENTITY) {
        Cow::Borrowed("")
    } else if trimmed.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(trimmed.to_ascii_lowercase())
    } else {
        Cow::Borrowed(trimmed)
    }
}

/// Name-to-codec table.
#[derive(Clone)]
pub struct Registry {
    codecs: HashMap<String, Arc<dyn Codec>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("Registry").field("codecs", &names).finish()
    }
}

impl Registry {
    /// A registry that only knows the identity coding.
    pub fn new() -> Self {
        let mut codecs: HashMap<String, Arc<dyn Codec>> = HashMap::with_capacity(6);
        codecs.insert(String::new(), Arc::new(Identity));
        Self { codecs }
    }

    /// A registry with identity, gzip, deflate, br and zstd.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry
            .register(GZIP, Arc::new(Gzip::default()))
            .register(DEFLATE, Arc::new(Deflate::default()))
            .register(BROTLI, Arc::new(Brotli))
            .register(ZSTD, Arc::new(Zstd::default()));
        registry
    }

    /// Process-wide built-in registry, created on first use and read-only after.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::builtin)
    }

    /// Add or replace a codec.
    ///
    /// Attempts to replace the identity coding are ignored.
    pub fn register(&mut self, name: &str, codec: Arc<dyn Codec>) -> &mut Self {
        let key = canonical(name);
        if key.is_empty() {
            tracing::warn!(name, "refusing to replace the identity coding");
            return self;
        }
        self.codecs.insert(key.into_owned(), codec);
        self
    }

    pub fn is_supported(&self, name: &str) -> bool {
        self.codecs.contains_key(canonical(name).as_ref())
    }

    /// Registered names; identity is reported as `""`.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.codecs.keys().map(String::as_str)
    }

    /// Look up a codec by name.
    ///
    /// # Errors
    ///
    /// Returns `EncodingError::Unsupported` if `name` is not registered.
    pub fn get(&self, name: &str) -> Result<&dyn Codec, EncodingError> {
        self.codecs
            .get(canonical(name).as_ref())
            .map(|codec| codec.as_ref())
            .ok_or_else(|| EncodingError::Unsupported(name.to_string()))
    }

    /// Wrap `reader` in a decoding stream for `name`.
    pub fn new_decoder<'a>(&self, name: &str, reader: impl Read + 'a) -> Result<Box<dyn Read + 'a>, EncodingError> {
        self.get(name)?
            .decoder(Box::new(reader))
            .map_err(EncodingError::Transcode)
    }

    /// Wrap `writer` in an encoding stream for `name`.
    ///
    /// The returned stream must be finished to flush the trailer.
    pub fn new_encoder<'a>(
        &self, name: &str, writer: impl Write + 'a,
    ) -> Result<Box<dyn FinishWrite + 'a>, EncodingError> {
        self.get(name)?
            .encoder(Box::new(writer))
            .map_err(EncodingError::Transcode)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}
