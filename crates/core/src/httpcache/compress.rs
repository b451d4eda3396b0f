//! Storage encoding policy.

use std::collections::HashSet;

use proxc_encoding::{ZSTD, canonical};

/// Media types worth compressing at rest.
///
/// Follows the list Cloudflare compresses on the fly.
pub const COMPRESSIBLE_TYPES: &[&str] = &[
    "text/html",
    "text/richtext",
    "text/plain",
    "text/css",
    "text/x-script",
    "text/x-component",
    "text/x-java-source",
    "text/x-markdown",
    "application/javascript",
    "application/x-javascript",
    "text/javascript",
    "text/js",
    "image/x-icon",
    "image/vnd.microsoft.icon",
    "application/x-perl",
    "application/x-httpd-cgi",
    "text/xml",
    "application/xml",
    "application/xml+rss",
    "application/vnd.api+json",
    "application/x-protobuf",
    "application/json",
    "multipart/bag",
    "multipart/mixed",
    "application/xhtml+xml",
    "font/ttf",
    "font/otf",
    "font/x-woff",
    "image/svg+xml",
    "application/vnd.ms-fontobject",
    "application/ttf",
    "application/x-ttf",
    "application/otf",
    "application/x-otf",
    "application/truetype",
    "application/opentype",
    "application/x-opentype",
    "application/font-woff",
    "application/eot",
    "application/font",
    "application/font-sfnt",
    "application/wasm",
    "application/javascript-binast",
    "application/manifest+json",
    "application/ld+json",
];

/// Decides the encoding a body is persisted in and how delivery failures
/// are handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePolicy {
    /// Encoding for compressible bodies the origin sent uncompressed.
    pub default_encoding: String,
    /// Lowercased media types without parameters.
    pub compressible: HashSet<String>,
    /// Serve identity when negotiation finds nothing the client accepts.
    pub identity_fallback: bool,
}

impl Default for StoragePolicy {
    fn default() -> Self {
        Self {
            default_encoding: ZSTD.to_string(),
            compressible: COMPRESSIBLE_TYPES.iter().map(|t| t.to_string()).collect(),
            identity_fallback: false,
        }
    }
}

impl StoragePolicy {
    pub fn is_compressible(&self, content_type: &str) -> bool {
        self.compressible.contains(content_type)
    }

    /// Encoding to persist a body in.
    ///
    /// An encoding declared by the origin is kept as is. Otherwise
    /// compressible content gets `default_encoding` and the rest is stored
    /// as identity (`""`).
    pub fn storage_encoding(&self, origin_encoding: &str, content_type: &str) -> String {
        let origin = canonical(origin_encoding);
        if !origin.is_empty() {
            return origin.into_owned();
        }
        if self.is_compressible(content_type) {
            return canonical(&self.default_encoding).into_owned();
        }
        String::new()
    }
}
