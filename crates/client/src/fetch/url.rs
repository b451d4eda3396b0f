//! URL canonicalization for cache keys.
//!
//! The cache keys records by the exact request URI, so every URL a caller
//! hands in is normalized first.

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize a URL string.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host (done by the parser for http/https)
/// 4. Remove fragment (#...), which never reaches the origin
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = url::Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Canonicalize `input` into the URI used for requests and cache keys.
pub fn request_uri(input: &str) -> Result<http::Uri, UrlError> {
    let url = canonicalize(input)?;
    url.as_str().parse().map_err(|e: http::uri::InvalidUri| UrlError::InvalidUrl(e.to_string()))
}
