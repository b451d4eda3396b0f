//! Upstream fetcher for the caching transport.
//!
//! ### Wire fidelity
//! - Bodies are passed through as the origin sent them; `Content-Encoding`
//!   is left for the cache to record (opt-in decompression marks the
//!   response [`Uncompressed`] instead)
//! - Redirects are not followed by default so each URL caches its own
//!   response
//! - The response body is streamed, never buffered here

pub mod url;

use std::io;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream;
use http::{Request, Response};
use proxc_core::httpcache::Uncompressed;
use proxc_core::{Body, CacheConfig, Error, Upstream};
use reqwest::Client;

pub use url::{UrlError, canonicalize, request_uri};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "proxc/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 0)
    pub max_redirects: usize,

    /// Let the client decode compressed bodies (default: false)
    pub decompress: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "proxc/0.1".to_string(),
            timeout: Duration::from_millis(20000),
            max_redirects: 0,
            decompress: false,
        }
    }
}

impl From<&CacheConfig> for FetchConfig {
    fn from(config: &CacheConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout(), ..Default::default() }
    }
}

/// HTTP client performing upstream round trips.
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let redirect = match config.max_redirects {
            0 => reqwest::redirect::Policy::none(),
            n => reqwest::redirect::Policy::limited(n),
        };

        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(redirect)
            .use_rustls_tls()
            .gzip(config.decompress)
            .brotli(config.decompress)
            .deflate(config.decompress)
            .build()
            .map_err(|e| Error::Upstream(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn build_request(&self, req: Request<Body>) -> Result<reqwest::Request, Error> {
        let (parts, body) = req.into_parts();
        let url = reqwest::Url::parse(&parts.uri.to_string())
            .map_err(|e| Error::Upstream(format!("invalid request URI {}: {e}", parts.uri)))?;

        let mut builder = self.http.request(parts.method, url).headers(parts.headers);
        if !body.is_empty_sentinel() {
            let bytes = body.collect().await.map_err(Error::BodyReadFailed)?;
            builder = builder.body(bytes);
        }

        builder.build().map_err(|e| Error::Upstream(e.to_string()))
    }

    fn http_response(&self, response: reqwest::Response) -> Response<Body> {
        let status = response.status();
        let version = response.version();
        let headers = response.headers().clone();

        let body = Body::from_stream(stream::try_unfold(response, |mut response| async move {
            match response.chunk().await {
                Ok(Some(chunk)) => Ok(Some((chunk, response))),
                Ok(None) => Ok(None),
                Err(e) => Err(io::Error::other(e)),
            }
        }));

        let mut resp = Response::new(body);
        *resp.status_mut() = status;
        *resp.version_mut() = version;
        *resp.headers_mut() = headers;
        if self.config.decompress {
            resp.extensions_mut().insert(Uncompressed);
        }
        resp
    }
}

#[async_trait]
impl Upstream for FetchClient {
    async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>, Error> {
        let start = Instant::now();
        let request = self.build_request(req).await?;
        let url = request.url().clone();

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| Error::Upstream(format!("network error: {e}")))?;

        tracing::debug!(
            url = %url,
            status = response.status().as_u16(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "upstream response"
        );

        Ok(self.http_response(response))
    }
}
