//! Caching round trip in front of an upstream.
//!
//! Cacheable requests are answered from the cache when the freshness
//! function allows it; everything else goes upstream and successful
//! responses are stored on the way back. Cache failures never fail the
//! request, they only turn it into a miss.

use std::sync::Arc;

use async_trait::async_trait;
use http::{HeaderName, HeaderValue, Method, Request, Response, request, response};

use super::{Body, HttpCache};
use crate::Error;

/// Marks a response served from the cache.
pub const X_FROM_CACHE: HeaderName = HeaderName::from_static("x-from-cache");

/// Verdict on a cached response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Serve it.
    Fresh,
    /// Refetch and replace it.
    Stale,
    /// Bypass the cache for this exchange: neither serve nor store.
    Transparent,
}

/// Decides whether a cached response may be served for a request.
pub type FreshnessFn = Arc<dyn Fn(&Request<()>, &response::Parts) -> Freshness + Send + Sync>;

/// Treats every cached entry as fresh.
pub fn always_fresh() -> FreshnessFn {
    Arc::new(|_, _| Freshness::Fresh)
}

/// Performs the real network round trip.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>, Error>;
}

pub struct CachingTransport<U> {
    cache: Arc<HttpCache>,
    upstream: U,
    freshness: FreshnessFn,
}

impl<U: Upstream> CachingTransport<U> {
    pub fn new(cache: Arc<HttpCache>, upstream: U) -> Self {
        Self { cache, upstream, freshness: always_fresh() }
    }

    pub fn with_freshness(mut self, freshness: FreshnessFn) -> Self {
        self.freshness = freshness;
        self
    }

    pub fn cache(&self) -> &HttpCache {
        &self.cache
    }

    pub fn upstream(&self) -> &U {
        &self.upstream
    }

    /// Answer `req` from the cache or the upstream.
    ///
    /// # Errors
    ///
    /// Only upstream failures and failures draining the upstream body are
    /// returned.
    pub async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>, Error> {
        if !is_cacheable(req.method()) {
            return self.upstream.round_trip(req).await;
        }

        let (parts, body) = req.into_parts();
        let probe = probe_of(&parts);

        let mut store = true;
        match self.cache.get_response(&probe).await {
            Ok(Some(cached)) => {
                let (mut cached_parts, cached_body) = cached.into_parts();
                match (self.freshness)(&probe, &cached_parts) {
                    Freshness::Fresh => {
                        cached_parts.headers.insert(X_FROM_CACHE, HeaderValue::from_static("1"));
                        return Ok(Response::from_parts(cached_parts, cached_body));
                    }
                    Freshness::Stale => tracing::debug!(url = %probe.uri(), "cached response is stale"),
                    Freshness::Transparent => store = false,
                }
            }
            Ok(None) => {}
            Err(err) => tracing::warn!(url = %probe.uri(), error = %err, "cache lookup failed, treating as miss"),
        }

        let resp = self.upstream.round_trip(Request::from_parts(parts, body)).await?;
        if !store || !resp.status().is_success() {
            return Ok(resp);
        }

        let (resp_parts, resp_body) = resp.into_parts();
        let (bytes, resp_body) = resp_body.drain().await.map_err(Error::BodyReadFailed)?;
        if let Err(err) = self.cache.store_response(&probe, &resp_parts, bytes, Default::default()).await {
            tracing::warn!(url = %probe.uri(), error = %err, "failed to store response");
        }

        Ok(Response::from_parts(resp_parts, resp_body))
    }
}

fn is_cacheable(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}

/// Bodyless copy of a request, used as the cache key.
fn probe_of(parts: &request::Parts) -> Request<()> {
    let mut probe = Request::new(());
    *probe.method_mut() = parts.method.clone();
    *probe.uri_mut() = parts.uri.clone();
    *probe.version_mut() = parts.version;
    *probe.headers_mut() = parts.headers.clone();
    probe
}
