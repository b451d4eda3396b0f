//! Subcommand implementations.
//!
//! Each command writes its report to the given writer so tests can capture it.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING};
use http::{Method, Request, Uri};
use proxc_client::{FetchClient, FetchConfig, request_uri};
use proxc_core::httpcache::request_host;
use proxc_core::{Body, CacheConfig, CachingTransport, FileContent, FileRef, HttpCache};
use proxc_encoding::Registry;
use serde::Serialize;

/// Method and canonical URI naming one cache entry.
#[derive(Debug, Clone)]
pub struct Target {
    pub method: Method,
    pub uri: Uri,
}

impl Target {
    pub fn parse(method: &str, url: &str) -> Result<Self> {
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .with_context(|| format!("invalid method {method:?}"))?;
        let uri = request_uri(url)?;
        Ok(Self { method, uri })
    }

    fn probe(&self) -> Request<()> {
        let mut req = Request::new(());
        *req.method_mut() = self.method.clone();
        *req.uri_mut() = self.uri.clone();
        req
    }
}

pub async fn fetch(
    config: &CacheConfig,
    target: &Target,
    accept_encoding: &str,
    raw: bool,
    err: &mut impl Write,
    out: &mut impl Write,
) -> Result<()> {
    let client = FetchClient::new(FetchConfig::from(config))?;
    let transport = CachingTransport::new(Arc::new(HttpCache::from_config(config)), client);

    let req = Request::builder()
        .method(target.method.clone())
        .uri(target.uri.clone())
        .header(ACCEPT_ENCODING, accept_encoding)
        .body(Body::Empty)?;
    let resp = transport.round_trip(req).await?;

    writeln!(err, "{:?} {}", resp.version(), resp.status())?;
    for (name, value) in resp.headers() {
        writeln!(err, "{}: {}", name, String::from_utf8_lossy(value.as_bytes()))?;
    }

    let encoding = resp
        .headers()
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = resp.into_body().collect().await.context("reading response body")?;

    if raw || encoding.is_empty() {
        out.write_all(&body)?;
    } else {
        let decoded = Registry::global().decode_bytes(&encoding, &body)?;
        out.write_all(&decoded)?;
    }
    out.flush()?;
    Ok(())
}

pub async fn show(cache: &HttpCache, target: &Target, out: &mut impl Write) -> Result<()> {
    let req = target.probe();
    let store = cache.response_store(&request_host(&req)).await?;
    let Some(record) = store.get_response(target.method.as_str(), &target.uri.to_string()).await? else {
        bail!("no cached response for {} {}", target.method, target.uri);
    };

    writeln!(out, "{}", serde_json::to_string_pretty(&record)?)?;
    Ok(())
}

pub async fn delete(cache: &HttpCache, target: &Target, out: &mut impl Write) -> Result<()> {
    let removed = cache.delete_response(&target.probe()).await?;
    tracing::info!(url = %target.uri, method = %target.method, removed, "delete");
    writeln!(out, "{}", if removed { "deleted" } else { "not cached" })?;
    Ok(())
}

pub async fn list(cache: &HttpCache, host: &str, limit: usize, out: &mut impl Write) -> Result<()> {
    let store = cache.response_store(&host.to_ascii_lowercase()).await?;
    let rows = store.list_responses(limit).await?;
    writeln!(out, "{}", serde_json::to_string_pretty(&rows)?)?;
    Ok(())
}

#[derive(Serialize)]
struct FileReport {
    file: FileContent,
    refs: Vec<FileRef>,
}

pub async fn file(cache: &HttpCache, hash: &str, output: Option<&Path>, out: &mut impl Write) -> Result<()> {
    let store = cache.file_store().await?;
    let Some(file) = store.get_file(hash).await? else {
        bail!("no stored file {hash}");
    };
    let refs = store.file_refs(hash).await?;

    if let Some(path) = output {
        tokio::fs::write(path, &file.content)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
    }

    writeln!(out, "{}", serde_json::to_string_pretty(&FileReport { file, refs })?)?;
    Ok(())
}

pub fn print_config(config: &CacheConfig, out: &mut impl Write) -> Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(config)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use http::Response;
    use proxc_core::cache::content_hash;

    use super::*;

    async fn seed(cache: &HttpCache, url: &str, resp: Response<Body>) {
        let req = Request::get(url).body(()).unwrap();
        cache.set_response(&req, resp).await.unwrap();
    }

    fn text_response(body: &'static str) -> Response<Body> {
        Response::builder()
            .status(200)
            .header("content-type", "text/plain")
            .body(Body::from(body))
            .unwrap()
    }

    fn output(buf: Vec<u8>) -> serde_json::Value {
        serde_json::from_slice(&buf).unwrap()
    }

    #[test]
    fn test_target_parse() {
        let target = Target::parse("head", "example.com/a").unwrap();
        assert_eq!(target.method, Method::HEAD);
        assert_eq!(target.uri.to_string(), "https://example.com/a");

        assert!(Target::parse("GET", "").is_err());
        assert!(Target::parse("GE T", "example.com").is_err());
    }

    #[tokio::test]
    async fn test_show_prints_record() {
        let cache = HttpCache::in_memory();
        seed(&cache, "https://example.com/a", text_response("hello")).await;

        let mut buf = Vec::new();
        show(&cache, &Target::parse("GET", "https://example.com/a").unwrap(), &mut buf).await.unwrap();

        let json = output(buf);
        assert_eq!(json["url"], "https://example.com/a");
        assert_eq!(json["status_code"], 200);
        assert_eq!(json["raw_size"], 5);
        assert!(json.get("body").is_none());
    }

    #[tokio::test]
    async fn test_show_miss_is_error() {
        let cache = HttpCache::in_memory();
        let mut buf = Vec::new();
        let result = show(&cache, &Target::parse("GET", "https://example.com/none").unwrap(), &mut buf).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_delete_reports_outcome() {
        let cache = HttpCache::in_memory();
        seed(&cache, "https://example.com/a", text_response("hello")).await;
        let target = Target::parse("GET", "https://example.com/a").unwrap();

        let mut buf = Vec::new();
        delete(&cache, &target, &mut buf).await.unwrap();
        delete(&cache, &target, &mut buf).await.unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "deleted\nnot cached\n");
    }

    #[tokio::test]
    async fn test_list_per_host() {
        let dir = tempfile::tempdir().unwrap();
        let cache = HttpCache::in_dir(dir.path());
        seed(&cache, "https://a.test/1", text_response("one")).await;
        seed(&cache, "https://a.test/2", text_response("two")).await;
        seed(&cache, "https://b.test/1", text_response("three")).await;

        let mut buf = Vec::new();
        list(&cache, "A.test", 10, &mut buf).await.unwrap();
        let json = output(buf);
        assert_eq!(json.as_array().unwrap().len(), 2);

        let mut buf = Vec::new();
        list(&cache, "a.test", 1, &mut buf).await.unwrap();
        assert_eq!(output(buf).as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_report_and_output() {
        let dir = tempfile::tempdir().unwrap();
        let cache = HttpCache::in_memory();
        let attachment = || {
            Response::builder()
                .status(200)
                .header("content-type", "application/pdf")
                .header("content-disposition", "attachment; filename=\"report.pdf\"")
                .body(Body::from(bytes::Bytes::from_static(b"%PDF-1.7 fake")))
                .unwrap()
        };
        seed(&cache, "https://a.test/r", attachment()).await;
        seed(&cache, "https://b.test/r", attachment()).await;

        let hash = content_hash(b"%PDF-1.7 fake");
        let path = dir.path().join("out.pdf");
        let mut buf = Vec::new();
        file(&cache, &hash, Some(&path), &mut buf).await.unwrap();

        let json = output(buf);
        assert_eq!(json["file"]["name"], "report.pdf");
        assert_eq!(json["file"]["ext"], "pdf");
        assert_eq!(json["refs"].as_array().unwrap().len(), 2);
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7 fake");
    }

    #[tokio::test]
    async fn test_file_unknown_hash() {
        let cache = HttpCache::in_memory();
        let mut buf = Vec::new();
        assert!(file(&cache, "00", None, &mut buf).await.is_err());
    }

    #[test]
    fn test_print_config() {
        let mut buf = Vec::new();
        print_config(&CacheConfig::default(), &mut buf).unwrap();
        let json = output(buf);
        assert_eq!(json["default_encoding"], "zstd");
        assert_eq!(json["in_memory"], false);
    }
}
