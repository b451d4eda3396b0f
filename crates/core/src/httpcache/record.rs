//! Mapping between `http` messages and stored response records.

use std::collections::BTreeMap;

use http::header::{CONTENT_DISPOSITION, CONTENT_ENCODING, CONTENT_TYPE, HOST};
use http::response::Parts;
use http::{HeaderMap, HeaderName, HeaderValue, Request, Response, StatusCode, Version};
use proxc_encoding::canonical;

use crate::Error;
use crate::cache::HttpResponseRecord;

/// Response extension set by a transport that already decoded the body.
///
/// When present the `Content-Encoding` header describes what the origin sent,
/// not what the body currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uncompressed;

/// Storage key for a request: `host[:port]` from the URI, else the `Host`
/// header.
pub fn request_host<B>(req: &Request<B>) -> String {
    if let Some(authority) = req.uri().authority() {
        return authority.as_str().rsplit('@').next().unwrap_or_default().to_ascii_lowercase();
    }
    req.headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Media type of a `Content-Type` value, lowercased and without parameters.
pub fn media_type(value: &str) -> String {
    value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

/// File name carried by a `Content-Disposition` value.
///
/// `filename*` (RFC 5987) wins over `filename` when both are present.
pub fn disposition_filename(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in value.split(';').skip(1) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let raw = raw.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "filename" => plain = Some(raw.trim_matches('"').to_string()),
            "filename*" => extended = decode_ext_value(raw),
            _ => {}
        }
    }

    extended.or(plain).filter(|name| !name.is_empty())
}

/// Decode `charset'lang'pct-encoded`.
fn decode_ext_value(raw: &str) -> Option<String> {
    let mut parts = raw.splitn(3, '\'');
    let charset = parts.next()?;
    let _lang = parts.next()?;
    let encoded = parts.next()?;

    let mut bytes = Vec::with_capacity(encoded.len());
    let mut iter = encoded.bytes();
    while let Some(b) = iter.next() {
        if b == b'%' {
            let hi = iter.next()?;
            let lo = iter.next()?;
            let hex = [hi, lo];
            let hex = std::str::from_utf8(&hex).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
        } else {
            bytes.push(b);
        }
    }

    if charset.eq_ignore_ascii_case("utf-8") {
        String::from_utf8(bytes).ok()
    } else {
        Some(bytes.iter().map(|&b| b as char).collect())
    }
}

pub fn proto_string(version: Version) -> String {
    format!("{version:?}")
}

pub fn parse_proto(proto: &str) -> Result<Version, Error> {
    match proto {
        "HTTP/0.9" => Ok(Version::HTTP_09),
        "HTTP/1.0" => Ok(Version::HTTP_10),
        "" | "HTTP/1.1" => Ok(Version::HTTP_11),
        "HTTP/2" | "HTTP/2.0" => Ok(Version::HTTP_2),
        "HTTP/3" | "HTTP/3.0" => Ok(Version::HTTP_3),
        other => Err(Error::InvalidRecord(format!("unknown protocol {other:?}"))),
    }
}

/// Serialize headers as `{"name": ["value", ...]}`.
///
/// Values that are not valid UTF-8 are stored lossily.
pub fn headers_to_json(headers: &HeaderMap) -> Result<String, Error> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        map.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    Ok(serde_json::to_string(&map)?)
}

pub fn headers_from_json(json: &str) -> Result<HeaderMap, Error> {
    let mut headers = HeaderMap::new();
    if json.trim().is_empty() {
        return Ok(headers);
    }

    let map: BTreeMap<String, Vec<String>> = serde_json::from_str(json)?;
    for (name, values) in map {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidRecord(format!("header name {name:?}: {e}")))?;
        for value in values {
            let value = HeaderValue::from_str(&value)
                .map_err(|e| Error::InvalidRecord(format!("header {name}: {e}")))?;
            headers.append(name.clone(), value);
        }
    }
    Ok(headers)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> &'a str {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or_default()
}

/// Build the candidate record for a captured exchange.
///
/// Body, sizes and the storage encoding are filled in by the caller.
pub fn build_record<B>(req: &Request<B>, parts: &Parts) -> Result<HttpResponseRecord, Error> {
    let origin_encoding = if parts.extensions.get::<Uncompressed>().is_some() {
        String::new()
    } else {
        canonical(header_str(&parts.headers, &CONTENT_ENCODING)).into_owned()
    };

    Ok(HttpResponseRecord {
        method: req.method().as_str().to_string(),
        url: req.uri().to_string(),
        host: request_host(req),
        path: req.uri().path().to_string(),
        proto: proto_string(parts.version),
        status_code: parts.status.as_u16(),
        header: headers_to_json(&parts.headers)?,
        origin_encoding,
        content_type: media_type(header_str(&parts.headers, &CONTENT_TYPE)),
        file_name: disposition_filename(header_str(&parts.headers, &CONTENT_DISPOSITION)),
        ..Default::default()
    })
}

/// Rebuild status, protocol and headers of a stored record.
pub fn response_parts(record: &HttpResponseRecord) -> Result<Parts, Error> {
    let status = StatusCode::from_u16(record.status_code)
        .map_err(|e| Error::InvalidRecord(format!("status {}: {e}", record.status_code)))?;

    let (mut parts, ()) = Response::new(()).into_parts();
    parts.status = status;
    parts.version = parse_proto(&record.proto)?;
    parts.headers = headers_from_json(&record.header)?;
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(headers: &[(&str, &str)]) -> (Request<()>, Parts) {
        let req = Request::get("https://example.com:8443/files/report.pdf?v=2").body(()).unwrap();
        let mut resp = Response::builder().status(200).version(Version::HTTP_2);
        for (name, value) in headers {
            resp = resp.header(*name, *value);
        }
        let (parts, ()) = resp.body(()).unwrap().into_parts();
        (req, parts)
    }

    #[test]
    fn test_request_host() {
        let req = Request::get("https://user@Example.com:8443/x").body(()).unwrap();
        assert_eq!(request_host(&req), "example.com:8443");

        let req = Request::get("/relative").header("host", "proxied.test").body(()).unwrap();
        assert_eq!(request_host(&req), "proxied.test");
    }

    #[test]
    fn test_media_type() {
        assert_eq!(media_type("Text/HTML; charset=utf-8"), "text/html");
        assert_eq!(media_type(""), "");
    }

    #[test]
    fn test_disposition_filename() {
        assert_eq!(disposition_filename("attachment; filename=\"report.pdf\""), Some("report.pdf".into()));
        assert_eq!(disposition_filename("attachment; filename=plain.txt"), Some("plain.txt".into()));
        assert_eq!(
            disposition_filename("attachment; filename=\"fallback.txt\"; filename*=UTF-8''na%C3%AFve.txt"),
            Some("naïve.txt".into())
        );
        assert_eq!(disposition_filename("inline"), None);
        assert_eq!(disposition_filename("attachment; filename=\"\""), None);
        assert_eq!(disposition_filename(""), None);
    }

    #[test]
    fn test_build_record() {
        let (req, parts) = exchange(&[
            ("content-type", "application/pdf"),
            ("content-encoding", "GZIP"),
            ("content-disposition", "attachment; filename=\"report.pdf\""),
        ]);

        let record = build_record(&req, &parts).unwrap();
        assert_eq!(record.method, "GET");
        assert_eq!(record.url, "https://example.com:8443/files/report.pdf?v=2");
        assert_eq!(record.host, "example.com:8443");
        assert_eq!(record.path, "/files/report.pdf");
        assert_eq!(record.proto, "HTTP/2.0");
        assert_eq!(record.origin_encoding, "gzip");
        assert_eq!(record.content_type, "application/pdf");
        assert_eq!(record.file_name.as_deref(), Some("report.pdf"));
    }

    #[test]
    fn test_uncompressed_marker_clears_origin_encoding() {
        let (req, mut parts) = exchange(&[("content-encoding", "br")]);
        parts.extensions.insert(Uncompressed);

        let record = build_record(&req, &parts).unwrap();
        assert_eq!(record.origin_encoding, "");
    }

    #[test]
    fn test_response_parts_roundtrip() {
        let (req, parts) = exchange(&[("set-cookie", "a=1"), ("set-cookie", "b=2"), ("x-custom", "yes")]);
        let record = build_record(&req, &parts).unwrap();

        let rebuilt = response_parts(&record).unwrap();
        assert_eq!(rebuilt.status, StatusCode::OK);
        assert_eq!(rebuilt.version, Version::HTTP_2);
        assert_eq!(rebuilt.headers.get_all("set-cookie").iter().count(), 2);
        assert_eq!(rebuilt.headers["x-custom"], "yes");
    }

    #[test]
    fn test_response_parts_rejects_bad_record() {
        let record = HttpResponseRecord { status_code: 42, ..Default::default() };
        assert!(matches!(response_parts(&record), Err(Error::InvalidRecord(_))));

        let record = HttpResponseRecord { status_code: 200, proto: "SPDY/3".into(), ..Default::default() };
        assert!(matches!(response_parts(&record), Err(Error::InvalidRecord(_))));

        let record = HttpResponseRecord { status_code: 200, header: "not json".into(), ..Default::default() };
        assert!(matches!(response_parts(&record), Err(Error::InvalidRecord(_))));
    }
}
