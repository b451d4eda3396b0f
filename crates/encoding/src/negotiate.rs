//! Simplified `Accept-Encoding` negotiation.
//!
//! Quality values are not ranked: the client's list order is the only
//! priority signal. A coding whose parameters carry `q=0` is skipped, other
//! parameters are ignored.

use crate::EncodingError;
use crate::registry::{Registry, canonical};

impl Registry {
    /// Pick the coding to deliver a body stored as `stored` to a client that
    /// sent `accept` as its `Accept-Encoding` value.
    ///
    /// Returns `""` for identity. If `stored` and `accept` already match it is
    /// returned as is; otherwise the first listed coding that equals `stored`
    /// or is registered wins.
    ///
    /// # Errors
    ///
    /// Returns `EncodingError::NoAcceptable` when no listed coding qualifies,
    /// including an empty list.
    pub fn negotiate(&self, stored: &str, accept: &str) -> Result<String, EncodingError> {
        let stored = canonical(stored);
        if stored == canonical(accept) {
            return Ok(stored.into_owned());
        }

        for candidate in accept.split(',') {
            let mut parts = candidate.split(';');
            let coding = parts.next().unwrap_or_default().trim();
            if coding.is_empty() || parts.any(is_zero_quality) {
                continue;
            }

            let coding = canonical(coding);
            if coding == stored || self.is_supported(&coding) {
                return Ok(coding.into_owned());
            }
        }

        Err(EncodingError::NoAcceptable(accept.to_string()))
    }
}

fn is_zero_quality(param: &str) -> bool {
    match param.split_once('=') {
        Some((key, value)) if key.trim().eq_ignore_ascii_case("q") => {
            value.trim().parse::<f32>().is_ok_and(|q| q == 0.0)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let registry = Registry::builtin();
        assert_eq!(registry.negotiate("gzip", "gzip").unwrap(), "gzip");
    }

    #[test]
    fn test_both_empty() {
        let registry = Registry::builtin();
        assert_eq!(registry.negotiate("", "").unwrap(), "");
        assert_eq!(registry.negotiate("identity", "").unwrap(), "");
        assert_eq!(registry.negotiate("", "identity").unwrap(), "");
    }

    #[test]
    fn test_empty_accept_with_stored_coding_fails() {
        let registry = Registry::builtin();
        let err = registry.negotiate("zstd", "").unwrap_err();
        assert!(matches!(err, EncodingError::NoAcceptable(_)));
        assert!(registry.negotiate("zstd", " , ,").is_err());
    }

    #[test]
    fn test_list_order_wins_over_stored() {
        let registry = Registry::builtin();
        assert_eq!(registry.negotiate("gzip", "br, gzip").unwrap(), "br");
        assert_eq!(registry.negotiate("zstd", "gzip, deflate").unwrap(), "gzip");
    }

    #[test]
    fn test_unknown_candidates_are_skipped() {
        let registry = Registry::builtin();
        assert_eq!(registry.negotiate("zstd", "lz4, *, deflate").unwrap(), "deflate");
        assert!(registry.negotiate("zstd", "lz4, compress").is_err());
    }

    #[test]
    fn test_stored_coding_accepted_even_if_unregistered() {
        let registry = Registry::new();
        assert_eq!(registry.negotiate("gzip", "gzip, br").unwrap(), "gzip");
    }

    #[test]
    fn test_identity_candidate() {
        let registry = Registry::builtin();
        assert_eq!(registry.negotiate("zstd", "identity").unwrap(), "");
        assert_eq!(registry.negotiate("zstd", "lz4, identity, gzip").unwrap(), "");
    }

    #[test]
    fn test_quality_parameters() {
        let registry = Registry::builtin();
        assert_eq!(registry.negotiate("zstd", "br;q=0.5, gzip;q=1.0").unwrap(), "br");
        assert_eq!(registry.negotiate("zstd", "br;q=0, gzip").unwrap(), "gzip");
        assert_eq!(registry.negotiate("zstd", "GZIP ; q=0.8").unwrap(), "gzip");
    }
}
