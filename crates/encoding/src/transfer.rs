//! Streaming transcoding between content-codings.
//!
//! Every conversion goes through [`Registry::transfer`]: equal codings are a
//! raw copy, anything else is decoded and re-encoded chunk by chunk without
//! materialising the decoded body.

use std::io::{self, Read, Write};

use crate::EncodingError;
use crate::registry::{Registry, canonical};

impl Registry {
    /// Copy `input` (encoded as `from`) to `output` (encoded as `to`).
    ///
    /// Returns the number of bytes read from `input` when the codings are
    /// equal, otherwise the number of decoded bytes that passed through.
    ///
    /// # Errors
    ///
    /// - `EncodingError::Unsupported` if either coding is not registered
    /// - `EncodingError::Transcode` on any read, write or finish failure
    /// - `EncodingError::TranscodeClose` if both the copy and finishing the
    ///   encoder failed
    pub fn transfer<R: Read, W: Write>(
        &self, from: &str, mut input: R, to: &str, mut output: W,
    ) -> Result<u64, EncodingError> {
        let (from, to) = (canonical(from), canonical(to));

        if from == to {
            return io::copy(&mut input, &mut output).map_err(EncodingError::Transcode);
        }

        let decoding = self.get(&from)?;
        let encoding = self.get(&to)?;

        let mut reader = decoding.decoder(Box::new(input)).map_err(EncodingError::Transcode)?;
        let mut writer = encoding
            .encoder(Box::new(&mut output))
            .map_err(EncodingError::Transcode)?;

        let copied = io::copy(&mut reader, &mut writer);
        let finished = writer.finish();

        match (copied, finished) {
            (Ok(n), Ok(())) => {
                tracing::trace!(from = %from, to = %to, raw_bytes = n, "transcoded stream");
                Ok(n)
            }
            (Err(e), Ok(())) | (Ok(_), Err(e)) => Err(EncodingError::Transcode(e)),
            (Err(source), Err(close)) => Err(EncodingError::TranscodeClose { source, close }),
        }
    }

    /// In-memory [`Registry::transfer`]. Returns the output bytes and the count
    /// `transfer` reported.
    pub fn transfer_bytes(&self, from: &str, input: &[u8], to: &str) -> Result<(Vec<u8>, u64), EncodingError> {
        let mut out = Vec::with_capacity(input.len());
        let n = self.transfer(from, input, to, &mut out)?;
        Ok((out, n))
    }

    pub fn encode_bytes(&self, name: &str, input: &[u8]) -> Result<Vec<u8>, EncodingError> {
        self.transfer_bytes("", input, name).map(|(out, _)| out)
    }

    pub fn decode_bytes(&self, name: &str, input: &[u8]) -> Result<Vec<u8>, EncodingError> {
        self.transfer_bytes(name, input, "").map(|(out, _)| out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{BROTLI, DEFLATE, GZIP, ZSTD};

    const NAMES: [&str; 5] = ["", GZIP, DEFLATE, BROTLI, ZSTD];

    #[test]
    fn test_transfer_chain_restores_plaintext() {
        let registry = Registry::builtin();
        let raw = include_bytes!("transfer.rs");

        let (a, _) = registry.transfer_bytes("", raw, GZIP).unwrap();
        let (b, _) = registry.transfer_bytes(GZIP, &a, BROTLI).unwrap();
        let (c, _) = registry.transfer_bytes(BROTLI, &b, ZSTD).unwrap();
        let (r, _) = registry.transfer_bytes(ZSTD, &c, "").unwrap();

        assert_eq!(r, raw.to_vec());
    }

    #[test]
    fn test_transfer_through_intermediate_is_lossless() {
        let registry = Registry::builtin();
        let raw = include_bytes!("registry.rs");

        for a in NAMES {
            let encoded_a = registry.encode_bytes(a, raw).unwrap();
            for b in NAMES {
                let (via_b, _) = registry.transfer_bytes(a, &encoded_a, b).unwrap();
                let (back, _) = registry.transfer_bytes(b, &via_b, a).unwrap();
                assert_eq!(registry.decode_bytes(a, &back).unwrap(), raw.to_vec(), "{a:?} -> {b:?}");
            }
        }
    }

    #[test]
    fn test_same_coding_is_raw_copy() {
        let registry = Registry::builtin();
        let payload = b"\x1f\x8b not really gzip";
        let (out, n) = registry.transfer_bytes(GZIP, payload, "gzip").unwrap();
        assert_eq!(out, payload.to_vec());
        assert_eq!(n, payload.len() as u64);
    }

    #[test]
    fn test_identity_aliases_are_equal() {
        let registry = Registry::new();
        let (out, n) = registry.transfer_bytes("identity", b"abc", "").unwrap();
        assert_eq!(out, b"abc".to_vec());
        assert_eq!(n, 3);
    }

    #[test]
    fn test_transfer_counts_decoded_bytes() {
        let registry = Registry::builtin();
        let raw = vec![b'a'; 10_000];
        let gz = registry.encode_bytes(GZIP, &raw).unwrap();
        let (zst, n) = registry.transfer_bytes(GZIP, &gz, ZSTD).unwrap();
        assert_eq!(n, raw.len() as u64);
        assert!(zst.len() < raw.len());
    }

    #[test]
    fn test_transfer_unsupported() {
        let registry = Registry::builtin();
        let err = registry.transfer_bytes("lz4", b"x", GZIP).unwrap_err();
        assert!(matches!(err, EncodingError::Unsupported(name) if name == "lz4"));
        let err = registry.transfer_bytes(GZIP, b"x", "compress").unwrap_err();
        assert!(matches!(err, EncodingError::Unsupported(name) if name == "compress"));
    }

    #[test]
    fn test_transfer_corrupt_input() {
        let registry = Registry::builtin();
        let err = registry.transfer_bytes(ZSTD, b"definitely not zstd", GZIP).unwrap_err();
        assert!(matches!(err, EncodingError::Transcode(_) | EncodingError::TranscodeClose { .. }));
    }

    #[test]
    fn test_transfer_write_failure_is_reported() {
        struct Refuse;
        impl Write for Refuse {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::other("refused"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Err(io::Error::other("refused"))
            }
        }

        let registry = Registry::builtin();
        let raw = vec![1u8; 1 << 16];
        for to in [GZIP, DEFLATE, BROTLI, ZSTD] {
            let result = registry.transfer("", &raw[..], to, Refuse);
            assert!(result.is_err(), "{to} swallowed a write error");
        }
    }
}
