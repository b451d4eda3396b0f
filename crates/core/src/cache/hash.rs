//! Content-addressed hashing for the file store.

use std::io::{self, Read};

use sha2::{Digest, Sha256};

/// Hex SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hex SHA-256 of everything `reader` yields.
pub fn content_hash_reader(mut reader: impl Read) -> io::Result<String> {
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Whether `value` looks like a hash produced by [`content_hash`].
pub fn is_content_hash(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_stability() {
        assert_eq!(content_hash(b"hello"), content_hash(b"hello"));
        assert_ne!(content_hash(b"hello"), content_hash(b"hello!"));
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(content_hash(b""), "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
    }

    #[test]
    fn test_reader_matches_slice() {
        let data = vec![42u8; 100_000];
        assert_eq!(content_hash_reader(&data[..]).unwrap(), content_hash(&data));
    }

    #[test]
    fn test_hash_format() {
        let hash = content_hash(b"https://example.com");
        assert!(is_content_hash(&hash));
        assert!(!is_content_hash("abc"));
        assert!(!is_content_hash(&"z".repeat(64)));
    }
}
