//! Response bodies as seen by the cache.

use std::fmt;
use std::io;

use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, Stream, StreamExt, TryStreamExt};

/// A response body.
///
/// `Empty` is a sentinel distinct from a zero-length `Full`: a response that
/// arrived without a body keeps reporting no body after the cache drained it.
#[derive(Default)]
pub enum Body {
    #[default]
    Empty,
    Full(Bytes),
    Stream(BoxStream<'static, io::Result<Bytes>>),
}

impl Body {
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Body::Stream(stream.boxed())
    }

    /// Whether this is the no-body sentinel.
    pub fn is_empty_sentinel(&self) -> bool {
        matches!(self, Body::Empty)
    }

    /// Read the whole body into memory.
    pub async fn collect(self) -> io::Result<Bytes> {
        match self {
            Body::Empty => Ok(Bytes::new()),
            Body::Full(bytes) => Ok(bytes),
            Body::Stream(stream) => {
                let buf = stream
                    .try_fold(BytesMut::new(), |mut buf, chunk| async move {
                        buf.extend_from_slice(&chunk);
                        Ok(buf)
                    })
                    .await?;
                Ok(buf.freeze())
            }
        }
    }

    /// Read the body once, returning the bytes and a replayable body.
    ///
    /// The replacement is `Empty` when the original was `Empty`.
    pub async fn drain(self) -> io::Result<(Bytes, Body)> {
        if self.is_empty_sentinel() {
            return Ok((Bytes::new(), Body::Empty));
        }
        let bytes = self.collect().await?;
        Ok((bytes.clone(), Body::Full(bytes)))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Body::Empty"),
            Body::Full(bytes) => f.debug_tuple("Body::Full").field(&bytes.len()).finish(),
            Body::Stream(_) => f.write_str("Body::Stream(..)"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Full(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Full(bytes.into())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Full(text.into())
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Body::Full(Bytes::from_static(text.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;

    #[tokio::test]
    async fn test_drain_keeps_empty_sentinel() {
        let (bytes, body) = Body::Empty.drain().await.unwrap();
        assert!(bytes.is_empty());
        assert!(body.is_empty_sentinel());

        let (bytes, body) = Body::Full(Bytes::new()).drain().await.unwrap();
        assert!(bytes.is_empty());
        assert!(!body.is_empty_sentinel());
    }

    #[tokio::test]
    async fn test_drain_stream_is_replayable() {
        let chunks = vec![Ok(Bytes::from_static(b"hello ")), Ok(Bytes::from_static(b"world"))];
        let (bytes, body) = Body::from_stream(stream::iter(chunks)).drain().await.unwrap();

        assert_eq!(&bytes[..], b"hello world");
        assert_eq!(&body.collect().await.unwrap()[..], b"hello world");
    }

    #[tokio::test]
    async fn test_stream_error_surfaces() {
        let chunks = vec![Ok(Bytes::from_static(b"partial")), Err(io::Error::other("reset"))];
        let err = Body::from_stream(stream::iter(chunks)).drain().await.unwrap_err();
        assert_eq!(err.to_string(), "reset");
    }
}
