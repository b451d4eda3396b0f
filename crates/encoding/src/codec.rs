//! Built-in content-coding codecs.
//!
//! Every codec wraps a reader to decode and a writer to encode. Encoders
//! buffer frame data internally, so callers must [`FinishWrite::finish`]
//! them to get a complete stream.

use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::read::{MultiGzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};

pub const IDENTITY: &str = "identity";
pub const GZIP: &str = "gzip";
pub const DEFLATE: &str = "deflate";
pub const BROTLI: &str = "br";
pub const ZSTD: &str = "zstd";

const BROTLI_BUFFER: usize = 4096;
const BROTLI_QUALITY: u32 = 6;
const BROTLI_LGWIN: u32 = 22;

/// An encoding stream that has to be finished to emit its trailer.
pub trait FinishWrite: Write {
    /// Flush buffered data, write the trailer and flush the inner writer.
    fn finish(self: Box<Self>) -> io::Result<()>;
}

/// A named, invertible byte-stream transformation.
pub trait Codec: Send + Sync {
    fn name(&self) -> &str;

    /// Wrap `reader` so that reads yield decoded bytes.
    fn decoder<'a>(&self, reader: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>>;

    /// Wrap `writer` so that written bytes are encoded into it.
    fn encoder<'a>(&self, writer: Box<dyn Write + 'a>) -> io::Result<Box<dyn FinishWrite + 'a>>;
}

/// Pass-through codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct Identity;

struct Passthrough<W>(W);

impl<W: Write> Write for Passthrough<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<W: Write> FinishWrite for Passthrough<W> {
    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.0.flush()
    }
}

impl Codec for Identity {
    fn name(&self) -> &str {
        IDENTITY
    }

    fn decoder<'a>(&self, reader: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>> {
        Ok(reader)
    }

    fn encoder<'a>(&self, writer: Box<dyn Write + 'a>) -> io::Result<Box<dyn FinishWrite + 'a>> {
        Ok(Box::new(Passthrough(writer)))
    }
}

/// `gzip` content-coding. Decoding accepts multi-member streams.
#[derive(Debug, Clone, Copy)]
pub struct Gzip {
    pub level: Compression,
}

impl Default for Gzip {
    fn default() -> Self {
        Self { level: Compression::default() }
    }
}

impl<W: Write> FinishWrite for GzEncoder<W> {
    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.try_finish()?;
        self.get_mut().flush()
    }
}

impl Codec for Gzip {
    fn name(&self) -> &str {
        GZIP
    }

    fn decoder<'a>(&self, reader: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>> {
        Ok(Box::new(MultiGzDecoder::new(reader)))
    }

    fn encoder<'a>(&self, writer: Box<dyn Write + 'a>) -> io::Result<Box<dyn FinishWrite + 'a>> {
        Ok(Box::new(GzEncoder::new(writer, self.level)))
    }
}

/// HTTP `deflate` content-coding, which is the zlib format.
#[derive(Debug, Clone, Copy)]
pub struct Deflate {
    pub level: Compression,
}

impl Default for Deflate {
    fn default() -> Self {
        Self { level: Compression::default() }
    }
}

impl<W: Write> FinishWrite for ZlibEncoder<W> {
    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.try_finish()?;
        self.get_mut().flush()
    }
}

impl Codec for Deflate {
    fn name(&self) -> &str {
        DEFLATE
    }

    fn decoder<'a>(&self, reader: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>> {
        Ok(Box::new(ZlibDecoder::new(reader)))
    }

    fn encoder<'a>(&self, writer: Box<dyn Write + 'a>) -> io::Result<Box<dyn FinishWrite + 'a>> {
        Ok(Box::new(ZlibEncoder::new(writer, self.level)))
    }
}

/// `br` content-coding.
#[derive(Debug, Default, Clone, Copy)]
pub struct Brotli;

/// Remembers the first write error of the inner writer.
///
/// The brotli compressor swallows I/O errors when it is consumed, so the
/// failure is recovered from here instead.
struct Tracked<W> {
    inner: W,
    failed: Option<io::Error>,
}

impl<W: Write> Tracked<W> {
    fn record(&mut self, err: io::Error) -> io::Error {
        if self.failed.is_none() {
            self.failed = Some(io::Error::new(err.kind(), err.to_string()));
        }
        err
    }
}

impl<W: Write> Write for Tracked<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf).map_err(|e| self.record(e))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().map_err(|e| self.record(e))
    }
}

struct BrotliWriter<W: Write> {
    inner: brotli::CompressorWriter<Tracked<W>>,
}

impl<W: Write> Write for BrotliWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> FinishWrite for BrotliWriter<W> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        let mut tracked = self.inner.into_inner();
        match tracked.failed.take() {
            Some(err) => Err(err),
            None => tracked.inner.flush(),
        }
    }
}

impl Codec for Brotli {
    fn name(&self) -> &str {
        BROTLI
    }

    fn decoder<'a>(&self, reader: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>> {
        Ok(Box::new(brotli::Decompressor::new(reader, BROTLI_BUFFER)))
    }

    fn encoder<'a>(&self, writer: Box<dyn Write + 'a>) -> io::Result<Box<dyn FinishWrite + 'a>> {
        let tracked = Tracked { inner: writer, failed: None };
        let inner = brotli::CompressorWriter::new(tracked, BROTLI_BUFFER, BROTLI_QUALITY, BROTLI_LGWIN);
        Ok(Box::new(BrotliWriter { inner }))
    }
}

/// `zstd` content-coding.
#[derive(Debug, Clone, Copy)]
pub struct Zstd {
    pub level: i32,
}

impl Default for Zstd {
    fn default() -> Self {
        Self { level: zstd::DEFAULT_COMPRESSION_LEVEL }
    }
}

impl<W: Write> FinishWrite for zstd::stream::write::Encoder<'static, W> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        let mut inner = zstd::stream::write::Encoder::finish(*self)?;
        inner.flush()
    }
}

impl Codec for Zstd {
    fn name(&self) -> &str {
        ZSTD
    }

    fn decoder<'a>(&self, reader: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>> {
        Ok(Box::new(zstd::stream::read::Decoder::new(reader)?))
    }

    fn encoder<'a>(&self, writer: Box<dyn Write + 'a>) -> io::Result<Box<dyn FinishWrite + 'a>> {
        Ok(Box::new(zstd::stream::write::Encoder::new(writer, self.level)?))
    }
}
