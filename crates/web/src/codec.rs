//! Streaming gzip/deflate compression for response bodies.
//!
//! [`StreamingCodec`] consumes input in arbitrary pieces and hands back whatever
//! compressed bytes are ready. The output may lag the input, so [`encode`] can
//! return an empty buffer; [`finish`] flushes the remainder and the stream trailer.
//!
//! [`encode`]: StreamingCodec::encode
//! [`finish`]: StreamingCodec::finish

use std::fmt;
use std::io::{self, Write};

use bytes::{Bytes, BytesMut};
use flate2::write::{GzEncoder, ZlibEncoder};
use tracing::trace;

/// A compression family understood by HTTP clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    /// zlib-wrapped deflate, which is what HTTP calls `deflate`
    Deflate,
}

impl Compression {
    /// The `Content-Encoding` token for this family.
    pub fn content_encoding(self) -> &'static str {
        match self {
            Compression::Gzip => "gzip",
            Compression::Deflate => "deflate",
        }
    }

    /// Picks gzip when the client accepts it, otherwise deflate, otherwise nothing.
    ///
    /// The header is searched for the coding names only; quality values are not
    /// parsed, so `gzip;q=0` still selects gzip.
    pub fn from_accept_encoding(accept_encoding: &str) -> Option<Self> {
        let accept_encoding = accept_encoding.to_ascii_lowercase();
        if accept_encoding.contains("gzip") {
            Some(Compression::Gzip)
        } else if accept_encoding.contains("deflate") {
            Some(Compression::Deflate)
        } else {
            None
        }
    }
}

struct Writer {
    buf: BytesMut,
}

impl Writer {
    fn new() -> Self {
        Self { buf: BytesMut::with_capacity(8192) }
    }

    fn take(&mut self) -> Bytes {
        self.buf.split().freeze()
    }
}

impl Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

enum Encoder {
    Gzip(GzEncoder<Writer>),
    Deflate(ZlibEncoder<Writer>),
}

/// A compressor fed incrementally, one input chunk at a time.
pub struct StreamingCodec {
    encoder: Encoder,
}

impl StreamingCodec {
    pub fn new(compression: Compression) -> Self {
        let level = flate2::Compression::default();
        let encoder = match compression {
            Compression::Gzip => Encoder::Gzip(GzEncoder::new(Writer::new(), level)),
            Compression::Deflate => Encoder::Deflate(ZlibEncoder::new(Writer::new(), level)),
        };
        Self { encoder }
    }

    pub fn compression(&self) -> Compression {
        match self.encoder {
            Encoder::Gzip(_) => Compression::Gzip,
            Encoder::Deflate(_) => Compression::Deflate,
        }
    }

    /// Feeds `input` and returns the compressed bytes produced so far.
    pub fn encode(&mut self, input: &[u8]) -> io::Result<Bytes> {
        let output = match &mut self.encoder {
            Encoder::Gzip(encoder) => {
                encoder.write_all(input)?;
                encoder.get_mut().take()
            }
            Encoder::Deflate(encoder) => {
                encoder.write_all(input)?;
                encoder.get_mut().take()
            }
        };
        trace!(input = input.len(), output = output.len(), "encoded chunk");
        Ok(output)
    }

    /// Ends the stream, returning the buffered remainder and the trailer.
    pub fn finish(self) -> io::Result<Bytes> {
        let mut writer = match self.encoder {
            Encoder::Gzip(encoder) => encoder.finish()?,
            Encoder::Deflate(encoder) => encoder.finish()?,
        };
        Ok(writer.take())
    }
}

impl fmt::Debug for StreamingCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingCodec").field("compression", &self.compression()).finish()
    }
}

/// Compresses a complete buffer in one go.
pub fn compress(compression: Compression, input: &[u8]) -> io::Result<Bytes> {
    let mut codec = StreamingCodec::new(compression);
    let head = codec.encode(input)?;
    let tail = codec.finish()?;

    if head.is_empty() {
        return Ok(tail);
    }
    let mut buf = BytesMut::with_capacity(head.len() + tail.len());
    buf.extend_from_slice(&head);
    buf.extend_from_slice(&tail);
    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::{GzDecoder, ZlibDecoder};
    use std::io::Read;

    fn gunzip(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        GzDecoder::new(data).read_to_end(&mut out).unwrap();
        out
    }

    fn inflate(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        ZlibDecoder::new(data).read_to_end(&mut out).unwrap();
        out
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn gzip_symmetry() {
        for len in [0, 1, 128 * 1024 + 17] {
            let input = sample(len);
            let compressed = compress(Compression::Gzip, &input).unwrap();
            assert_eq!(gunzip(&compressed), input, "len {len}");
        }
    }

    #[test]
    fn deflate_symmetry() {
        let input = sample(4096);
        let compressed = compress(Compression::Deflate, &input).unwrap();
        assert_eq!(inflate(&compressed), input);
    }

    #[test]
    fn streaming_matches_input_across_chunks() {
        let input = sample(300_000);
        let mut codec = StreamingCodec::new(Compression::Gzip);
        let mut compressed = Vec::new();
        for chunk in input.chunks(65_536) {
            compressed.extend_from_slice(&codec.encode(chunk).unwrap());
        }
        compressed.extend_from_slice(&codec.finish().unwrap());

        assert_eq!(gunzip(&compressed), input);
    }

    #[test]
    fn accept_encoding_preference() {
        assert_eq!(Compression::from_accept_encoding("deflate, gzip;q=1.0"), Some(Compression::Gzip));
        assert_eq!(Compression::from_accept_encoding("deflate"), Some(Compression::Deflate));
        assert_eq!(Compression::from_accept_encoding("GZIP"), Some(Compression::Gzip));
        assert_eq!(Compression::from_accept_encoding("br, identity"), None);
        assert_eq!(Compression::from_accept_encoding("gzip;q=0, deflate"), Some(Compression::Gzip));
    }
}
