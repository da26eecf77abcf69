//! Serializes response heads.
//!
//! The status line follows the response version (HTTP/1.0 or HTTP/1.1). Framing
//! headers are rewritten from the [`PayloadSize`] so they always agree with the
//! payload that follows.

use std::io;
use std::io::{ErrorKind, Write};

use bytes::{BufMut, BytesMut};
use http::{HeaderValue, Version, header};
use tokio_util::codec::Encoder;
use tracing::error;

use crate::protocol::{PayloadSize, ResponseHead, SendError};

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderEncoder;

impl Encoder<(ResponseHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut header, payload_size) = item;

        let version = match header.version() {
            Version::HTTP_11 => "HTTP/1.1",
            Version::HTTP_10 => "HTTP/1.0",
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        };

        dst.reserve(INIT_HEADER_SIZE);
        write!(
            FastWrite(dst),
            "{} {} {}\r\n",
            version,
            header.status().as_str(),
            header.status().canonical_reason().unwrap_or("")
        )?;

        let headers = header.headers_mut();
        match payload_size {
            PayloadSize::Length(n) => {
                headers.remove(header::TRANSFER_ENCODING);
                headers.insert(header::CONTENT_LENGTH, n.into());
            }
            PayloadSize::Chunked => {
                headers.remove(header::CONTENT_LENGTH);
                headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
            }
            PayloadSize::UntilClose => {
                headers.remove(header::CONTENT_LENGTH);
                headers.remove(header::TRANSFER_ENCODING);
                headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
            }
            // a head-only response may announce the framing its body would have had
            PayloadSize::Empty => {
                if !headers.contains_key(header::CONTENT_LENGTH) && !headers.contains_key(header::TRANSFER_ENCODING) {
                    headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
                }
            }
        }

        for (header_name, header_value) in headers.iter() {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Response, StatusCode};

    fn encode(head: ResponseHead, payload_size: PayloadSize) -> String {
        let mut dst = BytesMut::new();
        HeaderEncoder.encode((head, payload_size), &mut dst).unwrap();
        String::from_utf8(dst.to_vec()).unwrap()
    }

    #[test]
    fn writes_status_line_and_length() {
        let head = Response::builder().status(StatusCode::OK).header("X-Test", "1").body(()).unwrap();
        let encoded = encode(head, PayloadSize::Length(18));

        assert!(encoded.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(encoded.contains("x-test: 1\r\n"));
        assert!(encoded.contains("content-length: 18\r\n"));
        assert!(encoded.ends_with("\r\n\r\n"));
    }

    #[test]
    fn http10_status_line() {
        let head = Response::builder().status(StatusCode::NOT_FOUND).version(Version::HTTP_10).body(()).unwrap();
        let encoded = encode(head, PayloadSize::Empty);

        assert!(encoded.starts_with("HTTP/1.0 404 Not Found\r\n"));
        assert!(encoded.contains("content-length: 0\r\n"));
    }

    #[test]
    fn chunked_replaces_content_length() {
        let head = Response::builder().status(StatusCode::OK).header(header::CONTENT_LENGTH, "5").body(()).unwrap();
        let encoded = encode(head, PayloadSize::Chunked);

        assert!(encoded.contains("transfer-encoding: chunked\r\n"));
        assert!(!encoded.contains("content-length"));
    }

    #[test]
    fn until_close_drops_framing_headers() {
        let head = Response::builder()
            .status(StatusCode::OK)
            .version(Version::HTTP_10)
            .header(header::CONTENT_LENGTH, "5")
            .header(header::TRANSFER_ENCODING, "chunked")
            .body(())
            .unwrap();
        let encoded = encode(head, PayloadSize::UntilClose);

        assert!(encoded.starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(!encoded.contains("content-length"));
        assert!(!encoded.contains("transfer-encoding"));
        assert!(encoded.contains("connection: close\r\n"));
    }

    #[test]
    fn empty_keeps_announced_length() {
        let head = Response::builder().status(StatusCode::OK).header(header::CONTENT_LENGTH, "42").body(()).unwrap();
        let encoded = encode(head, PayloadSize::Empty);

        assert!(encoded.contains("content-length: 42\r\n"));
    }

    #[test]
    fn rejects_http2() {
        let head = Response::builder().status(StatusCode::OK).version(Version::HTTP_2).body(()).unwrap();
        assert!(HeaderEncoder.encode((head, PayloadSize::Empty), &mut BytesMut::new()).is_err());
    }
}
