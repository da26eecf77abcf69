//! Parses request heads with `httparse`.
//!
//! Limits: at most 64 headers and 8KB of head. Only HTTP/1.0 and HTTP/1.1 are accepted.

use bytes::{Buf, BytesMut};
use http::{HeaderName, HeaderValue, Request};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, RequestHeader};

/// Maximum number of headers allowed in a request
const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the entire header section
const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Decodes a [`RequestHeader`] and the [`PayloadSize`] announced by its framing headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderDecoder;

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut headers);

        let status = req.parse(src).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e.to_string()),
        })?;

        let body_offset = match status {
            Status::Complete(body_offset) => body_offset,
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
        };

        trace!(header_size = body_offset, "parsed request head");
        ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

        let version = match req.version {
            Some(0) => http::Version::HTTP_10,
            Some(1) => http::Version::HTTP_11,
            // HTTP/2 and HTTP/3 are not supported
            v => return Err(ParseError::InvalidVersion(v)),
        };

        let mut builder = Request::builder()
            .method(req.method.ok_or(ParseError::InvalidMethod)?)
            .uri(req.path.ok_or(ParseError::InvalidUri)?)
            .version(version);

        for header in req.headers.iter() {
            let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(ParseError::invalid_header)?;
            let value = HeaderValue::from_bytes(header.value).map_err(ParseError::invalid_header)?;
            builder = builder.header(name, value);
        }

        let header = RequestHeader::from(builder.body(()).map_err(|e| match e {
            e if e.is::<http::method::InvalidMethod>() => ParseError::InvalidMethod,
            e if e.is::<http::uri::InvalidUri>() => ParseError::InvalidUri,
            e => ParseError::invalid_header(e),
        })?);

        let payload_size = parse_payload(&header)?;
        src.advance(body_offset);

        Ok(Some((header, payload_size)))
    }
}

/// Selects the payload framing from `Transfer-Encoding` and `Content-Length`.
///
/// refer: <https://www.rfc-editor.org/rfc/rfc9112.html#name-message-body-length>
fn parse_payload(header: &RequestHeader) -> Result<PayloadSize, ParseError> {
    let te_header = header.headers().get(http::header::TRANSFER_ENCODING);
    let cl_header = header.headers().get(http::header::CONTENT_LENGTH);

    match (te_header, cl_header) {
        (None, None) => Ok(PayloadSize::Empty),

        (Some(te_value), None) => {
            if is_chunked(te_value) {
                Ok(PayloadSize::Chunked)
            } else {
                Err(ParseError::invalid_body("transfer-encoding without chunked as final coding"))
            }
        }

        (None, Some(cl_value)) => {
            let cl_str = cl_value.to_str().map_err(|_| ParseError::invalid_content_length("value can't to_str"))?;

            let length = cl_str
                .trim()
                .parse::<u64>()
                .map_err(|_| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;

            if length == 0 { Ok(PayloadSize::Empty) } else { Ok(PayloadSize::Length(length)) }
        }

        (Some(_), Some(_)) => {
            Err(ParseError::invalid_content_length("transfer_encoding and content_length both present in headers"))
        }
    }
}

/// Chunked must be the final coding when present.
fn is_chunked(value: &HeaderValue) -> bool {
    value.as_bytes().rsplit(|b| *b == b',').next().is_some_and(|last| last.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, Version};
    use indoc::indoc;

    #[test]
    fn check_is_chunked() {
        assert!(is_chunked(&HeaderValue::from_static("chunked")));
        assert!(is_chunked(&HeaderValue::from_static("gzip, chunked")));
        assert!(!is_chunked(&HeaderValue::from_static("chunked, gzip")));
        assert!(!is_chunked(&HeaderValue::from_static("gzip")));
    }

    #[test]
    fn leaves_body_bytes_in_buffer() {
        let str = indoc! {r##"
        POST /upload HTTP/1.1
        Host: 127.0.0.1:8080
        Content-Length: 3

        123"##};

        let mut bytes = BytesMut::from(str);
        let (header, payload_size) = HeaderDecoder.decode(&mut bytes).unwrap().unwrap();

        assert_eq!(header.method(), &Method::POST);
        assert_eq!(payload_size, PayloadSize::Length(3));
        assert_eq!(&bytes[..], &b"123"[..]);
    }

    #[test]
    fn partial_head_needs_more_data() {
        let mut bytes = BytesMut::from("GET /index.html HTTP/1.1\r\nHost: 127.0.0.1");
        assert!(HeaderDecoder.decode(&mut bytes).unwrap().is_none());
        assert_eq!(bytes.len(), 41);
    }

    #[test]
    fn from_curl() {
        let str = indoc! {r##"
        GET /index/?a=1&b=2&a=3 HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        "##};

        let mut buf = BytesMut::from(str);
        let (header, payload_size) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();

        assert!(payload_size.is_empty());
        assert!(buf.is_empty());

        assert_eq!(header.method(), &Method::GET);
        assert_eq!(header.version(), Version::HTTP_11);
        assert_eq!(header.uri().path(), "/index/");
        assert_eq!(header.uri().query(), Some("a=1&b=2&a=3"));
        assert_eq!(header.headers().len(), 3);
        assert_eq!(header.headers().get(http::header::HOST), Some(&HeaderValue::from_static("127.0.0.1:8080")));
        assert_eq!(header.headers().get(http::header::USER_AGENT), Some(&HeaderValue::from_static("curl/7.79.1")));
    }

    #[test]
    fn webdav_method_is_accepted() {
        let mut buf = BytesMut::from("PROPFIND /dav/ HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let (header, _) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(header.method().as_str(), "PROPFIND");
    }

    #[test]
    fn chunked_request() {
        let mut buf = BytesMut::from("POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n");
        let (_, payload_size) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();
        assert!(payload_size.is_chunked());
    }

    #[test]
    fn rejects_conflicting_framing() {
        let mut buf = BytesMut::from("POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\nContent-Length: 3\r\n\r\n");
        assert!(matches!(HeaderDecoder.decode(&mut buf), Err(ParseError::InvalidContentLength { .. })));
    }

    #[test]
    fn rejects_oversized_head() {
        let mut raw = String::from("GET / HTTP/1.1\r\nX-Long: ");
        raw.push_str(&"a".repeat(MAX_HEADER_BYTES));
        let mut buf = BytesMut::from(raw.as_str());
        assert!(matches!(HeaderDecoder.decode(&mut buf), Err(ParseError::TooLargeHeader { .. })));
    }
}
