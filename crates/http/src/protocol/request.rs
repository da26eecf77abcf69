//! HTTP request head.
//!
//! [`RequestHeader`] wraps an `http::Request<()>` produced by the header decoder and
//! adds the connection-level queries the engine needs (keep-alive, expect-continue).

use http::header::{CONNECTION, EXPECT};
use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version};

/// A parsed HTTP request head.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl AsMut<Request<()>> for RequestHeader {
    fn as_mut(&mut self) -> &mut Request<()> {
        &mut self.inner
    }
}

impl RequestHeader {
    /// Consumes the header and returns the inner `Request<()>`.
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Whether the connection should stay open after this request.
    ///
    /// HTTP/1.1 keeps the connection unless the client sent `Connection: close`,
    /// HTTP/1.0 closes it unless the client sent `Connection: keep-alive`.
    pub fn is_keep_alive(&self) -> bool {
        let connection = self.headers().get(CONNECTION).map(http::HeaderValue::as_bytes);
        match self.version() {
            Version::HTTP_10 => connection.is_some_and(|v| v.trim_ascii().eq_ignore_ascii_case(b"keep-alive")),
            _ => !connection.is_some_and(|v| v.trim_ascii().eq_ignore_ascii_case(b"close")),
        }
    }

    /// Whether the client waits for `100 Continue` before sending the body.
    pub fn expects_continue(&self) -> bool {
        self.headers().get(EXPECT).is_some_and(|value| {
            let slice = value.as_bytes();
            slice.len() >= 4 && slice[0..4].eq_ignore_ascii_case(b"100-")
        })
    }
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(version: Version, connection: Option<&str>) -> RequestHeader {
        let mut builder = Request::builder().method(Method::GET).uri("/").version(version);
        if let Some(value) = connection {
            builder = builder.header(CONNECTION, value);
        }
        builder.body(()).unwrap().into()
    }

    #[test]
    fn http11_keeps_alive_by_default() {
        assert!(header(Version::HTTP_11, None).is_keep_alive());
        assert!(header(Version::HTTP_11, Some("keep-alive")).is_keep_alive());
        assert!(!header(Version::HTTP_11, Some("close")).is_keep_alive());
        assert!(!header(Version::HTTP_11, Some("Close")).is_keep_alive());
    }

    #[test]
    fn http10_closes_by_default() {
        assert!(!header(Version::HTTP_10, None).is_keep_alive());
        assert!(header(Version::HTTP_10, Some("Keep-Alive")).is_keep_alive());
    }

    #[test]
    fn detects_expect_continue() {
        let header: RequestHeader =
            Request::builder().method(Method::POST).uri("/").header(EXPECT, "100-continue").body(()).unwrap().into();
        assert!(header.expects_continue());

        let header: RequestHeader = Request::builder().method(Method::POST).uri("/").body(()).unwrap().into();
        assert!(!header.expects_continue());
    }
}
