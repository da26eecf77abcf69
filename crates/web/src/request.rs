//! The read-mostly view over one incoming request.

use std::collections::TryReserveError;
use std::ops::ControlFlow;

use cex_http::protocol::RequestHeader;
use http::header::HOST;
use http::{HeaderMap, Method, Uri, Version};

use crate::property::PropertyStore;

/// One incoming request as seen by the dispatch chain.
///
/// A `Request` is built when the request head arrives. After that only its body
/// buffer, its [`middleware_path`](Request::middleware_path) and its
/// [`PropertyStore`] change.
#[derive(Debug)]
pub struct Request {
    header: RequestHeader,
    host: String,
    port: Option<u16>,
    query: Vec<(String, String)>,
    body: Vec<u8>,
    middleware_path: String,
    properties: PropertyStore,
}

impl From<RequestHeader> for Request {
    fn from(header: RequestHeader) -> Self {
        let (host, port) = match header.headers().get(HOST).and_then(|value| value.to_str().ok()) {
            Some(value) => split_host(value),
            None => (header.uri().host().unwrap_or_default().to_owned(), header.uri().port_u16()),
        };

        let query = header
            .uri()
            .query()
            .and_then(|query| serde_urlencoded::from_str::<Vec<(String, String)>>(query).ok())
            .unwrap_or_default();

        Self {
            header,
            host,
            port,
            query,
            body: Vec::new(),
            middleware_path: String::new(),
            properties: PropertyStore::new(),
        }
    }
}

impl From<http::Request<()>> for Request {
    fn from(request: http::Request<()>) -> Self {
        Self::from(RequestHeader::from(request))
    }
}

/// Splits a `Host` header value into host and port, keeping IPv6 brackets intact.
fn split_host(value: &str) -> (String, Option<u16>) {
    let value = value.trim();
    let (host, port) = if value.starts_with('[') {
        match value.find(']') {
            Some(end) => (&value[..=end], value[end + 1..].strip_prefix(':')),
            None => (value, None),
        }
    } else {
        match value.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (value, None),
        }
    };

    (host.to_owned(), port.and_then(|port| port.parse().ok()))
}

impl Request {
    pub fn method(&self) -> &Method {
        self.header.method()
    }

    /// The protocol version of the request.
    pub fn version(&self) -> Version {
        self.header.version()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn uri(&self) -> &Uri {
        self.header.uri()
    }

    /// The full request target: path plus `?query`, exactly as received.
    ///
    /// Route matching runs against this string, so a query string can satisfy a
    /// `contains` pattern.
    pub fn url(&self) -> &str {
        self.uri().path_and_query().map_or_else(|| self.uri().path(), |pq| pq.as_str())
    }

    /// The directory part of the URI path, up to and including the last `/`.
    pub fn path(&self) -> &str {
        let path = self.uri().path();
        path.rfind('/').map_or("", |index| &path[..=index])
    }

    /// The part of the URI path after the last `/`.
    pub fn file(&self) -> &str {
        let path = self.uri().path();
        path.rfind('/').map_or(path, |index| &path[index + 1..])
    }

    /// The first value of the named header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers().get(name).and_then(|value| value.to_str().ok())
    }

    pub fn headers(&self) -> &HeaderMap {
        self.header.headers()
    }

    /// Calls `f` once per header line until it returns [`ControlFlow::Break`].
    ///
    /// Values that are not valid UTF-8 are passed lossily converted.
    pub fn each_header<F>(&self, mut f: F)
    where
        F: FnMut(&str, &str) -> ControlFlow<()>,
    {
        for (name, value) in self.headers() {
            let value = String::from_utf8_lossy(value.as_bytes());
            if f(name.as_str(), &value).is_break() {
                break;
            }
        }
    }

    /// The first percent-decoded value of the named query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    /// Calls `f` once per query parameter until it returns [`ControlFlow::Break`].
    pub fn each_query_param<F>(&self, mut f: F)
    where
        F: FnMut(&str, &str) -> ControlFlow<()>,
    {
        for (key, value) in &self.query {
            if f(key, value).is_break() {
                break;
            }
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// The registration path of the route currently running; empty for routes
    /// registered without a path.
    pub fn middleware_path(&self) -> &str {
        &self.middleware_path
    }

    pub fn properties(&self) -> &PropertyStore {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertyStore {
        &mut self.properties
    }

    pub(crate) fn set_middleware_path(&mut self, path: &str) {
        self.middleware_path.clear();
        self.middleware_path.push_str(path);
    }

    pub(crate) fn append_body(&mut self, chunk: &[u8]) -> Result<(), TryReserveError> {
        self.body.try_reserve(chunk.len())?;
        self.body.extend_from_slice(chunk);
        Ok(())
    }

    /// Replaces the body with `chunk`, dropping whatever was buffered before.
    pub(crate) fn replace_body(&mut self, chunk: &[u8]) -> Result<(), TryReserveError> {
        self.body.clear();
        self.append_body(chunk)
    }

    pub(crate) fn clear_body(&mut self) {
        self.body = Vec::new();
    }
}
