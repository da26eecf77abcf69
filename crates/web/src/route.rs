//! Routes and the continuation that walks them.
//!
//! A route is a match rule plus a handler. Standard routes get the request, the
//! response and a [`Next`] continuation; upload routes get the request and one body
//! chunk at a time.
//!
//! The match rule is an AND of filters: the method filter (absent for
//! [`middleware`] routes), the path rule, and anything added with
//! [`RouteBuilder::with`]. The path rule runs against [`Request::url`], the full
//! target including the query string, in one of three [`MatchMode`]s.
//!
//! ```
//! use cex_web::route::{self, handler_fn};
//! use cex_web::Dispatcher;
//! use http::StatusCode;
//!
//! let dispatcher = Dispatcher::builder()
//!     .route("^/$", route::get(handler_fn(|_req, res, _next| {
//!         res.send(StatusCode::OK, "<h1>It works!</h1>");
//!     })).regex())
//!     .route_all(route::middleware(handler_fn(|_req, res, _next| res.end(StatusCode::NOT_FOUND))))
//!     .build();
//! # let _ = dispatcher;
//! ```

use std::fmt;

use http::Method;
use regex::Regex;
use tracing::{debug, trace, warn};

use crate::filter::{self, AllFilter, Filter};
use crate::{Request, Response};

/// How a route's path is compared with the request URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// the URL contains the path as a substring
    #[default]
    Contains,
    /// the URL equals the path verbatim
    Exact,
    /// the path is a regular expression that finds a match anywhere in the URL
    Regex,
}

/// The compiled path rule of a route.
#[derive(Debug, Clone)]
pub(crate) enum PathRule {
    Any,
    Contains(String),
    Exact(String),
    Regex(Regex),
}

impl PathRule {
    pub(crate) fn new(path: Option<&str>, mode: MatchMode) -> Self {
        let Some(path) = path else {
            return PathRule::Any;
        };

        match mode {
            MatchMode::Contains => PathRule::Contains(path.to_owned()),
            MatchMode::Exact => PathRule::Exact(path.to_owned()),
            MatchMode::Regex => match Regex::new(path) {
                Ok(regex) => PathRule::Regex(regex),
                Err(e) => {
                    warn!(path, cause = %e, "invalid route pattern, route will match every path");
                    PathRule::Any
                }
            },
        }
    }

    fn matches_url(&self, url: &str) -> bool {
        match self {
            PathRule::Any => true,
            PathRule::Contains(path) => url.contains(path.as_str()),
            PathRule::Exact(path) => url == path,
            PathRule::Regex(regex) => regex.is_match(url),
        }
    }
}

impl Filter for PathRule {
    fn matches(&self, req: &Request) -> bool {
        self.matches_url(req.url())
    }
}

/// A standard handler.
///
/// A handler either completes the response, calls [`Next::run`] to hand the request
/// to the next matching route, or both. A handler that does neither leaves the
/// request unanswered and the connection open.
pub trait Handler: Send + Sync {
    fn call(&self, req: &mut Request, res: &mut Response, next: Next<'_>);
}

/// A handler invoked once per request body chunk instead of buffering the body.
pub trait UploadHandler: Send + Sync {
    fn on_chunk(&self, req: &mut Request, chunk: &[u8]);
}

/// A [`Handler`] backed by a closure, created by [`handler_fn`].
pub struct HandlerFn<F>(F);

/// Wraps a closure as a [`Handler`].
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&mut Request, &mut Response, Next<'_>) + Send + Sync,
{
    HandlerFn(f)
}

impl<F> Handler for HandlerFn<F>
where
    F: Fn(&mut Request, &mut Response, Next<'_>) + Send + Sync,
{
    fn call(&self, req: &mut Request, res: &mut Response, next: Next<'_>) {
        (self.0)(req, res, next);
    }
}

/// An [`UploadHandler`] backed by a closure, created by [`upload_fn`].
pub struct UploadFn<F>(F);

/// Wraps a closure as an [`UploadHandler`].
pub fn upload_fn<F>(f: F) -> UploadFn<F>
where
    F: Fn(&mut Request, &[u8]) + Send + Sync,
{
    UploadFn(f)
}

impl<F> UploadHandler for UploadFn<F>
where
    F: Fn(&mut Request, &[u8]) + Send + Sync,
{
    fn on_chunk(&self, req: &mut Request, chunk: &[u8]) {
        (self.0)(req, chunk);
    }
}

impl<F> fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HandlerFn")
    }
}

impl<F> fmt::Debug for UploadFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UploadFn")
    }
}

/// A registered route. Immutable once built.
pub struct Route<H: ?Sized> {
    path: Option<String>,
    filter: AllFilter,
    handler: Box<H>,
}

impl<H: ?Sized> Route<H> {
    /// The registration path, or an empty string for a route without one.
    pub fn path(&self) -> &str {
        self.path.as_deref().unwrap_or_default()
    }

    pub fn matches(&self, req: &Request) -> bool {
        self.filter.matches(req)
    }

    pub(crate) fn handler(&self) -> &H {
        &self.handler
    }
}

impl<H: ?Sized> fmt::Debug for Route<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route").field("path", &self.path).field("filter", &self.filter).finish_non_exhaustive()
    }
}

/// A route waiting for its path, handed to
/// [`DispatcherBuilder`](crate::dispatcher::DispatcherBuilder).
pub struct RouteBuilder<H: ?Sized> {
    method: Option<Method>,
    mode: MatchMode,
    filters: Vec<Box<dyn Filter>>,
    handler: Box<H>,
}

impl<H: ?Sized> RouteBuilder<H> {
    fn new(method: Option<Method>, handler: Box<H>) -> Self {
        Self { method, mode: MatchMode::default(), filters: Vec::new(), handler }
    }

    pub fn match_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Shorthand for [`MatchMode::Exact`].
    pub fn exact(self) -> Self {
        self.match_mode(MatchMode::Exact)
    }

    /// Shorthand for [`MatchMode::Regex`].
    pub fn regex(self) -> Self {
        self.match_mode(MatchMode::Regex)
    }

    /// Adds a filter the request must also pass.
    pub fn with<F: Filter + 'static>(mut self, filter: F) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn any_method(mut self) -> Self {
        self.method = None;
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub(crate) fn build(self, path: Option<String>) -> Route<H> {
        let mut filter = filter::all_filter();
        if let Some(method) = self.method {
            filter.and(filter::method(method));
        }
        filter.and(PathRule::new(path.as_deref(), self.mode));
        for extra in self.filters {
            filter.and_boxed(extra);
        }

        Route { path, filter, handler: self.handler }
    }
}

impl<H: ?Sized> fmt::Debug for RouteBuilder<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteBuilder")
            .field("method", &self.method)
            .field("mode", &self.mode)
            .field("filters", &self.filters.len())
            .finish_non_exhaustive()
    }
}

/// A standard route for every method.
pub fn middleware<H: Handler + 'static>(handler: H) -> RouteBuilder<dyn Handler> {
    RouteBuilder::new(None, Box::new(handler))
}

/// A standard route for one method, including extension methods such as `MKCOL`.
pub fn method<H: Handler + 'static>(method: Method, handler: H) -> RouteBuilder<dyn Handler> {
    RouteBuilder::new(Some(method), Box::new(handler))
}

macro_rules! method_route {
    ($name:ident, $method:ident) => {
        #[doc = concat!("A standard route for ", stringify!($method), " requests.")]
        pub fn $name<H: Handler + 'static>(handler: H) -> RouteBuilder<dyn Handler> {
            RouteBuilder::new(Some(Method::$method), Box::new(handler))
        }
    };
}

method_route!(get, GET);
method_route!(post, POST);
method_route!(put, PUT);
method_route!(delete, DELETE);
method_route!(head, HEAD);
method_route!(options, OPTIONS);
method_route!(connect, CONNECT);
method_route!(patch, PATCH);
method_route!(trace, TRACE);

/// An upload route, for `POST` unless changed with
/// [`method`](RouteBuilder::method) or [`any_method`](RouteBuilder::any_method).
pub fn upload<U: UploadHandler + 'static>(handler: U) -> RouteBuilder<dyn UploadHandler> {
    RouteBuilder::new(Some(Method::POST), Box::new(handler))
}

/// The rest of the chain after the running handler.
///
/// Calling [`run`](Next::run) invokes the next matching route; routes that do not
/// match are skipped in a loop. Past the end of the chain `run` does nothing.
pub struct Next<'a> {
    routes: &'a [Route<dyn Handler>],
    cursor: usize,
}

impl<'a> Next<'a> {
    pub(crate) fn new(routes: &'a [Route<dyn Handler>]) -> Self {
        Self { routes, cursor: 0 }
    }

    pub fn run(self, req: &mut Request, res: &mut Response) {
        let mut cursor = self.cursor;
        while let Some(route) = self.routes.get(cursor) {
            cursor += 1;
            if !route.matches(req) {
                trace!(index = cursor - 1, path = route.path(), "route skipped");
                continue;
            }

            req.set_middleware_path(route.path());
            route.handler().call(req, res, Next { routes: self.routes, cursor });
            return;
        }

        debug!(url = req.url(), pending = res.is_pending(), "end of chain");
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").field("cursor", &self.cursor).field("routes", &self.routes.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::BufferedOutput;
    use http::{StatusCode, Version};
    use std::sync::{Arc, Mutex};

    fn request(method: Method, uri: &str) -> Request {
        http::Request::builder().method(method).uri(uri).body(()).unwrap().into()
    }

    fn response() -> Response {
        Response::new(Box::new(BufferedOutput::new()), Version::HTTP_11)
    }

    fn noop() -> impl Handler {
        handler_fn(|_, _, _| {})
    }

    #[test]
    fn contains_mode() {
        let route = get(noop()).build(Some("something".into()));
        assert!(route.matches(&request(Method::GET, "/some/something/path")));
        assert!(route.matches(&request(Method::GET, "/x?q=something")));
        assert!(!route.matches(&request(Method::GET, "/some/thing")));
    }

    #[test]
    fn exact_mode() {
        let route = get(noop()).exact().build(Some("/must/match/exactly".into()));
        assert!(route.matches(&request(Method::GET, "/must/match/exactly")));
        assert!(!route.matches(&request(Method::GET, "/must/match/exactly/")));
        assert!(!route.matches(&request(Method::GET, "/must/match/exactly?x=1")));
    }

    #[test]
    fn regex_mode() {
        let route = get(noop()).regex().build(Some("^/$".into()));
        assert!(route.matches(&request(Method::GET, "/")));
        assert!(!route.matches(&request(Method::GET, "/x")));

        let unanchored = get(noop()).regex().build(Some("[0-9]+".into()));
        assert!(unanchored.matches(&request(Method::GET, "/items/42/edit")));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let route = middleware(noop()).build(Some("/Admin".into()));
        assert!(!route.matches(&request(Method::GET, "/admin")));
    }

    #[test]
    fn invalid_regex_matches_everything() {
        let route = get(noop()).regex().build(Some("([unclosed".into()));
        assert!(route.matches(&request(Method::GET, "/anything")));
    }

    #[test]
    fn missing_path_matches_everything() {
        let route = post(noop()).exact().build(None);
        assert_eq!(route.path(), "");
        assert!(route.matches(&request(Method::POST, "/a/b?c")));
    }

    #[test]
    fn method_isolation() {
        let route = get(noop()).build(Some("/onlyget".into()));
        for other in [Method::POST, Method::PUT, Method::DELETE, Method::HEAD, Method::PATCH] {
            assert!(!route.matches(&request(other, "/onlyget")));
        }
        assert!(route.matches(&request(Method::GET, "/onlyget")));

        let mkcol = Method::from_bytes(b"MKCOL").unwrap();
        let dav = method(mkcol.clone(), noop()).build(Some("/dav".into()));
        assert!(dav.matches(&request(mkcol, "/dav/folder")));
        assert!(!dav.matches(&request(Method::GET, "/dav/folder")));
    }

    #[test]
    fn matching_is_deterministic() {
        let route = get(noop()).regex().build(Some("^/v[0-9]/".into()));
        let req = request(Method::GET, "/v2/users");
        let first = route.matches(&req);
        assert!((0..10).all(|_| route.matches(&req) == first));
    }

    #[test]
    fn extra_filters() {
        let route = middleware(noop()).with(filter::fn_filter(|req| req.query_param("debug").is_some())).build(None);
        assert!(route.matches(&request(Method::GET, "/?debug=1")));
        assert!(!route.matches(&request(Method::GET, "/")));
    }

    #[test]
    fn upload_defaults_to_post() {
        let route = upload(upload_fn(|_, _| {})).build(Some("/uploads".into()));
        assert!(route.matches(&request(Method::POST, "/uploads")));
        assert!(!route.matches(&request(Method::PUT, "/uploads")));

        let route = upload(upload_fn(|_, _| {})).any_method().build(None);
        assert!(route.matches(&request(Method::PUT, "/x")));
    }

    fn recording(log: Arc<Mutex<Vec<String>>>, name: &'static str, call_next: bool) -> impl Handler {
        handler_fn(move |req, res, next| {
            log.lock().unwrap().push(format!("{name}:{}", req.middleware_path()));
            if call_next {
                next.run(req, res);
            }
        })
    }

    #[test]
    fn chain_runs_in_order_and_skips_non_matching() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let routes = vec![
            middleware(recording(log.clone(), "r1", true)).build(None),
            post(recording(log.clone(), "skipped", true)).build(None),
            get(recording(log.clone(), "r2", true)).build(Some("/a".into())),
            middleware(recording(log.clone(), "r3", true)).build(Some("/a/b".into())),
        ];

        let mut req = request(Method::GET, "/a/b");
        let mut res = response();
        Next::new(&routes).run(&mut req, &mut res);

        assert_eq!(*log.lock().unwrap(), vec!["r1:", "r2:/a", "r3:/a/b"]);
        assert!(res.is_pending());
    }

    #[test]
    fn handler_without_next_stops_the_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let routes = vec![
            middleware(recording(log.clone(), "first", false)).build(None),
            middleware(recording(log.clone(), "second", true)).build(None),
        ];

        let mut req = request(Method::GET, "/");
        let mut res = response();
        Next::new(&routes).run(&mut req, &mut res);

        assert_eq!(*log.lock().unwrap(), vec!["first:"]);
    }

    #[test]
    fn writes_after_completion_are_ignored() {
        let output = BufferedOutput::new();
        let routes = vec![
            middleware(handler_fn(|req, res, next| {
                res.send(StatusCode::OK, "first");
                next.run(req, res);
            }))
            .build(None),
            middleware(handler_fn(|_, res, _| res.send(StatusCode::INTERNAL_SERVER_ERROR, "second"))).build(None),
        ];

        let mut req = request(Method::GET, "/");
        let mut res = Response::new(Box::new(output.clone()), Version::HTTP_11);
        Next::new(&routes).run(&mut req, &mut res);

        assert_eq!(output.status(), Some(StatusCode::OK));
        assert_eq!(&output.body()[..], b"first");
    }

    #[test]
    fn long_chain_of_non_matching_routes() {
        let mut routes: Vec<_> = (0..10_000).map(|_| post(noop()).build(None)).collect();
        routes.push(middleware(handler_fn(|_, res, _| res.end(StatusCode::NO_CONTENT))).build(None));

        let mut req = request(Method::GET, "/");
        let mut res = response();
        Next::new(&routes).run(&mut req, &mut res);
        assert!(res.is_done());
    }
}
