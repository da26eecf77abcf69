//! The dispatcher: turns engine lifecycle events into route chain runs.
//!
//! Per request the engine calls, in order, [`on_headers`](Lifecycle::on_headers),
//! [`on_body_chunk`](Lifecycle::on_body_chunk) for every body chunk,
//! [`on_finished`](Lifecycle::on_finished) and finally
//! [`on_cleanup`](Lifecycle::on_cleanup). The dispatcher keeps one [`Context`] per
//! request across those calls.
//!
//! Body chunks go to the first matching upload route, if any. Otherwise they are
//! buffered for the standard chain. A request that matched an upload route reaches
//! the standard chain with an empty body. The standard chain runs once the request
//! is complete, whether or not an upload route took the body.
//!
//! With no standard routes registered every request gets `404`. With routes
//! registered but none completing the response, the request stays unanswered.

use bytes::Bytes;
use cex_http::connection::ResponseSink;
use cex_http::handler::Lifecycle;
use cex_http::protocol::RequestHeader;
use http::StatusCode;
use http::header::ACCEPT_ENCODING;
use tracing::{debug, warn};

use crate::codec::Compression;
use crate::output::Output;
use crate::route::{Handler, Next, Route, RouteBuilder, UploadHandler};
use crate::{Request, Response};

/// The state of one request between `on_headers` and `on_cleanup`.
#[derive(Debug)]
pub struct Context {
    request: Request,
    response: Response,
    upload: bool,
    abandoned: bool,
}

impl Context {
    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Whether the request was given up on before the chain could run.
    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }
}

/// Owns the route lists and runs them.
pub struct Dispatcher {
    routes: Vec<Route<dyn Handler>>,
    uploads: Vec<Route<dyn UploadHandler>>,
    auto_compress: bool,
    body_limit: Option<usize>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub fn routes(&self) -> &[Route<dyn Handler>] {
        &self.routes
    }

    pub fn uploads(&self) -> &[Route<dyn UploadHandler>] {
        &self.uploads
    }

    pub(crate) fn set_auto_compress(&mut self, auto_compress: bool) {
        self.auto_compress = auto_compress;
    }

    pub(crate) fn set_body_limit(&mut self, body_limit: Option<usize>) {
        self.body_limit = body_limit;
    }

    /// Creates the context of a request whose head just arrived.
    pub fn new_context(&self, header: RequestHeader, output: Box<dyn Output>) -> Context {
        let request = Request::from(header);
        let response = Response::new(output, request.version());
        debug!(method = %request.method(), url = request.url(), "request received");
        Context { request, response, upload: false, abandoned: false }
    }

    /// Routes one body chunk to an upload handler or into the body buffer.
    pub fn handle_body(&self, ctx: &mut Context, chunk: &[u8]) {
        if ctx.abandoned {
            return;
        }

        if let Some(route) = self.uploads.iter().find(|route| route.matches(&ctx.request)) {
            ctx.upload = true;
            if ctx.request.replace_body(chunk).is_err() {
                Self::abandon(ctx, StatusCode::INTERNAL_SERVER_ERROR, "failed to allocate upload chunk");
                return;
            }
            ctx.request.set_middleware_path(route.path());
            route.handler().on_chunk(&mut ctx.request, chunk);
            return;
        }

        if self.body_limit.is_some_and(|limit| ctx.request.body_len() + chunk.len() > limit) {
            Self::abandon(ctx, StatusCode::PAYLOAD_TOO_LARGE, "request body exceeds limit");
            return;
        }
        if ctx.request.append_body(chunk).is_err() {
            Self::abandon(ctx, StatusCode::INTERNAL_SERVER_ERROR, "failed to grow request body");
        }
    }

    /// Runs the standard chain for a complete request.
    pub fn handle_finished(&self, ctx: &mut Context) {
        if ctx.abandoned {
            debug!(url = ctx.request.url(), "skipping chain of abandoned request");
            return;
        }

        if ctx.upload {
            ctx.request.clear_body();
        }

        if self.auto_compress {
            let compression = ctx
                .request
                .headers()
                .get(ACCEPT_ENCODING)
                .and_then(|value| value.to_str().ok())
                .and_then(Compression::from_accept_encoding);
            if compression.is_some() {
                let flags = ctx.response.flags().with_compression(compression);
                ctx.response.set_flags(flags);
            }
        }

        self.dispatch(&mut ctx.request, &mut ctx.response);
    }

    /// Releases a request's context.
    pub fn handle_cleanup(&self, ctx: Context) {
        if ctx.response.is_pending() {
            debug!(url = ctx.request.url(), "request closed without a response");
        }
    }

    /// Walks the standard chain from its first route.
    pub fn dispatch(&self, req: &mut Request, res: &mut Response) {
        if self.routes.is_empty() {
            debug!(url = req.url(), "no routes registered");
            res.end(StatusCode::NOT_FOUND);
            return;
        }

        Next::new(&self.routes).run(req, res);
    }

    fn abandon(ctx: &mut Context, status: StatusCode, reason: &str) {
        warn!(url = ctx.request.url(), %status, reason, "abandoning request");
        ctx.abandoned = true;
        ctx.request.clear_body();
        ctx.response.end(status);
    }
}

impl Lifecycle for Dispatcher {
    type Context = Context;

    fn on_headers(&self, header: RequestHeader, sink: ResponseSink) -> Context {
        self.new_context(header, Box::new(sink))
    }

    fn on_body_chunk(&self, ctx: &mut Context, chunk: Bytes) {
        self.handle_body(ctx, &chunk);
    }

    fn on_finished(&self, ctx: &mut Context) {
        self.handle_finished(ctx);
    }

    fn on_cleanup(&self, ctx: Context) {
        self.handle_cleanup(ctx);
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.routes)
            .field("uploads", &self.uploads)
            .field("auto_compress", &self.auto_compress)
            .field("body_limit", &self.body_limit)
            .finish()
    }
}

/// Collects routes in registration order.
pub struct DispatcherBuilder {
    routes: Vec<Route<dyn Handler>>,
    uploads: Vec<Route<dyn UploadHandler>>,
    auto_compress: bool,
    body_limit: Option<usize>,
}

impl DispatcherBuilder {
    fn new() -> Self {
        Self { routes: Vec::new(), uploads: Vec::new(), auto_compress: true, body_limit: None }
    }

    /// Appends a standard route matched against `path`.
    pub fn route(mut self, path: impl Into<String>, item: RouteBuilder<dyn Handler>) -> Self {
        self.routes.push(item.build(Some(path.into())));
        self
    }

    /// Appends a standard route that ignores the path.
    pub fn route_all(mut self, item: RouteBuilder<dyn Handler>) -> Self {
        self.routes.push(item.build(None));
        self
    }

    /// Appends an upload route matched against `path`.
    pub fn upload(mut self, path: impl Into<String>, item: RouteBuilder<dyn UploadHandler>) -> Self {
        self.uploads.push(item.build(Some(path.into())));
        self
    }

    /// Appends an upload route that ignores the path.
    pub fn upload_all(mut self, item: RouteBuilder<dyn UploadHandler>) -> Self {
        self.uploads.push(item.build(None));
        self
    }

    /// Answers `413` once a buffered body grows past `limit` bytes.
    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = Some(limit);
        self
    }

    /// Selects response compression from `Accept-Encoding` before the chain runs.
    /// On by default.
    pub fn auto_compress(mut self, auto_compress: bool) -> Self {
        self.auto_compress = auto_compress;
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            routes: self.routes,
            uploads: self.uploads,
            auto_compress: self.auto_compress,
            body_limit: self.body_limit,
        }
    }
}

impl std::fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("routes", &self.routes.len())
            .field("uploads", &self.uploads.len())
            .finish_non_exhaustive()
    }
}
