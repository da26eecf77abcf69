//! The callback contract between the engine and whatever dispatches requests.

use bytes::Bytes;

use crate::connection::ResponseSink;
use crate::protocol::RequestHeader;

/// Receives the lifecycle events of every request on a connection.
///
/// For a single request the engine calls, strictly in order and never
/// concurrently: [`on_headers`](Lifecycle::on_headers) once, then
/// [`on_body_chunk`](Lifecycle::on_body_chunk) zero or more times, then
/// [`on_finished`](Lifecycle::on_finished) once, then
/// [`on_cleanup`](Lifecycle::on_cleanup) once the response has been flushed or the
/// connection is gone.
///
/// Each call runs on tokio's blocking pool and may block freely. Different requests
/// may be served concurrently, so implementations are shared across threads.
pub trait Lifecycle: Send + Sync + 'static {
    /// Per-request state, created from the request head and handed back on every
    /// later callback.
    type Context: Send + 'static;

    fn on_headers(&self, header: RequestHeader, sink: ResponseSink) -> Self::Context;

    fn on_body_chunk(&self, ctx: &mut Self::Context, chunk: Bytes);

    fn on_finished(&self, ctx: &mut Self::Context);

    fn on_cleanup(&self, ctx: Self::Context);
}
