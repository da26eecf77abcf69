//! The HTTP/1.x engine underneath the cex dispatch core.
//!
//! This crate owns everything that touches the socket: reading and parsing request
//! heads, decoding `Content-Length` and chunked bodies, and serializing responses.
//! It knows nothing about routing. Instead it drives a [`handler::Lifecycle`]
//! implementation through four callbacks per request:
//!
//! 1. [`on_headers`](handler::Lifecycle::on_headers) once the request head is parsed,
//!    producing a per-request context
//! 2. [`on_body_chunk`](handler::Lifecycle::on_body_chunk) for every decoded body chunk
//! 3. [`on_finished`](handler::Lifecycle::on_finished) once the body is complete
//! 4. [`on_cleanup`](handler::Lifecycle::on_cleanup) once the response has been flushed
//!
//! Callbacks for one request never overlap and always arrive in that order. Every
//! callback runs on tokio's blocking pool, so implementations are free to block.
//!
//! Responses are written through a [`connection::ResponseSink`], a synchronous handle
//! that forwards response frames to the connection's writer task.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use http::{Response, StatusCode};
//! use tokio::net::TcpListener;
//! use cex_http::connection::{HttpConnection, ResponseSink};
//! use cex_http::handler::Lifecycle;
//! use cex_http::protocol::RequestHeader;
//!
//! struct Hello;
//!
//! impl Lifecycle for Hello {
//!     type Context = ResponseSink;
//!
//!     fn on_headers(&self, _header: RequestHeader, sink: ResponseSink) -> ResponseSink {
//!         sink
//!     }
//!
//!     fn on_body_chunk(&self, _sink: &mut ResponseSink, _chunk: Bytes) {}
//!
//!     fn on_finished(&self, sink: &mut ResponseSink) {
//!         let head = Response::builder().status(StatusCode::OK).body(()).unwrap();
//!         let _ = sink.send(head, Some(Bytes::from_static(b"Hello World!\r\n")));
//!     }
//!
//!     fn on_cleanup(&self, _sink: ResponseSink) {}
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     let lifecycle = Arc::new(Hello);
//!     loop {
//!         let (stream, _) = listener.accept().await.unwrap();
//!         let lifecycle = lifecycle.clone();
//!         tokio::spawn(async move {
//!             let (reader, writer) = stream.into_split();
//!             let _ = HttpConnection::new(reader, writer).process(lifecycle).await;
//!         });
//!     }
//! }
//! ```
//!
//! # Limitations
//!
//! - HTTP/1.0 and HTTP/1.1 only
//! - No TLS support (use a reverse proxy for HTTPS)
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
