//! Continuation-style request dispatch on top of the cex-http engine.
//!
//! A [`Dispatcher`] owns two ordered route lists. Body chunks are offered to the
//! upload routes as they arrive; once a request is complete the standard routes
//! run in registration order. Each matching handler receives the [`Request`], the
//! [`Response`] and a [`Next`](route::Next) continuation, and decides whether the
//! chain goes on.
//!
//! The chain never answers on its own, with one exception: a dispatcher without
//! any standard route answers `404`. If routes exist but none of them completes the
//! response, the request stays open. Register a trailing catch-all route when that
//! is not wanted.
//!
//! ```no_run
//! use cex_web::middleware::{compression, security_headers, SecurityOptions};
//! use cex_web::route::{self, handler_fn};
//! use cex_web::{Dispatcher, Server};
//! use http::StatusCode;
//!
//! let dispatcher = Dispatcher::builder()
//!     .route_all(route::middleware(security_headers(SecurityOptions::default())))
//!     .route("^/$", route::get(handler_fn(|_req, res, _next| {
//!         res.send(StatusCode::OK, "<h1>It works!</h1>");
//!     })).regex())
//!     .route_all(route::middleware(handler_fn(|_req, res, _next| res.end(StatusCode::NOT_FOUND))))
//!     .build();
//!
//! Server::builder().dispatcher(dispatcher).build().unwrap().run().unwrap();
//! # let _ = compression();
//! ```

mod error;
mod mime_types;
mod request;
mod response;
mod server;

pub mod codec;
pub mod dispatcher;
pub mod filter;
pub mod middleware;
pub mod output;
pub mod property;
pub mod route;

pub use dispatcher::Dispatcher;
pub use error::ServerError;
pub use mime_types::{MimeType, lookup as lookup_mime_type};
pub use property::{Property, PropertyStore};
pub use request::Request;
pub use response::{Flags, IO_BUFFER_SIZE, Response};
pub use server::{Server, ServerBuilder, ServerConfig, ServerHandle};

/// The version of this library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
