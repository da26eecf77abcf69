//! Built-in middlewares.
//!
//! Each one is an ordinary [`Handler`](crate::route::Handler) built on the public
//! request/response contract, registered like any other route:
//!
//! ```
//! use cex_web::middleware::{basic_auth, security_headers, SecurityOptions};
//! use cex_web::{route, Dispatcher};
//!
//! let dispatcher = Dispatcher::builder()
//!     .route_all(route::middleware(security_headers(SecurityOptions::default())))
//!     .route_all(route::middleware(basic_auth()))
//!     .build();
//! # let _ = dispatcher;
//! ```

mod basic_auth;
mod compression;
mod filesystem;
mod security;
mod session;

pub use basic_auth::{BASIC_PASSWORD, BASIC_USERNAME, BasicAuth, basic_auth};
pub use compression::{CompressionSelector, compression};
pub use filesystem::{Filesystem, FilesystemOptions, filesystem};
pub use security::{FrameOptions, ReferrerPolicy, SecurityHeaders, SecurityOptions, security_headers};
pub use session::{SessionHandler, SessionOptions, session_handler};
