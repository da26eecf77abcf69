//! Streaming HTTP/1.x codec built on `tokio_util::codec`.
//!
//! - [`RequestDecoder`] turns raw bytes into a request head followed by payload items.
//! - [`ResponseEncoder`] turns a response head plus payload items into wire bytes,
//!   framed with `Content-Length` or chunked transfer encoding.
//!
//! Both sides are small state machines: the head codec runs first and selects the
//! payload codec for the rest of the message.

mod body;
mod header;
mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
