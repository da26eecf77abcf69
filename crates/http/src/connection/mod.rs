//! Connection handling.
//!
//! - [`HttpConnection`] reads requests off one connection and drives a
//!   [`Lifecycle`](crate::handler::Lifecycle) through each of them, answering
//!   `Expect: 100-continue` and honouring keep-alive.
//! - [`ResponseSink`] is the synchronous handle lifecycle callbacks write their
//!   response through.
//!
//! Writing happens on a dedicated task that owns the write half of the connection.
//! Response frames reach it over a bounded channel, which gives blocking callbacks
//! backpressure against slow clients.

mod http_connection;
mod response_sink;

pub use http_connection::HttpConnection;
pub use response_sink::ResponseSink;

use tokio::sync::oneshot;

use crate::protocol::{Message, PayloadSize, ResponseHead};

/// Frames sent from a [`ResponseSink`] to the connection's writer task.
#[derive(Debug)]
pub(crate) enum Outgoing {
    /// interim `100 Continue` response
    Continue,
    Message(Message<(ResponseHead, PayloadSize)>),
    /// flush everything written so far, then notify
    Flush(oneshot::Sender<()>),
}
