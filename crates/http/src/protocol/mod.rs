//! Protocol types shared by the codec, the connection and lifecycle implementations.
//!
//! - [`Message`], [`PayloadItem`] and [`PayloadSize`] describe the frames flowing
//!   through the codec: a head followed by zero or more body chunks and an EOF marker.
//! - [`RequestHeader`] is a parsed request head; [`ResponseHead`] is a response head
//!   before any body is attached.
//! - [`HttpError`], [`ParseError`] and [`SendError`] cover the failure modes of a
//!   connection.

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;

mod response;
pub use response::ResponseHead;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
