use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderValue, Version};
use tokio::sync::{mpsc, oneshot};

use crate::connection::Outgoing;
use crate::ensure;
use crate::protocol::{Message, PayloadItem, PayloadSize, ResponseHead, SendError};

/// Writes the response of one request.
///
/// A response is either a single [`send`](ResponseSink::send), or
/// [`start_chunked`](ResponseSink::start_chunked) followed by any number of
/// [`send_chunk`](ResponseSink::send_chunk) and one
/// [`end_chunked`](ResponseSink::end_chunked). Once a response is complete every
/// further call fails with [`SendError::Completed`].
///
/// All methods block the calling thread while the connection's write queue is full,
/// so they must be called from a blocking context such as a lifecycle callback.
/// Responses to `HEAD` requests keep their headers and drop body bytes.
///
/// HTTP/1.0 peers cannot read chunked bodies: a "chunked" response to them is sent
/// with no framing headers and ends by closing the connection.
#[derive(Debug)]
pub struct ResponseSink {
    sender: mpsc::Sender<Outgoing>,
    flushed: Option<oneshot::Sender<()>>,
    head_only: bool,
    version: Version,
    chunked: bool,
    close_after: Arc<AtomicBool>,
}

impl ResponseSink {
    pub(crate) fn new(
        sender: mpsc::Sender<Outgoing>,
        flushed: oneshot::Sender<()>,
        head_only: bool,
        version: Version,
    ) -> Self {
        Self {
            sender,
            flushed: Some(flushed),
            head_only,
            version,
            chunked: false,
            close_after: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set once the response can only be terminated by closing the connection.
    pub(crate) fn close_after(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.close_after)
    }

    /// Whether a complete response has been handed to the connection.
    pub fn is_completed(&self) -> bool {
        self.flushed.is_none()
    }

    /// Sends a complete response; `None` or an empty body sends the head only.
    pub fn send(&mut self, mut head: ResponseHead, body: Option<Bytes>) -> Result<(), SendError> {
        ensure!(!self.chunked, SendError::invalid_body("chunked response in progress"));
        let flushed = self.flushed.take().ok_or(SendError::Completed)?;

        match body.filter(|body| !body.is_empty()) {
            Some(body) if self.head_only => {
                head.headers_mut().insert(CONTENT_LENGTH, body.len().into());
                self.push(Message::Header((head, PayloadSize::Empty)))?;
            }
            Some(body) => {
                self.push(Message::Header((head, PayloadSize::Length(body.len() as u64))))?;
                self.push(Message::from(body))?;
            }
            None => self.push(Message::Header((head, PayloadSize::Empty)))?,
        }

        self.push(Message::Payload(PayloadItem::Eof))?;
        self.finish(flushed)
    }

    /// Sends the head of a chunked response.
    pub fn start_chunked(&mut self, mut head: ResponseHead) -> Result<(), SendError> {
        ensure!(!self.is_completed(), SendError::Completed);
        ensure!(!self.chunked, SendError::invalid_body("chunked response already started"));
        self.chunked = true;

        if self.version == Version::HTTP_10 {
            self.close_after.store(true, Ordering::Release);
            self.push(Message::Header((head, PayloadSize::UntilClose)))
        } else if self.head_only {
            head.headers_mut().insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
            self.push(Message::Header((head, PayloadSize::Empty)))
        } else {
            self.push(Message::Header((head, PayloadSize::Chunked)))
        }
    }

    /// Sends one chunk of a chunked response. Empty chunks are skipped.
    pub fn send_chunk(&mut self, chunk: Bytes) -> Result<(), SendError> {
        ensure!(!self.is_completed(), SendError::Completed);
        ensure!(self.chunked, SendError::invalid_body("chunked response not started"));

        if self.head_only || chunk.is_empty() {
            return Ok(());
        }
        self.push(Message::from(chunk))
    }

    /// Terminates a chunked response.
    pub fn end_chunked(&mut self) -> Result<(), SendError> {
        ensure!(self.chunked, SendError::invalid_body("chunked response not started"));
        let flushed = self.flushed.take().ok_or(SendError::Completed)?;

        self.push(Message::Payload(PayloadItem::Eof))?;
        self.finish(flushed)
    }

    fn push(&self, message: Message<(ResponseHead, PayloadSize)>) -> Result<(), SendError> {
        self.sender.blocking_send(Outgoing::Message(message)).map_err(|_| SendError::Closed)
    }

    fn finish(&self, flushed: oneshot::Sender<()>) -> Result<(), SendError> {
        self.sender.blocking_send(Outgoing::Flush(flushed)).map_err(|_| SendError::Closed)
    }
}
