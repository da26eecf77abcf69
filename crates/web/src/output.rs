//! Where a [`Response`](crate::Response) writes its bytes.
//!
//! [`Output`] mirrors the four operations of the engine's [`ResponseSink`], which is
//! the implementation used when serving. [`BufferedOutput`] keeps everything in
//! memory and is what handler tests write to.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::{Bytes, BytesMut};
use cex_http::connection::ResponseSink;
use cex_http::protocol::{ResponseHead, SendError};
use http::{HeaderMap, StatusCode, Version};

/// The write side of one response.
///
/// A response is either one [`send_reply`](Output::send_reply), or
/// [`start_chunked`](Output::start_chunked) followed by any number of
/// [`send_chunk`](Output::send_chunk) and a final [`end_chunked`](Output::end_chunked).
#[cfg_attr(test, mockall::automock)]
pub trait Output: Send {
    /// Sends a complete response; `None` sends the head only.
    fn send_reply(&mut self, head: ResponseHead, body: Option<Bytes>) -> Result<(), SendError>;

    fn start_chunked(&mut self, head: ResponseHead) -> Result<(), SendError>;

    fn send_chunk(&mut self, chunk: Bytes) -> Result<(), SendError>;

    fn end_chunked(&mut self) -> Result<(), SendError>;
}

impl Output for ResponseSink {
    fn send_reply(&mut self, head: ResponseHead, body: Option<Bytes>) -> Result<(), SendError> {
        self.send(head, body)
    }

    fn start_chunked(&mut self, head: ResponseHead) -> Result<(), SendError> {
        ResponseSink::start_chunked(self, head)
    }

    fn send_chunk(&mut self, chunk: Bytes) -> Result<(), SendError> {
        ResponseSink::send_chunk(self, chunk)
    }

    fn end_chunked(&mut self) -> Result<(), SendError> {
        ResponseSink::end_chunked(self)
    }
}

#[derive(Debug, Default)]
struct Recorded {
    status: Option<StatusCode>,
    version: Option<Version>,
    headers: HeaderMap,
    body: BytesMut,
    chunks: usize,
    chunked: bool,
    completed: bool,
}

/// An [`Output`] that records the response in memory.
///
/// Clones share the same recording, so a test can hand one clone to a
/// [`Response`](crate::Response) and inspect the other afterwards.
///
/// ```
/// use cex_web::output::BufferedOutput;
/// use cex_web::Response;
/// use http::{StatusCode, Version};
///
/// let output = BufferedOutput::new();
/// let mut res = Response::new(Box::new(output.clone()), Version::HTTP_11);
/// res.send(StatusCode::OK, "hi");
///
/// assert_eq!(output.status(), Some(StatusCode::OK));
/// assert_eq!(&output.body()[..], b"hi");
/// ```
#[derive(Debug, Clone, Default)]
pub struct BufferedOutput {
    inner: Arc<Mutex<Recorded>>,
}

impl BufferedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.lock().status
    }

    pub fn version(&self) -> Option<Version> {
        self.lock().version
    }

    pub fn headers(&self) -> HeaderMap {
        self.lock().headers.clone()
    }

    /// The value of the named header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<String> {
        self.lock().headers.get(name).and_then(|value| value.to_str().ok()).map(str::to_owned)
    }

    /// All body bytes written so far, chunk framing removed.
    pub fn body(&self) -> Bytes {
        Bytes::copy_from_slice(&self.lock().body)
    }

    /// The number of non-empty chunks written to a chunked response.
    pub fn chunk_count(&self) -> usize {
        self.lock().chunks
    }

    pub fn is_chunked(&self) -> bool {
        self.lock().chunked
    }

    pub fn is_completed(&self) -> bool {
        self.lock().completed
    }

    fn record_head(recorded: &mut Recorded, head: ResponseHead) {
        let (parts, ()) = head.into_parts();
        recorded.status = Some(parts.status);
        recorded.version = Some(parts.version);
        recorded.headers = parts.headers;
    }
}

impl Output for BufferedOutput {
    fn send_reply(&mut self, head: ResponseHead, body: Option<Bytes>) -> Result<(), SendError> {
        let mut recorded = self.lock();
        if recorded.completed || recorded.status.is_some() {
            return Err(SendError::Completed);
        }

        Self::record_head(&mut recorded, head);
        if let Some(body) = body {
            recorded.body.extend_from_slice(&body);
        }
        recorded.completed = true;
        Ok(())
    }

    fn start_chunked(&mut self, head: ResponseHead) -> Result<(), SendError> {
        let mut recorded = self.lock();
        if recorded.completed || recorded.status.is_some() {
            return Err(SendError::Completed);
        }

        Self::record_head(&mut recorded, head);
        recorded.chunked = true;
        Ok(())
    }

    fn send_chunk(&mut self, chunk: Bytes) -> Result<(), SendError> {
        let mut recorded = self.lock();
        if recorded.completed {
            return Err(SendError::Completed);
        }
        if !recorded.chunked {
            return Err(SendError::invalid_body("chunked response not started"));
        }

        if !chunk.is_empty() {
            recorded.chunks += 1;
            recorded.body.extend_from_slice(&chunk);
        }
        Ok(())
    }

    fn end_chunked(&mut self) -> Result<(), SendError> {
        let mut recorded = self.lock();
        if recorded.completed {
            return Err(SendError::Completed);
        }
        if !recorded.chunked {
            return Err(SendError::invalid_body("chunked response not started"));
        }

        recorded.completed = true;
        Ok(())
    }
}
