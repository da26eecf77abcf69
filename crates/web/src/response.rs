//! The write side of one request.
//!
//! A [`Response`] accumulates headers until one of its completion calls runs:
//! [`end`](Response::end) for a status-only reply, [`send`](Response::send) for a
//! buffered body and [`stream`](Response::stream) for a chunked body pulled from a
//! reader. The first completion moves the response to done. Everything after that,
//! including further completions and header writes, is silently ignored.

use std::fmt;
use std::io::{self, Read};
use std::ops::{BitOr, BitOrAssign};

use bytes::Bytes;
use cex_http::protocol::{ResponseHead, SendError};
use http::header::{CONTENT_ENCODING, DATE};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Version};
use tracing::{debug, warn};

use crate::codec::{self, Compression, StreamingCodec};
use crate::output::Output;

/// Size of the chunks [`Response::stream`] pulls from its source.
pub const IO_BUFFER_SIZE: usize = 128 * 1024;

/// Feature flags of a response.
///
/// `COMPRESS_GZIP` and `COMPRESS_DEFLATE` live under the `COMPRESSION` mask; at most
/// one of them should be set, and gzip wins if both are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u32);

impl Flags {
    pub const NONE: Flags = Flags(0);
    pub const COMPRESS_GZIP: Flags = Flags(0x1);
    pub const COMPRESS_DEFLATE: Flags = Flags(0x2);
    pub const COMPRESSION: Flags = Flags(0xF);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    /// The compression family selected by these flags.
    pub fn compression(self) -> Option<Compression> {
        if self.contains(Flags::COMPRESS_GZIP) {
            Some(Compression::Gzip)
        } else if self.contains(Flags::COMPRESS_DEFLATE) {
            Some(Compression::Deflate)
        } else {
            None
        }
    }

    /// Returns these flags with the compression bits replaced by `compression`.
    pub fn with_compression(self, compression: Option<Compression>) -> Flags {
        let rest = Flags(self.0 & !Flags::COMPRESSION.0);
        match compression {
            Some(Compression::Gzip) => rest | Flags::COMPRESS_GZIP,
            Some(Compression::Deflate) => rest | Flags::COMPRESS_DEFLATE,
            None => rest,
        }
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Pending,
    Done,
}

enum Interrupted {
    Source(io::Error),
    Output(SendError),
}

/// The response to one request.
pub struct Response {
    output: Box<dyn Output>,
    version: Version,
    headers: HeaderMap,
    flags: Flags,
    state: State,
}

impl Response {
    /// Creates a pending response answering a request of the given `version`.
    pub fn new(output: Box<dyn Output>, version: Version) -> Self {
        Self { output, version, headers: HeaderMap::new(), flags: Flags::NONE, state: State::Pending }
    }

    pub fn is_pending(&self) -> bool {
        self.state == State::Pending
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: Flags) {
        self.flags = flags;
    }

    /// Appends a header. The value may be a string or an integer.
    ///
    /// Invalid names or values are logged and dropped; once the response is done
    /// this does nothing.
    pub fn set<K, V>(&mut self, name: K, value: V)
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        if self.is_done() {
            return;
        }

        let name = match HeaderName::try_from(name) {
            Ok(name) => name,
            Err(e) => {
                let e: http::Error = e.into();
                warn!(cause = %e, "ignoring header with invalid name");
                return;
            }
        };
        match HeaderValue::try_from(value) {
            Ok(value) => {
                self.headers.append(name, value);
            }
            Err(e) => {
                let e: http::Error = e.into();
                warn!(header = %name, cause = %e, "ignoring header with invalid value");
            }
        }
    }

    /// The first value of the named header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Completes the response with a status line and headers only.
    pub fn end(&mut self, status: StatusCode) {
        if self.is_done() {
            return;
        }
        let head = self.take_head(status);
        let result = self.output.send_reply(head, None);
        self.complete(result);
    }

    /// Completes the response with a fully materialized body.
    ///
    /// A non-empty body is compressed when a compression flag is set.
    pub fn send(&mut self, status: StatusCode, body: impl Into<Bytes>) {
        if self.is_done() {
            return;
        }

        let mut body = body.into();
        if let Some(compression) = self.flags.compression().filter(|_| !body.is_empty()) {
            match codec::compress(compression, &body) {
                Ok(compressed) => {
                    body = compressed;
                    self.headers.insert(CONTENT_ENCODING, HeaderValue::from_static(compression.content_encoding()));
                }
                Err(e) => warn!(cause = %e, "compression failed, sending body uncompressed"),
            }
        }

        let head = self.take_head(status);
        let result = self.output.send_reply(head, Some(body));
        self.complete(result);
    }

    /// Completes the response with a chunked body pulled from `source`.
    ///
    /// The source is read in [`IO_BUFFER_SIZE`] pieces and never loaded whole. An
    /// empty source answers `status` with an empty body; a source that fails on the
    /// first read answers `500` instead. A failure later on ends the chunked body
    /// where it stands. Returns the number of source bytes read, or the source's
    /// error. An output failure is reported as [`io::ErrorKind::BrokenPipe`].
    ///
    /// HTTP/1.0 clients get the body without chunk framing, ended by closing the
    /// connection.
    pub fn stream<R: Read>(&mut self, status: StatusCode, mut source: R) -> io::Result<u64> {
        if self.is_done() {
            return Ok(0);
        }

        let mut buf = vec![0u8; IO_BUFFER_SIZE];
        let first = match read_chunk(&mut source, &mut buf) {
            Ok(0) => {
                self.send(status, Bytes::new());
                return Ok(0);
            }
            Ok(read) => read,
            Err(e) => {
                warn!(cause = %e, "stream source unreadable");
                self.end(StatusCode::INTERNAL_SERVER_ERROR);
                return Err(e);
            }
        };

        let codec = self.flags.compression().map(|compression| {
            self.headers.insert(CONTENT_ENCODING, HeaderValue::from_static(compression.content_encoding()));
            StreamingCodec::new(compression)
        });

        let head = self.take_head(status);
        self.state = State::Done;
        if let Err(e) = self.output.start_chunked(head) {
            warn!(cause = %e, "failed to start chunked response");
            return Err(broken_pipe(e));
        }

        match self.pump(&mut source, &mut buf, first, codec) {
            Ok(total) => match self.output.end_chunked() {
                Ok(()) => Ok(total),
                Err(e) => {
                    warn!(cause = %e, "failed to end chunked response");
                    Err(broken_pipe(e))
                }
            },
            Err(Interrupted::Source(e)) => {
                warn!(cause = %e, "stream source failed, ending response early");
                if let Err(e) = self.output.end_chunked() {
                    warn!(cause = %e, "failed to end chunked response");
                }
                Err(e)
            }
            Err(Interrupted::Output(e)) => {
                warn!(cause = %e, "failed to write chunk");
                Err(broken_pipe(e))
            }
        }
    }

    fn pump<R: Read>(
        &mut self,
        source: &mut R,
        buf: &mut [u8],
        first: usize,
        mut codec: Option<StreamingCodec>,
    ) -> Result<u64, Interrupted> {
        let mut total = 0u64;
        let mut read = first;

        while read > 0 {
            total += read as u64;
            let chunk = match codec.as_mut() {
                Some(codec) => codec.encode(&buf[..read]).map_err(Interrupted::Source)?,
                None => Bytes::copy_from_slice(&buf[..read]),
            };
            self.output.send_chunk(chunk).map_err(Interrupted::Output)?;
            read = read_chunk(source, buf).map_err(Interrupted::Source)?;
        }

        if let Some(codec) = codec {
            let tail = codec.finish().map_err(Interrupted::Source)?;
            self.output.send_chunk(tail).map_err(Interrupted::Output)?;
        }
        Ok(total)
    }

    fn take_head(&mut self, status: StatusCode) -> ResponseHead {
        let mut head = ResponseHead::new(());
        *head.status_mut() = status;
        *head.version_mut() = self.version;
        *head.headers_mut() = std::mem::take(&mut self.headers);

        if !head.headers().contains_key(DATE) {
            let mut date = faf_http_date::get_date_buff_no_key();
            faf_http_date::get_date_no_key(&mut date);
            if let Ok(value) = HeaderValue::from_bytes(&date[..]) {
                head.headers_mut().insert(DATE, value);
            }
        }
        head
    }

    fn complete(&mut self, result: Result<(), SendError>) {
        self.state = State::Done;
        if let Err(e) = result {
            warn!(cause = %e, "failed to write response");
        } else {
            debug!("response completed");
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("version", &self.version)
            .field("headers", &self.headers)
            .field("flags", &self.flags)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

fn read_chunk<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match source.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}

fn broken_pipe(e: SendError) -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, e)
}
