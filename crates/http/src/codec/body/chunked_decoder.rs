//! Decodes chunked transfer encoding, see
//! [RFC 9112 Section 7.1](https://www.rfc-editor.org/rfc/rfc9112.html#name-chunked-transfer-coding).
//!
//! Chunk extensions and trailer fields are read and discarded.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::protocol::{ParseError, PayloadItem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    remaining_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// hex digits of the chunk size
    Size,
    /// whitespace after the size
    SizeLws,
    /// `;ext=value` after the size
    Extension,
    SizeLf,
    Body,
    BodyCr,
    BodyLf,
    Trailer,
    TrailerLf,
    EndCr,
    EndLf,
    End,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: ChunkedState::Size, remaining_size: 0 }
    }

    fn step(&mut self, byte: u8) -> Result<ChunkedState, ParseError> {
        use ChunkedState::*;

        let next = match (self.state, byte) {
            (Size, b) if b.is_ascii_hexdigit() => {
                let digit = u64::from(char::from(b).to_digit(16).unwrap_or_default());
                self.remaining_size = self
                    .remaining_size
                    .checked_mul(16)
                    .and_then(|size| size.checked_add(digit))
                    .ok_or_else(|| ParseError::invalid_body("invalid overflow chunked length"))?;
                Size
            }
            (Size | SizeLws, b'\t' | b' ') => SizeLws,
            (Size | SizeLws, b';') => Extension,
            (Size | SizeLws | Extension, b'\r') => SizeLf,
            (Extension, b'\n') => return Err(ParseError::invalid_body("invalid chunk extension contains newline")),
            (Extension, _) => Extension,
            (SizeLf, b'\n') if self.remaining_size == 0 => EndCr,
            (SizeLf, b'\n') => Body,
            (BodyCr, b'\r') => BodyLf,
            (BodyLf, b'\n') => Size,
            (EndCr, b'\r') => EndLf,
            (Trailer, b'\r') => TrailerLf,
            (EndCr | Trailer, _) => Trailer,
            (TrailerLf, b'\n') => EndCr,
            (EndLf, b'\n') => End,
            (state, b) => {
                return Err(ParseError::invalid_body(format!("unexpected byte {b:#04x} in chunked state {state:?}")));
            }
        };
        Ok(next)
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                ChunkedState::End => {
                    trace!("finished reading chunked data");
                    return Ok(Some(PayloadItem::Eof));
                }

                ChunkedState::Body => {
                    if src.is_empty() {
                        return Ok(None);
                    }

                    let read_size = usize::try_from(self.remaining_size).map_or(src.len(), |r| r.min(src.len()));
                    let bytes = src.split_to(read_size).freeze();
                    self.remaining_size -= read_size as u64;
                    if self.remaining_size == 0 {
                        self.state = ChunkedState::BodyCr;
                    }

                    trace!(len = bytes.len(), "read chunked bytes");
                    return Ok(Some(PayloadItem::Chunk(bytes)));
                }

                _ => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let byte = src.get_u8();
                    self.state = self.step(byte)?;
                }
            }
        }
    }
}
