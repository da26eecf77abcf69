//! Decodes bodies framed by `Content-Length`.

use std::cmp;

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::protocol::{ParseError, PayloadItem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    /// bytes still expected
    length: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { length }
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.length == 0 {
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        let len = usize::try_from(cmp::min(self.length, src.len() as u64)).unwrap_or(src.len());
        let bytes = src.split_to(len).freeze();

        self.length -= bytes.len() as u64;
        Ok(Some(PayloadItem::Chunk(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_at_length() {
        let mut buffer = BytesMut::from(&b"101234567890abcdef\r\n\r\n"[..]);
        let mut decoder = LengthDecoder::new(10);

        let payload = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(payload.as_bytes().unwrap().as_ref(), b"1012345678");
        assert_eq!(&buffer[..], b"90abcdef\r\n\r\n");

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn waits_for_more_bytes() {
        let mut buffer = BytesMut::from(&b"abc"[..]);
        let mut decoder = LengthDecoder::new(5);

        assert_eq!(decoder.decode(&mut buffer).unwrap().unwrap().as_bytes().unwrap().as_ref(), b"abc");
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"de");
        assert_eq!(decoder.decode(&mut buffer).unwrap().unwrap().as_bytes().unwrap().as_ref(), b"de");
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }
}
