//! Request decoding: a head followed by its payload items.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};

/// Decodes a stream of requests.
///
/// While `payload_decoder` is `None` the decoder is waiting for a request head;
/// otherwise it is draining the current request's payload. Every request yields
/// exactly one `Message::Header`, any number of chunks and one `PayloadItem::Eof`.
#[derive(Debug, Default)]
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHeader, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode(src)? {
                Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    self.payload_decoder.take();
                    Some(Message::Payload(item))
                }
                None => None,
            };

            return Ok(message);
        }

        let message = match self.header_decoder.decode(src)? {
            Some((header, payload_size)) => {
                self.payload_decoder = Some(payload_size.into());
                Some(Message::Header((header, payload_size)))
            }
            None => None,
        };

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn pipelined_requests() {
        let str = indoc! {r##"
        POST /upload HTTP/1.1
        Content-Length: 5

        helloGET / HTTP/1.1
        Host: localhost

        "##};

        let mut buf = BytesMut::from(str);
        let mut decoder = RequestDecoder::new();

        let Some(Message::Header((header, payload_size))) = decoder.decode(&mut buf).unwrap() else {
            panic!("expect request head");
        };
        assert_eq!(header.uri().path(), "/upload");
        assert_eq!(payload_size, PayloadSize::Length(5));

        let chunk = decoder.decode(&mut buf).unwrap().unwrap().into_payload_item().unwrap();
        assert_eq!(chunk.as_bytes().unwrap().as_ref(), b"hello");
        assert!(decoder.decode(&mut buf).unwrap().unwrap().into_payload_item().unwrap().is_eof());

        let Some(Message::Header((header, payload_size))) = decoder.decode(&mut buf).unwrap() else {
            panic!("expect second request head");
        };
        assert_eq!(header.uri().path(), "/");
        assert!(payload_size.is_empty());
        assert!(decoder.decode(&mut buf).unwrap().unwrap().into_payload_item().unwrap().is_eof());
        assert!(decoder.decode(&mut buf).unwrap().is_none());
    }
}
