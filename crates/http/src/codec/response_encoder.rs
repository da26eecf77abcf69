use std::io;
use std::io::ErrorKind;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::error;

use crate::codec::body::PayloadEncoder;
use crate::codec::header::HeaderEncoder;
use crate::protocol::{Message, PayloadItem, PayloadSize, ResponseHead, SendError};

/// Encodes a stream of responses.
///
/// Each response is a `Message::Header` followed by payload items and closed by
/// `PayloadItem::Eof`; a new head is rejected until the previous payload is closed.
#[derive(Debug, Default)]
pub struct ResponseEncoder {
    header_encoder: HeaderEncoder,
    payload_encoder: Option<PayloadEncoder>,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<D: Buf> Encoder<Message<(ResponseHead, PayloadSize), D>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<(ResponseHead, PayloadSize), D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header((head, payload_size)) => {
                if self.payload_encoder.is_some() {
                    error!("expect payload item but receive response head");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                }

                self.payload_encoder = Some(payload_size.into());
                self.header_encoder.encode((head, payload_size), dst)
            }

            Message::Payload(payload_item) => {
                let Some(payload_encoder) = &mut self.payload_encoder else {
                    error!("expect response header but receive payload item");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                };

                let is_eof = payload_item.is_eof();
                let result = payload_encoder.encode(payload_item, dst);
                if is_eof {
                    self.payload_encoder.take();
                }
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{Response, StatusCode};

    fn head() -> ResponseHead {
        Response::builder().status(StatusCode::OK).body(()).unwrap()
    }

    #[test]
    fn length_response() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(Message::<_, Bytes>::Header((head(), PayloadSize::Length(5))), &mut dst).unwrap();
        encoder.encode(Message::<(ResponseHead, PayloadSize)>::from(Bytes::from_static(b"hello")), &mut dst).unwrap();
        encoder.encode(Message::<(ResponseHead, PayloadSize), Bytes>::Payload(PayloadItem::Eof), &mut dst).unwrap();

        let encoded = String::from_utf8(dst.to_vec()).unwrap();
        assert!(encoded.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(encoded.contains("content-length: 5\r\n"));
        assert!(encoded.ends_with("\r\n\r\nhello"));
    }

    #[test]
    fn rejects_head_before_eof() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(Message::<_, Bytes>::Header((head(), PayloadSize::Chunked)), &mut dst).unwrap();
        assert!(encoder.encode(Message::<_, Bytes>::Header((head(), PayloadSize::Empty)), &mut dst).is_err());
    }

    #[test]
    fn rejects_payload_without_head() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        assert!(encoder.encode(Message::<(ResponseHead, PayloadSize), Bytes>::Payload(PayloadItem::Eof), &mut dst).is_err());
    }
}
