use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::warn;

use crate::protocol::{PayloadItem, SendError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    length: u64,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { length }
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for LengthEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            PayloadItem::Chunk(bytes) => {
                let size = bytes.remaining() as u64;
                if size > self.length {
                    warn!(size, remaining = self.length, "payload exceeds announced content-length");
                    return Err(SendError::invalid_body("payload exceeds announced content-length"));
                }
                dst.extend_from_slice(bytes.chunk());
                self.length -= size;
                Ok(())
            }
            PayloadItem::Eof if self.length > 0 => {
                Err(SendError::invalid_body(format!("payload ended {} bytes short of content-length", self.length)))
            }
            PayloadItem::Eof => Ok(()),
        }
    }
}
