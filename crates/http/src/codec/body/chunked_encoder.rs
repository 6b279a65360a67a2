use std::io::Write;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::Encoder;

use crate::protocol::{PayloadItem, SendError};

/// Writes a body of unknown length with the chunked transfer coding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkedEncoder {
    eof: bool,
}

impl ChunkedEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finish(&self) -> bool {
        self.eof
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for ChunkedEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if self.eof {
            return Ok(());
        }

        match item {
            // an empty chunk would read as the last-chunk marker
            PayloadItem::Chunk(data) if !data.has_remaining() => Ok(()),
            PayloadItem::Chunk(mut data) => {
                write!((&mut *dst).writer(), "{:X}\r\n", data.remaining())?;
                dst.reserve(data.remaining() + 2);
                while data.has_remaining() {
                    let chunk = data.chunk();
                    let n = chunk.len();
                    dst.extend_from_slice(chunk);
                    data.advance(n);
                }
                dst.extend_from_slice(b"\r\n");
                Ok(())
            }
            PayloadItem::Eof => {
                self.eof = true;
                dst.extend_from_slice(b"0\r\n\r\n");
                Ok(())
            }
        }
    }
}
