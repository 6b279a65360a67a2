use std::io::{self, ErrorKind};

use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::error;

use crate::codec::body::PayloadEncoder;
use crate::codec::header::HeaderEncoder;
use crate::protocol::{Message, PayloadSize, ResponseHead, SendError};

/// Encodes a stream of responses: a head, then payload items up to `Eof`.
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
                if self.payload_encoder.as_ref().is_some_and(|encoder| !encoder.is_finish()) {
                    error!("expect payload item but receive response head");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                }

                self.payload_encoder = Some(payload_size.into());
                self.header_encoder.encode((head, payload_size), dst)
            }

            Message::Payload(payload_item) => {
                let Some(payload_encoder) = &mut self.payload_encoder else {
                    error!("expect response head but receive payload item");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                };

                let result = payload_encoder.encode(payload_item, dst);
                if payload_encoder.is_finish() {
                    self.payload_encoder = None;
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
    use http::Response;
    use crate::protocol::PayloadItem;

    type Item = Message<(ResponseHead, PayloadSize), Bytes>;

    #[test]
    fn head_then_body() {
        let mut encoder = ResponseEncoder::new();
        let mut buffer = BytesMut::new();

        encoder.encode(Item::Header((Response::new(()), PayloadSize::Length(13))), &mut buffer).unwrap();
        encoder.encode(Item::Payload(PayloadItem::Chunk(Bytes::from_static(b"Hello, world\n"))), &mut buffer).unwrap();
        encoder.encode(Item::Payload(PayloadItem::Eof), &mut buffer).unwrap();

        assert_eq!(&buffer[..], b"HTTP/1.1 200 OK\r\ncontent-length: 13\r\n\r\nHello, world\n");
    }

    #[test]
    fn rejects_out_of_order_items() {
        let mut encoder = ResponseEncoder::new();
        let mut buffer = BytesMut::new();
        assert!(encoder.encode(Item::Payload(PayloadItem::Eof), &mut buffer).is_err());

        encoder.encode(Item::Header((Response::new(()), PayloadSize::Chunked)), &mut buffer).unwrap();
        assert!(encoder.encode(Item::Header((Response::new(()), PayloadSize::Empty)), &mut buffer).is_err());
    }

    #[test]
    fn empty_payload_allows_the_next_head() {
        let mut encoder = ResponseEncoder::new();
        let mut buffer = BytesMut::new();

        encoder.encode(Item::Header((Response::new(()), PayloadSize::Empty)), &mut buffer).unwrap();
        encoder.encode(Item::Header((Response::new(()), PayloadSize::Empty)), &mut buffer).unwrap();
        assert_eq!(&buffer[..], b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\nHTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n");
    }
}
