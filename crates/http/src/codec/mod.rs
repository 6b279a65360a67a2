//! `tokio_util` codecs for HTTP/1.x.
//!
//! [`RequestDecoder`] turns the inbound byte stream into a request head
//! followed by payload items, [`ResponseEncoder`] does the reverse for
//! responses. Both switch between a header phase and a payload phase; the
//! payload framing (content-length, chunked, none) is chosen from the head.
//!
//! ```
//! use bytes::BytesMut;
//! use responder_http::codec::RequestDecoder;
//! use responder_http::protocol::Message;
//! use tokio_util::codec::Decoder;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::from(&b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n"[..]);
//! let message = decoder.decode(&mut buffer).unwrap().unwrap();
//! assert!(message.is_header());
//! ```

mod body;
mod header;
mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
