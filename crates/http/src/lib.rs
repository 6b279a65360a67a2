//! A small asynchronous HTTP/1.x server toolkit on top of tokio.
//!
//! The crate owns the wire protocol and the connection lifecycle; applications
//! plug in a [`handler::Handler`] and own the listener.
//!
//! # Example
//!
//! ```no_run
//! use std::convert::Infallible;
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use http::{Request, Response};
//! use http_body_util::Full;
//! use tokio::net::TcpListener;
//! use responder_http::connection::HttpConnection;
//! use responder_http::handler::make_handler;
//! use responder_http::protocol::body::ReqBody;
//!
//! async fn hello(_request: Request<ReqBody>) -> Result<Response<Full<Bytes>>, Infallible> {
//!     Ok(Response::new(Full::new(Bytes::from_static(b"Hello, world\n"))))
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     let handler = Arc::new(make_handler(hello));
//!
//!     loop {
//!         let (stream, _) = listener.accept().await?;
//!         let handler = handler.clone();
//!         tokio::spawn(async move {
//!             let (reader, writer) = stream.into_split();
//!             let _ = HttpConnection::new(reader, writer).process(handler).await;
//!         });
//!     }
//! }
//! ```
//!
//! # Modules
//!
//! - [`codec`]: request decoding and response encoding
//! - [`connection`]: the per-connection request loop
//! - [`handler`]: the application seam
//! - [`protocol`]: messages, heads, bodies and errors
//! - [`date`]: the cached `Date` header value
//! - [`sniff`]: `Content-Type` inference for responses that set none
//!
//! # Limits
//!
//! - HTTP/1.0 and HTTP/1.1 only
//! - request heads up to 8 KiB with at most 64 headers

pub mod codec;
pub mod connection;
pub mod date;
pub mod handler;
pub mod protocol;
pub mod sniff;

mod utils;
pub(crate) use utils::ensure;
