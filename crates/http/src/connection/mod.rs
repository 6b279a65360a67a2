//! Connection handling.
//!
//! [`HttpConnection`] drives one client connection: it decodes requests from
//! the read half, hands each to a [`Handler`](crate::handler::Handler) while
//! the request body streams in, and encodes the response to the write half.
//!
//! Persistence follows HTTP/1.x rules. HTTP/1.1 connections stay open unless
//! the client sends `Connection: close`, HTTP/1.0 ones close unless it sends
//! `Connection: keep-alive`. Malformed requests get a bodiless error response
//! (400, 431 or 505) and the connection is closed.

mod http_connection;

pub use http_connection::HttpConnection;
