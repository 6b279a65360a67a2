use std::convert::Infallible;

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use responder_http::protocol::body::ReqBody;

/// The payload of every response.
pub const HELLO_WORLD: &[u8] = b"Hello, world\n";

/// Answers any request with `200 OK` and [`HELLO_WORLD`].
///
/// The request is not inspected and its body is left to the connection to
/// drain. Framing, `Content-Type` and `Date` are added by the transport.
pub async fn hello_world(_request: Request<ReqBody>) -> Result<Response<Full<Bytes>>, Infallible> {
    Ok(Response::new(Full::new(Bytes::from_static(HELLO_WORLD))))
}
