use std::error::Error;
use std::fmt::Display;
use std::sync::Arc;

use bytes::{Buf, Bytes};
use futures::{SinkExt, StreamExt};
use http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, DATE, EXPECT, TRANSFER_ENCODING};
use http::{HeaderValue, Response, StatusCode, Version};
use http_body::Body;
use http_body_util::{BodyExt, Empty};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, trace};

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::date::http_date;
use crate::handler::Handler;
use crate::protocol::body::ReqBody;
use crate::protocol::{HttpError, Message, ParseError, PayloadItem, PayloadSize, RequestHeader, ResponseHead, SendError};
use crate::sniff::sniff;

const READ_BUFFER_SIZE: usize = 8 * 1024;

const CLOSE: HeaderValue = HeaderValue::from_static("close");
const KEEP_ALIVE: HeaderValue = HeaderValue::from_static("keep-alive");

/// One HTTP/1.x connection.
///
/// Requests are read and answered one at a time, in order, until the peer
/// closes the connection, asks for it to be closed, or sends something that
/// cannot be parsed.
#[derive(Debug)]
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
}

/// What the response writer needs to know about the request it answers.
#[derive(Debug, Clone, Copy)]
struct Exchange {
    head_only: bool,
    keep_alive: bool,
    version: Version,
}

impl Exchange {
    fn of(header: &RequestHeader) -> Self {
        Self { head_only: header.is_head(), keep_alive: header.is_keep_alive(), version: header.version() }
    }

    /// The last exchange on a connection that is being given up on.
    fn closing() -> Self {
        Self { head_only: false, keep_alive: false, version: Version::HTTP_11 }
    }
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), READ_BUFFER_SIZE),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
        }
    }

    /// Serves requests from this connection with `handler` until it ends.
    ///
    /// Returns `Ok(())` when the peer closes between requests or a
    /// non-persistent exchange completes.
    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler,
        H::RespBody: Body + Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        loop {
            match self.framed_read.next().await {
                Some(Ok(Message::Header((header, payload_size)))) => {
                    let exchange = Exchange::of(&header);
                    self.do_process(header, payload_size, exchange, &*handler).await?;
                    if !exchange.keep_alive {
                        trace!("exchange is not persistent, closing connection");
                        return self.shutdown().await;
                    }
                }

                Some(Ok(Message::Payload(_))) => {
                    let e = ParseError::invalid_body("received payload without a request head");
                    self.send_error_response(e.status_code()).await?;
                    return Err(e.into());
                }

                Some(Err(e)) => {
                    debug!(cause = %e, "can't decode request");
                    self.send_error_response(e.status_code()).await?;
                    return Err(e.into());
                }

                None => {
                    trace!("peer closed connection");
                    return Ok(());
                }
            }
        }
    }

    async fn do_process<H>(
        &mut self,
        header: RequestHeader,
        payload_size: PayloadSize,
        exchange: Exchange,
        handler: &H,
    ) -> Result<(), HttpError>
    where
        H: Handler,
        H::RespBody: Body + Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        // 1xx responses are not sent to HTTP/1.0 clients (RFC 9110 §15.2)
        if exchange.version == Version::HTTP_11 && !payload_size.is_empty() && expects_continue(&header) {
            let writer = self.framed_write.get_mut();
            writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await.map_err(SendError::io)?;
            writer.flush().await.map_err(SendError::io)?;
            trace!("sent 100 continue");
        }

        let (req_body, mut body_sender) = ReqBody::body_channel(&mut self.framed_read);
        let request = header.body(req_body);

        // The handler runs alongside the body pump: a handler waiting on its
        // body must see chunks arrive, and one that ignores the body must not
        // stall on a full channel. The pump is dropped once the handler is done.
        let response_result = {
            let handler_future = handler.call(request);
            let pump = body_sender.send_body();
            tokio::pin!(handler_future, pump);

            let mut pumping = true;
            loop {
                select! {
                    biased;
                    response = &mut handler_future => break response,
                    () = &mut pump, if pumping => pumping = false,
                }
            }
        };

        if let Err(e) = body_sender.skip_body().await {
            debug!(cause = %e, "can't drain request body");
            self.send_error_response(e.status_code()).await?;
            return Err(e.into());
        }

        match response_result {
            Ok(response) => self.send_response(response, exchange).await,
            Err(e) => {
                let e: Box<dyn Error + Send + Sync> = e.into();
                error!(cause = %e, "handler failed");
                self.send_response(build_empty_response(StatusCode::INTERNAL_SERVER_ERROR), exchange).await
            }
        }
    }

    async fn send_response<T>(&mut self, response: Response<T>, exchange: Exchange) -> Result<(), HttpError>
    where
        T: Body + Unpin,
        T::Error: Display,
    {
        let (mut parts, mut body) = response.into_parts();
        let payload_size = PayloadSize::from_exact(body.size_hint().exact());

        // the first chunk is read before the head is written, it feeds content-type inference
        let mut next = if payload_size.is_empty() { None } else { next_data(&mut body).await? };

        let headers = &mut parts.headers;
        if !headers.contains_key(CONTENT_TYPE) {
            if let Some(data) = next.as_ref().filter(|data| data.has_remaining()) {
                if let Ok(value) = HeaderValue::from_str(sniff(data.chunk()).as_ref()) {
                    headers.insert(CONTENT_TYPE, value);
                }
            }
        }
        if !headers.contains_key(DATE) {
            headers.insert(DATE, http_date());
        }
        if !exchange.keep_alive {
            headers.insert(CONNECTION, CLOSE);
        } else if exchange.version == Version::HTTP_10 {
            headers.insert(CONNECTION, KEEP_ALIVE);
        }

        if exchange.head_only {
            // describe the body a GET would have received, then leave it out
            match payload_size {
                PayloadSize::Length(length) => {
                    headers.insert(CONTENT_LENGTH, length.into());
                }
                PayloadSize::Chunked => {
                    headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
                }
                PayloadSize::Empty => {}
            }
            let head = ResponseHead::from_parts(parts, ());
            self.framed_write.feed(Message::<_, T::Data>::Header((head, PayloadSize::Empty))).await?;
            return self.flush().await;
        }

        let head = ResponseHead::from_parts(parts, ());
        self.framed_write.feed(Message::<_, T::Data>::Header((head, payload_size))).await?;

        while let Some(data) = next {
            self.framed_write.feed(Message::Payload(PayloadItem::Chunk(data))).await?;
            next = next_data(&mut body).await?;
        }
        self.framed_write.feed(Message::Payload(PayloadItem::<T::Data>::Eof)).await?;

        self.flush().await
    }

    async fn send_error_response(&mut self, status_code: StatusCode) -> Result<(), HttpError> {
        self.send_response(build_empty_response(status_code), Exchange::closing()).await
    }

    async fn flush(&mut self) -> Result<(), HttpError> {
        SinkExt::<Message<(ResponseHead, PayloadSize)>>::flush(&mut self.framed_write).await?;
        Ok(())
    }

    async fn shutdown(mut self) -> Result<(), HttpError> {
        self.framed_write.get_mut().shutdown().await.map_err(SendError::io)?;
        Ok(())
    }
}

/// Next data frame of a response body; trailer frames are dropped.
async fn next_data<B>(body: &mut B) -> Result<Option<B::Data>, SendError>
where
    B: Body + Unpin,
    B::Error: Display,
{
    loop {
        match body.frame().await {
            Some(Ok(frame)) => {
                if let Ok(data) = frame.into_data() {
                    return Ok(Some(data));
                }
            }
            Some(Err(e)) => return Err(SendError::invalid_body(format!("resolve response body error: {e}"))),
            None => return Ok(None),
        }
    }
}

fn expects_continue(header: &RequestHeader) -> bool {
    header.headers().get(EXPECT).is_some_and(|value| value.as_bytes().eq_ignore_ascii_case(b"100-continue"))
}

fn build_empty_response(status_code: StatusCode) -> Response<Empty<Bytes>> {
    let mut response = Response::new(Empty::new());
    *response.status_mut() = status_code;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    use http::Request;
    use http_body_util::Full;
    use tokio::io::{AsyncReadExt, DuplexStream, duplex};

    use crate::handler::make_handler;

    async fn hello(_request: Request<ReqBody>) -> Result<Response<Full<Bytes>>, Infallible> {
        Ok(Response::new(Full::new(Bytes::from_static(b"Hello, world\n"))))
    }

    async fn echo(request: Request<ReqBody>) -> Result<Response<Full<Bytes>>, Box<dyn Error + Send + Sync>> {
        let body = request.into_body().collect().await?.to_bytes();
        Ok(Response::new(Full::new(body)))
    }

    async fn failing(_request: Request<ReqBody>) -> Result<Response<Full<Bytes>>, std::io::Error> {
        Err(std::io::Error::other("boom"))
    }

    /// Runs one connection over an in-memory pipe and returns everything it wrote.
    async fn exchange<H>(handler: H, input: &[u8]) -> (String, Result<(), HttpError>)
    where
        H: Handler + 'static,
        H::RespBody: Body + Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        let (mut client, server): (DuplexStream, DuplexStream) = duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(server);

        client.write_all(input).await.unwrap();
        client.shutdown().await.unwrap();

        let result = HttpConnection::new(reader, writer).process(Arc::new(handler)).await;

        let mut output = Vec::new();
        client.read_to_end(&mut output).await.unwrap();
        (String::from_utf8(output).unwrap(), result)
    }

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[tokio::test]
    async fn get_root() {
        let (output, result) = exchange(make_handler(hello), b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

        assert!(result.is_ok());
        assert!(output.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(output.contains("content-length: 13\r\n"));
        assert!(output.contains("content-type: text/plain; charset=utf-8\r\n"));
        assert!(output.contains("date: "));
        assert!(!output.contains("connection:"));
        assert!(output.ends_with("\r\n\r\nHello, world\n"));
    }

    #[tokio::test]
    async fn pipelined_requests_keep_their_order() {
        let input = b"GET /a HTTP/1.1\r\n\r\nPOST /anything HTTP/1.1\r\nContent-Length: 4\r\n\r\nbodyDELETE /b HTTP/1.1\r\n\r\n";
        let (output, result) = exchange(make_handler(hello), input).await;

        assert!(result.is_ok());
        assert_eq!(count(&output, "HTTP/1.1 200 OK\r\n"), 3);
        assert_eq!(count(&output, "Hello, world\n"), 3);
    }

    #[tokio::test]
    async fn handler_reads_chunked_body() {
        let input = b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n6\r\nhello \r\n5\r\nworld\r\n0\r\n\r\n";
        let (output, result) = exchange(make_handler(echo), input).await;

        assert!(result.is_ok());
        assert!(output.contains("content-length: 11\r\n"));
        assert!(output.ends_with("\r\n\r\nhello world"));
    }

    #[tokio::test]
    async fn large_unread_body_is_drained() {
        let body = vec![b'x'; 256 * 1024];
        let mut input = format!("PUT /upload HTTP/1.1\r\nContent-Length: {}\r\n\r\n", body.len()).into_bytes();
        input.extend_from_slice(&body);
        input.extend_from_slice(b"GET / HTTP/1.1\r\n\r\n");

        let (client, server) = duplex(16 * 1024);
        let (reader, writer) = tokio::io::split(server);
        let (mut client_reader, mut client_writer) = tokio::io::split(client);

        let connection = tokio::spawn(HttpConnection::new(reader, writer).process(Arc::new(make_handler(hello))));
        client_writer.write_all(&input).await.unwrap();
        client_writer.shutdown().await.unwrap();

        let mut output = Vec::new();
        client_reader.read_to_end(&mut output).await.unwrap();
        let output = String::from_utf8(output).unwrap();

        assert!(connection.await.unwrap().is_ok());
        assert_eq!(count(&output, "HTTP/1.1 200 OK\r\n"), 2);
    }

    #[tokio::test]
    async fn head_has_no_body() {
        let (output, result) = exchange(make_handler(hello), b"HEAD / HTTP/1.1\r\n\r\n").await;

        assert!(result.is_ok());
        assert!(output.contains("content-length: 13\r\n"));
        assert!(output.ends_with("\r\n\r\n"));
        assert!(!output.contains("Hello"));
    }

    #[tokio::test]
    async fn http10_closes_by_default() {
        let (output, result) = exchange(make_handler(hello), b"GET / HTTP/1.0\r\n\r\nGET / HTTP/1.0\r\n\r\n").await;

        assert!(result.is_ok());
        assert!(output.contains("connection: close\r\n"));
        assert_eq!(count(&output, "HTTP/1.1 200 OK"), 1);
    }

    #[tokio::test]
    async fn http10_keep_alive_is_echoed() {
        let input = b"GET / HTTP/1.0\r\nConnection: keep-alive\r\n\r\nGET / HTTP/1.0\r\n\r\n";
        let (output, result) = exchange(make_handler(hello), input).await;

        assert!(result.is_ok());
        assert!(output.contains("connection: keep-alive\r\n"));
        assert_eq!(count(&output, "HTTP/1.1 200 OK"), 2);
    }

    #[tokio::test]
    async fn connection_close_is_honored() {
        let input = b"GET / HTTP/1.1\r\nConnection: close\r\n\r\nGET / HTTP/1.1\r\n\r\n";
        let (output, result) = exchange(make_handler(hello), input).await;

        assert!(result.is_ok());
        assert!(output.contains("connection: close\r\n"));
        assert_eq!(count(&output, "HTTP/1.1 200 OK"), 1);
    }

    #[tokio::test]
    async fn expect_continue_gets_an_interim_response() {
        let input = b"POST / HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 2\r\n\r\nhi";
        let (output, result) = exchange(make_handler(hello), input).await;

        assert!(result.is_ok());
        assert!(output.starts_with("HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\n"));
    }

    #[tokio::test]
    async fn http10_expect_gets_no_interim_response() {
        let input = b"POST / HTTP/1.0\r\nExpect: 100-continue\r\nContent-Length: 2\r\n\r\nhi";
        let (output, result) = exchange(make_handler(hello), input).await;

        assert!(result.is_ok());
        assert!(output.starts_with("HTTP/1.1 200 OK\r\n"), "{output:?}");
        assert!(!output.contains("100 Continue"));
    }

    #[tokio::test]
    async fn malformed_request_gets_400() {
        let (output, result) = exchange(make_handler(hello), b"GET / HTTP/1.1\r\nBad Header\r\n\r\n").await;

        assert!(matches!(result, Err(HttpError::RequestError { .. })));
        assert!(output.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(output.contains("connection: close\r\n"));
        assert!(output.contains("content-length: 0\r\n"));
    }

    #[tokio::test]
    async fn oversized_head_gets_431() {
        let input = format!("GET / HTTP/1.1\r\nX-Filler: {}\r\n\r\n", "a".repeat(10 * 1024));
        let (output, result) = exchange(make_handler(hello), input.as_bytes()).await;

        assert!(result.is_err());
        assert!(output.starts_with("HTTP/1.1 431 Request Header Fields Too Large\r\n"));
    }

    #[tokio::test]
    async fn handler_error_gets_500() {
        let (output, result) = exchange(make_handler(failing), b"GET / HTTP/1.1\r\n\r\n").await;

        assert!(result.is_ok());
        assert!(output.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    }

    #[tokio::test]
    async fn truncated_request_body_gets_400() {
        let (output, result) = exchange(make_handler(hello), b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nshort").await;

        assert!(result.is_err());
        assert!(output.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }
}
