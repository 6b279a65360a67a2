//! Request head decoding.
//!
//! The head is parsed with `httparse` into a fixed array of 64 header slots,
//! then copied into an owned `http::Request<()>`. A head larger than 8 KiB is
//! rejected whether or not it is complete yet, so a client cannot make the
//! connection buffer without bound.
//!
//! Once the head is known, the payload framing is chosen from
//! `Transfer-Encoding` and `Content-Length` following RFC 9112 §6.

use bytes::{Buf, BytesMut};
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Uri, Version};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, RequestHeader};

/// Maximum number of headers allowed in a request
const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes of the whole head, request line included
const MAX_HEADER_BYTES: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderDecoder;

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut headers);

        let status = req.parse(src).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            Error::Version => ParseError::InvalidVersion(None),
            e => ParseError::invalid_header(e),
        })?;

        let head_size = match status {
            Status::Complete(head_size) => head_size,
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
        };
        trace!(head_size, "parsed request head");
        ensure!(head_size <= MAX_HEADER_BYTES, ParseError::too_large_header(head_size, MAX_HEADER_BYTES));

        let version = match req.version {
            Some(0) => Version::HTTP_10,
            Some(1) => Version::HTTP_11,
            v => return Err(ParseError::InvalidVersion(v)),
        };
        let method = req.method.ok_or(ParseError::InvalidMethod)?;
        let method = Method::from_bytes(method.as_bytes()).map_err(|_| ParseError::InvalidMethod)?;
        let uri = req.path.ok_or(ParseError::InvalidUri)?.parse::<Uri>().map_err(|_| ParseError::InvalidUri)?;

        let mut request = Request::new(());
        *request.method_mut() = method;
        *request.uri_mut() = uri;
        *request.version_mut() = version;
        copy_headers(req.headers, request.headers_mut())?;

        src.advance(head_size);

        let header = RequestHeader::from(request);
        let payload_size = parse_payload(&header)?;
        Ok(Some((header, payload_size)))
    }
}

fn copy_headers(parsed: &[httparse::Header<'_>], headers: &mut HeaderMap) -> Result<(), ParseError> {
    headers.reserve(parsed.len());
    for header in parsed {
        let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(ParseError::invalid_header)?;
        let value = HeaderValue::from_bytes(header.value).map_err(ParseError::invalid_header)?;
        headers.append(name, value);
    }
    Ok(())
}

/// Chooses the payload framing for a request.
///
/// Framing headers are honored for every method: a GET that carries a body
/// still has that body drained before the next request is read.
fn parse_payload(header: &RequestHeader) -> Result<PayloadSize, ParseError> {
    let headers = header.headers();

    match (headers.contains_key(TRANSFER_ENCODING), headers.contains_key(CONTENT_LENGTH)) {
        (false, false) => Ok(PayloadSize::Empty),

        (true, false) => {
            // codings accumulate across repeated header lines, only the final one decides
            let last_line = headers.get_all(TRANSFER_ENCODING).iter().last();
            ensure!(last_line.is_some_and(is_chunked), ParseError::invalid_header("transfer-encoding must end with chunked"));
            Ok(PayloadSize::Chunked)
        }

        (false, true) => match content_length(headers)? {
            0 => Ok(PayloadSize::Empty),
            length => Ok(PayloadSize::Length(length)),
        },

        (true, true) => Err(ParseError::invalid_content_length("transfer-encoding and content-length both present")),
    }
}

/// Reads `Content-Length`, which may repeat as long as every copy agrees.
fn content_length(headers: &HeaderMap) -> Result<u64, ParseError> {
    let mut length = None;
    for value in headers.get_all(CONTENT_LENGTH) {
        let text = value.to_str().map_err(|_| ParseError::invalid_content_length("value is not visible ascii"))?.trim();
        ensure!(
            !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()),
            ParseError::invalid_content_length(format!("{text:?} is not a decimal length"))
        );
        let parsed = text.parse::<u64>().map_err(|_| ParseError::invalid_content_length(format!("{text} overflows u64")))?;

        match length {
            Some(previous) if previous != parsed => {
                return Err(ParseError::invalid_content_length(format!("conflicting values {previous} and {parsed}")));
            }
            _ => length = Some(parsed),
        }
    }
    length.ok_or_else(|| ParseError::invalid_content_length("missing value"))
}

/// Whether chunked is the final transfer coding.
fn is_chunked(value: &HeaderValue) -> bool {
    value.as_bytes().rsplit(|b| *b == b',').next().is_some_and(|last| last.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn decode(raw: &str) -> Result<Option<(RequestHeader, PayloadSize)>, ParseError> {
        HeaderDecoder.decode(&mut BytesMut::from(raw))
    }

    #[test]
    fn chunked_must_be_last() {
        assert!(is_chunked(&HeaderValue::from_static("chunked")));
        assert!(is_chunked(&HeaderValue::from_static("gzip, Chunked")));
        assert!(!is_chunked(&HeaderValue::from_static("chunked, gzip")));
        assert!(!is_chunked(&HeaderValue::from_static("gzip")));
    }

    #[test]
    fn from_curl() {
        let raw = indoc! {r"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:1234
        User-Agent: curl/8.4.0
        Accept: */*

        "};

        let (header, payload_size) = decode(raw).unwrap().unwrap();

        assert_eq!(payload_size, PayloadSize::Empty);
        assert_eq!(header.method(), &Method::GET);
        assert_eq!(header.version(), Version::HTTP_11);
        assert_eq!(header.uri().path(), "/index.html");
        assert_eq!(header.uri().query(), None);
        assert_eq!(header.headers().len(), 3);
        assert_eq!(header.headers().get(http::header::HOST).unwrap(), "127.0.0.1:1234");
        assert_eq!(header.headers().get(http::header::USER_AGENT).unwrap(), "curl/8.4.0");
    }

    #[test]
    fn leaves_the_body_in_the_buffer() {
        let raw = indoc! {r"
        POST /anything?x=1 HTTP/1.1
        Content-Length: 3

        123"};

        let mut buffer = BytesMut::from(raw);
        let (header, payload_size) = HeaderDecoder.decode(&mut buffer).unwrap().unwrap();

        assert_eq!(header.method(), &Method::POST);
        assert_eq!(header.uri().query(), Some("x=1"));
        assert_eq!(payload_size, PayloadSize::Length(3));
        assert_eq!(&buffer[..], b"123");
    }

    #[test]
    fn partial_head_waits_for_more() {
        let mut buffer = BytesMut::from("GET / HTTP/1.1\r\nHost: loc");
        assert!(HeaderDecoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"alhost\r\n\r\n");
        let (header, _) = HeaderDecoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(header.headers().get(http::header::HOST).unwrap(), "localhost");
        assert!(buffer.is_empty());
    }

    #[test]
    fn http10_request_line() {
        let (header, _) = decode("GET / HTTP/1.0\r\n\r\n").unwrap().unwrap();
        assert_eq!(header.version(), Version::HTTP_10);
    }

    #[test]
    fn unusual_methods_are_accepted() {
        let (header, _) = decode("PURGE /cache HTTP/1.1\r\n\r\n").unwrap().unwrap();
        assert_eq!(header.method().as_str(), "PURGE");

        let (header, _) = decode("OPTIONS * HTTP/1.1\r\n\r\n").unwrap().unwrap();
        assert_eq!(header.method(), &Method::OPTIONS);
    }

    #[test]
    fn body_framing() {
        let (_, size) = decode("POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n").unwrap().unwrap();
        assert_eq!(size, PayloadSize::Chunked);

        let (_, size) = decode("GET / HTTP/1.1\r\nContent-Length: 5\r\n\r\n").unwrap().unwrap();
        assert_eq!(size, PayloadSize::Length(5));

        let (_, size) = decode("POST / HTTP/1.1\r\nContent-Length: 0\r\n\r\n").unwrap().unwrap();
        assert_eq!(size, PayloadSize::Empty);

        let (_, size) = decode("POST / HTTP/1.1\r\nContent-Length: 7\r\nContent-Length: 7\r\n\r\n").unwrap().unwrap();
        assert_eq!(size, PayloadSize::Length(7));
    }

    #[test]
    fn rejects_bad_framing() {
        for raw in [
            "POST / HTTP/1.1\r\nContent-Length: abc\r\n\r\n",
            "POST / HTTP/1.1\r\nContent-Length: +5\r\n\r\n",
            "POST / HTTP/1.1\r\nContent-Length: 5\r\nContent-Length: 6\r\n\r\n",
            "POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\nContent-Length: 5\r\n\r\n",
        ] {
            assert!(matches!(decode(raw), Err(ParseError::InvalidContentLength { .. })), "{raw:?}");
        }

        let result = decode("POST / HTTP/1.1\r\nTransfer-Encoding: gzip\r\n\r\n");
        assert!(matches!(result, Err(ParseError::InvalidHeader { .. })));
    }

    #[test]
    fn chunked_must_be_the_last_coding_across_header_lines() {
        let raw = "POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\nTransfer-Encoding: gzip\r\n\r\n";
        assert!(matches!(decode(raw), Err(ParseError::InvalidHeader { .. })));

        let raw = "POST / HTTP/1.1\r\nTransfer-Encoding: gzip\r\nTransfer-Encoding: chunked\r\n\r\n";
        let (_, size) = decode(raw).unwrap().unwrap();
        assert_eq!(size, PayloadSize::Chunked);
    }

    #[test]
    fn rejects_malformed_request_line() {
        assert!(decode("NOT A REQUEST\r\n\r\n").is_err());
        assert!(matches!(decode("GET / HTTP/2.0\r\n\r\n"), Err(ParseError::InvalidVersion(_))));
    }

    #[test]
    fn rejects_oversized_heads() {
        let raw = format!("GET / HTTP/1.1\r\nX-Filler: {}\r\n\r\n", "a".repeat(MAX_HEADER_BYTES));
        assert!(matches!(decode(&raw), Err(ParseError::TooLargeHeader { .. })));

        let partial = format!("GET / HTTP/1.1\r\nX-Filler: {}", "a".repeat(MAX_HEADER_BYTES));
        assert!(matches!(decode(&partial), Err(ParseError::TooLargeHeader { .. })));

        let many: String = (0..=MAX_HEADER_NUM).map(|i| format!("X-{i}: v\r\n")).collect();
        let raw = format!("GET / HTTP/1.1\r\n{many}\r\n");
        assert!(matches!(decode(&raw), Err(ParseError::TooManyHeaders { .. })));
    }
}
