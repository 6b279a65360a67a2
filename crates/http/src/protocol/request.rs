//! Decoded request head.

use http::header::CONNECTION;
use http::{HeaderMap, Method, Request, Uri, Version};

/// The head of a decoded request, before a body is attached.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl RequestHeader {
    /// Attaches a body, producing the request handed to a [`Handler`](crate::handler::Handler).
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|()| body)
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn is_head(&self) -> bool {
        self.method() == Method::HEAD
    }

    /// Whether the connection may carry another request after this one.
    ///
    /// HTTP/1.1 is persistent unless the client sends `Connection: close`,
    /// HTTP/1.0 only when it sends `Connection: keep-alive`.
    pub fn is_keep_alive(&self) -> bool {
        match self.version() {
            Version::HTTP_11 => !self.has_connection_option("close"),
            _ => self.has_connection_option("keep-alive"),
        }
    }

    fn has_connection_option(&self, option: &str) -> bool {
        self.headers()
            .get_all(CONNECTION)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .any(|token| token.trim().eq_ignore_ascii_case(option))
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}
