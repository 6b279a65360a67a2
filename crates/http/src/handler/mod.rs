//! The seam between the connection and application code.
//!
//! A [`Handler`] turns a request into a response. [`make_handler`] adapts a
//! plain async function:
//!
//! ```
//! use std::convert::Infallible;
//! use http::{Request, Response};
//! use responder_http::handler::make_handler;
//! use responder_http::protocol::body::ReqBody;
//!
//! async fn ok(_request: Request<ReqBody>) -> Result<Response<String>, Infallible> {
//!     Ok(Response::new("ok".to_string()))
//! }
//!
//! let handler = make_handler(ok);
//! # let _ = handler;
//! ```

use std::error::Error;

use http::{Request, Response};
use http_body::Body;

use crate::protocol::body::ReqBody;

pub trait Handler: Send + Sync {
    type RespBody: Body;
    type Error: Into<Box<dyn Error + Send + Sync>>;
    type Fut<'fut>: Future<Output = Result<Response<Self::RespBody>, Self::Error>> + Send
    where
        Self: 'fut;

    fn call(&self, req: Request<ReqBody>) -> Self::Fut<'_>;
}

/// A [`Handler`] backed by a function returning a future.
#[derive(Debug, Clone, Copy)]
pub struct HandlerFn<F> {
    f: F,
}

impl<RespBody, Err, F, Fut> Handler for HandlerFn<F>
where
    RespBody: Body,
    F: Fn(Request<ReqBody>) -> Fut + Send + Sync,
    Err: Into<Box<dyn Error + Send + Sync>>,
    Fut: Future<Output = Result<Response<RespBody>, Err>> + Send,
{
    type RespBody = RespBody;
    type Error = Err;
    type Fut<'fut>
        = Fut
    where
        Self: 'fut;

    fn call(&self, req: Request<ReqBody>) -> Self::Fut<'_> {
        (self.f)(req)
    }
}

pub fn make_handler<F, RespBody, Err, Fut>(f: F) -> HandlerFn<F>
where
    RespBody: Body,
    Err: Into<Box<dyn Error + Send + Sync>>,
    Fut: Future<Output = Result<Response<RespBody>, Err>>,
    F: Fn(Request<ReqBody>) -> Fut,
{
    HandlerFn { f }
}
