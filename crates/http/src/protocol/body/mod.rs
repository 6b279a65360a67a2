//! Streaming request bodies.
//!
//! The connection owns the framed reader, so a handler cannot pull payload
//! frames from it directly. Instead [`ReqBody::body_channel`] splits the body
//! into two halves joined by a bounded channel:
//!
//! - [`ReqBody`], handed to the handler, implements [`http_body::Body`];
//! - [`ReqBodySender`], kept by the connection, pumps payload frames from the
//!   reader into the channel while the handler runs, and drains whatever the
//!   handler left unread once it is done.
//!
//! Draining keeps the connection aligned on the next request even when the
//! handler never touches the body, which is the common case for the responder.

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures::channel::mpsc;
use futures::{SinkExt, Stream, StreamExt};
use http_body::{Body, Frame, SizeHint};
use tracing::{debug, trace};

use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};

/// Chunks buffered between the pump and the handler before the pump waits.
const BODY_CHANNEL_SIZE: usize = 16;

type BodyItem = Result<Bytes, ParseError>;

/// The request body as seen by a handler.
#[derive(Debug)]
pub struct ReqBody {
    receiver: Option<mpsc::Receiver<BodyItem>>,
}

impl ReqBody {
    /// A body that ends immediately.
    pub fn empty() -> Self {
        Self { receiver: None }
    }

    /// Creates the handler-facing body and the connection-facing pump over `payload_stream`.
    pub fn body_channel<S>(payload_stream: &mut S) -> (ReqBody, ReqBodySender<'_, S>)
    where
        S: Stream + Unpin,
    {
        let (sender, receiver) = mpsc::channel(BODY_CHANNEL_SIZE);
        let body = ReqBody { receiver: Some(receiver) };
        let body_sender = ReqBodySender { payload_stream, sender, state: PumpState::Streaming };
        (body, body_sender)
    }
}

impl Default for ReqBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl Body for ReqBody {
    type Data = Bytes;
    type Error = ParseError;

    fn poll_frame(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Poll::Ready(None);
        };

        match ready!(receiver.poll_next_unpin(cx)) {
            Some(Ok(bytes)) => Poll::Ready(Some(Ok(Frame::data(bytes)))),
            Some(Err(e)) => {
                self.receiver = None;
                Poll::Ready(Some(Err(e)))
            }
            None => {
                self.receiver = None;
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.receiver.is_none()
    }

    fn size_hint(&self) -> SizeHint {
        if self.receiver.is_none() { SizeHint::with_exact(0) } else { SizeHint::default() }
    }
}

#[derive(Debug)]
enum PumpState {
    Streaming,
    Eof,
    Failed(Option<ParseError>),
}

/// Moves payload frames of the current request from the connection into its [`ReqBody`].
#[derive(Debug)]
pub struct ReqBodySender<'conn, S>
where
    S: Stream + Unpin,
{
    payload_stream: &'conn mut S,
    sender: mpsc::Sender<BodyItem>,
    state: PumpState,
}

impl<S> ReqBodySender<'_, S>
where
    S: Stream<Item = Result<Message<(RequestHeader, PayloadSize)>, ParseError>> + Unpin,
{
    /// Forwards payload chunks to the body until the payload ends or fails.
    ///
    /// Safe to drop at any await point: the state survives, and
    /// [`skip_body`](Self::skip_body) picks up where the pump stopped.
    pub async fn send_body(&mut self) {
        while matches!(self.state, PumpState::Streaming) {
            match self.next_chunk().await {
                Ok(Some(bytes)) => {
                    if self.sender.send(Ok(bytes)).await.is_err() {
                        trace!("request body dropped by handler, draining the rest later");
                        return;
                    }
                }
                Ok(None) => self.sender.close_channel(),
                Err(e) => {
                    let _ = self.sender.send(Err(ParseError::invalid_body(&e))).await;
                    self.sender.close_channel();
                }
            }
        }
    }

    /// Reads and discards whatever payload the handler left unread.
    pub async fn skip_body(&mut self) -> Result<(), ParseError> {
        let mut skipped: usize = 0;
        while matches!(self.state, PumpState::Streaming) {
            if let Ok(Some(bytes)) = self.next_chunk().await {
                skipped += bytes.len();
            }
        }

        if skipped > 0 {
            debug!(size = skipped, "skipped unread request body");
        }

        match &mut self.state {
            PumpState::Failed(e) => Err(e.take().unwrap_or_else(|| ParseError::invalid_body("request body already failed"))),
            _ => Ok(()),
        }
    }

    /// Next chunk of the payload, or `None` once the payload has ended.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, ParseError> {
        let result = match self.payload_stream.next().await {
            Some(Ok(Message::Payload(PayloadItem::Chunk(bytes)))) => return Ok(Some(bytes)),
            Some(Ok(Message::Payload(PayloadItem::Eof))) => {
                self.state = PumpState::Eof;
                return Ok(None);
            }
            Some(Ok(Message::Header(_))) => ParseError::invalid_body("received a request head while reading a body"),
            Some(Err(e)) => e,
            None => ParseError::invalid_body("connection closed before the request body ended"),
        };

        let message = result.to_string();
        self.state = PumpState::Failed(Some(result));
        Err(ParseError::invalid_body(message))
    }
}
