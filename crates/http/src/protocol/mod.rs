//! Protocol types shared by the codec and the connection.
//!
//! - [`Message`], [`PayloadItem`], [`PayloadSize`]: the framed message stream
//! - [`RequestHeader`] / [`ResponseHead`]: message heads
//! - [`body::ReqBody`]: the streaming request body given to handlers
//! - [`HttpError`], [`ParseError`], [`SendError`]: failures

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;

mod response;
pub use response::ResponseHead;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;
