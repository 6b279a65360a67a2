//! A single-endpoint HTTP server.
//!
//! Every request, whatever its method, path, headers or body, is answered
//! with `200 OK` and the body `Hello, world\n`. The `responder` binary listens
//! on [`DEFAULT_ADDRESS`]; the library lets tests and embedders choose their
//! own address:
//!
//! ```no_run
//! use responder::{Server, hello_world};
//! use responder_http::handler::make_handler;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let server = Server::builder().address("127.0.0.1:8080").handler(make_handler(hello_world)).build()?;
//! server.start().await?;
//! # Ok(())
//! # }
//! ```

mod handler;
mod server;

pub use handler::{HELLO_WORLD, hello_world};
pub use server::{DEFAULT_ADDRESS, ListeningServer, Server, ServerBuildError, ServerBuilder, ServerError};
