use std::fmt::Display;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use http_body::Body;
use responder_http::connection::HttpConnection;
use responder_http::handler::Handler;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Where the binary listens: port 1234 on every interface.
pub const DEFAULT_ADDRESS: &str = "0.0.0.0:1234";

#[derive(Debug)]
pub struct ServerBuilder<H> {
    address: Option<io::Result<Vec<SocketAddr>>>,
    handler: Option<H>,
}

impl<H> ServerBuilder<H> {
    fn new() -> Self {
        Self { address: None, handler: None }
    }

    /// Sets the listen address. Resolution errors surface from [`build`](Self::build).
    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.address = Some(address.to_socket_addrs().map(Iterator::collect));
        self
    }

    pub fn handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn build(self) -> Result<Server<H>, ServerBuildError> {
        let address = self.address.ok_or(ServerBuildError::MissingAddress)?.map_err(ServerBuildError::InvalidAddress)?;
        if address.is_empty() {
            return Err(ServerBuildError::InvalidAddress(io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing")));
        }
        let handler = self.handler.ok_or(ServerBuildError::MissingHandler)?;
        Ok(Server { address, handler: Arc::new(handler) })
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("address must be set")]
    MissingAddress,
    #[error("handler must be set")]
    MissingHandler,
    #[error("invalid address: {0}")]
    InvalidAddress(#[source] io::Error),
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("can't bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },
}

/// A configured server that has not bound its address yet.
#[derive(Debug)]
pub struct Server<H> {
    address: Vec<SocketAddr>,
    handler: Arc<H>,
}

/// A server holding its listening socket.
#[derive(Debug)]
pub struct ListeningServer<H> {
    listener: TcpListener,
    handler: Arc<H>,
}

impl<H> Server<H> {
    pub fn builder() -> ServerBuilder<H> {
        ServerBuilder::new()
    }

    /// Acquires the listening socket and logs the startup line.
    pub async fn bind(self) -> Result<ListeningServer<H>, ServerError> {
        let bind_error = |source| ServerError::Bind {
            address: self.address.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "),
            source,
        };
        let listener = TcpListener::bind(self.address.as_slice()).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        info!(port = local_addr.port(), "starting http server");

        Ok(ListeningServer { listener, handler: self.handler })
    }
}

impl<H> Server<H>
where
    H: Handler + 'static,
    H::Error: Send,
    H::RespBody: Body + Send + Unpin,
    <H::RespBody as Body>::Data: Send,
    <H::RespBody as Body>::Error: Display,
{
    /// Binds, then serves forever. Only returns on a bind failure.
    pub async fn start(self) -> Result<(), ServerError> {
        self.bind().await?.serve().await;
        Ok(())
    }
}

impl<H> ListeningServer<H> {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl<H> ListeningServer<H>
where
    H: Handler + 'static,
    H::Error: Send,
    H::RespBody: Body + Send + Unpin,
    <H::RespBody as Body>::Data: Send,
    <H::RespBody as Body>::Error: Display,
{
    /// Accepts connections forever, one task per connection.
    pub async fn serve(self) {
        loop {
            let (tcp_stream, remote_addr) = match self.listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                let (reader, writer) = tcp_stream.into_split();
                let connection = HttpConnection::new(reader, writer);
                match connection.process(handler).await {
                    Ok(()) => debug!(%remote_addr, "connection finished"),
                    Err(e) => debug!(%remote_addr, cause = %e, "connection closed on error"),
                }
            });
        }
    }
}
