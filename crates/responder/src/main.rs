use responder::{DEFAULT_ADDRESS, Server, hello_world};
use responder_http::handler::make_handler;
use tracing::{Level, error};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let server = match Server::builder().address(DEFAULT_ADDRESS).handler(make_handler(hello_world)).build() {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, "invalid server configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.start().await {
        error!(cause = %e, "bind server error");
        std::process::exit(1);
    }
}
