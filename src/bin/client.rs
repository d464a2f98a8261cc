//! relay_chat terminal client - Entry Point

use clap::Parser;

use relay_chat::chat_client::ChatClient;
use relay_chat::logging::{self, CLIENT_DEFAULT_FILTER};
use relay_chat::ClientConfig;

#[tokio::main]
async fn main() {
    let config = ClientConfig::parse();
    logging::init(CLIENT_DEFAULT_FILTER, std::io::stderr);

    let code = match ChatClient::new(config).run().await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!("Client error: {}", e);
            1
        }
    };

    // A pending blocking stdin read would otherwise hold the runtime open
    std::process::exit(code);
}
