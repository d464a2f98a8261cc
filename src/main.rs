//! relay_chat server - Entry Point
//!
//! Binds the listener, runs the accept loop and stops cleanly on Ctrl-C.

use clap::Parser;
use tracing::{error, info};

use relay_chat::logging::{self, SERVER_DEFAULT_FILTER};
use relay_chat::{ChatServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::parse();
    logging::init(SERVER_DEFAULT_FILTER, std::io::stdout);

    let server = match ChatServer::bind(config.bind_addr()).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start server on {}: {}", config.bind_addr(), e);
            return Err(e.into());
        }
    };

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received");
                shutdown.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    server.run().await;
    Ok(())
}
