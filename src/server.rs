//! ChatServer: listener and accept loop
//!
//! Owns the listening socket, the registry actor and one worker task per
//! accepted connection. The accept loop only spawns; it never waits on a
//! single connection.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::AppError;
use crate::handler::handle_connection;
use crate::registry::Registry;
use crate::router::Router;

/// Pause after a failed accept (e.g. out of file descriptors)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// The chat server
pub struct ChatServer {
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
}

impl ChatServer {
    /// Bind the listening socket and start the registry
    ///
    /// Failing to bind is the only fatal server error.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, AppError> {
        let listener = TcpListener::bind(addr).await?;
        let router = Router::new(Registry::spawn());
        Ok(Self {
            listener,
            router,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        Ok(self.listener.local_addr()?)
    }

    /// Token that stops the server when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn registry(&self) -> &Registry {
        self.router.registry()
    }

    /// Run the accept loop until the shutdown token is cancelled
    ///
    /// On shutdown the listener is closed first, then every worker is woken
    /// and awaited.
    pub async fn run(self) {
        let Self {
            listener,
            router,
            shutdown,
        } = self;
        let mut workers = JoinSet::new();

        if let Ok(addr) = listener.local_addr() {
            info!("Chat server listening on {}", addr);
        }

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some(joined) = workers.join_next(), if !workers.is_empty() => {
                    if let Err(e) = joined {
                        error!("Connection task failed: {}", e);
                    }
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        info!("New connection from {}", addr);
                        let router = router.clone();
                        let shutdown = shutdown.clone();

                        // Spawn a worker for each connection
                        workers.spawn(async move {
                            if let Err(e) = handle_connection(stream, addr, router, shutdown).await {
                                error!("Connection handler error for {}: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        info!("Server shutdown initiated, closing listener");
        drop(listener);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Connection task failed: {}", e);
            }
        }

        info!("Server shutdown complete");
    }
}
