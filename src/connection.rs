//! Registered connection handle
//!
//! What the registry and router know about a live participant.

use std::net::SocketAddr;

use crate::channel::Outbound;
use crate::error::SendError;
use crate::message::Message;
use crate::types::ConnectionId;

/// A connection that completed username negotiation
///
/// The username is fixed at construction. The socket itself stays owned by
/// the lifecycle worker; this handle only reaches its outbound queue.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Unique identifier for this connection
    pub id: ConnectionId,
    /// Remote peer address
    pub addr: SocketAddr,
    /// Negotiated username
    pub username: String,
    outbound: Outbound,
}

impl Connection {
    pub fn new(id: ConnectionId, addr: SocketAddr, username: String, outbound: Outbound) -> Self {
        Self {
            id,
            addr,
            username,
            outbound,
        }
    }

    /// Queue a message for this connection
    ///
    /// Returns an error if the writer is gone (peer disconnected) or backed up.
    pub fn send(&self, msg: Message) -> Result<(), SendError> {
        self.outbound.send(msg)
    }

    /// Resolves once the connection's writer has stopped or its queue
    /// overflowed
    pub async fn closed(&self) {
        self.outbound.closed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_send() {
        let (outbound, mut rx) = Outbound::detached(4);
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let conn = Connection::new(ConnectionId::new(), addr, "alice".to_string(), outbound);

        conn.send(Message::system("hi")).unwrap();
        assert_eq!(rx.recv().await.unwrap().content, "hi");
        assert_eq!(conn.username, "alice");
        assert_eq!(conn.addr, addr);
    }
}
