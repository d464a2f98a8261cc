//! Broadcast and whisper routing
//!
//! Delivery works on a point-in-time snapshot of the registry. A failed
//! delivery (peer gone, queue full) is logged and skipped; it never stops
//! delivery to the remaining recipients. The failed peer's own worker sees
//! its queue close and tears the connection down.

use tracing::{debug, warn};

use crate::connection::Connection;
use crate::error::{AppError, SendError};
use crate::message::Message;
use crate::registry::Registry;
use crate::types::ConnectionId;

/// Routes messages to registered connections
#[derive(Debug, Clone)]
pub struct Router {
    registry: Registry,
}

impl Router {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Deliver `msg` to every registered connection except `exclude`
    ///
    /// Returns how many recipients accepted the message.
    pub async fn broadcast(
        &self,
        msg: Message,
        exclude: Option<ConnectionId>,
    ) -> Result<usize, AppError> {
        let targets = self.registry.snapshot().await?;
        let delivered = fan_out(
            targets.iter().filter(|conn| Some(conn.id) != exclude),
            &msg,
        );
        debug!("Broadcast delivered to {} connection(s)", delivered);
        Ok(delivered)
    }

    /// Deliver `msg` to exactly `peers`, e.g. the members a newcomer found
    /// on registration
    pub fn announce(&self, peers: &[Connection], msg: Message) -> usize {
        fan_out(peers.iter(), &msg)
    }

    /// Deliver a private message from `sender` to the user named `recipient`
    ///
    /// On a hit the recipient gets the private message and the sender an
    /// echo. On a miss the sender alone gets a not-online notice and
    /// `AppError::RecipientNotFound` is returned.
    pub async fn whisper(
        &self,
        sender: &Connection,
        recipient: &str,
        text: &str,
    ) -> Result<(), AppError> {
        let Some(target) = self.registry.find_by_username(recipient).await? else {
            deliver(sender, AppError::RecipientNotFound(recipient.to_string()).into());
            return Err(AppError::RecipientNotFound(recipient.to_string()));
        };

        deliver(&target, Message::private(&sender.username, &target.username, text));
        deliver(sender, Message::private_sent(&sender.username, &target.username, text));
        debug!("Whisper from '{}' to '{}'", sender.username, target.username);
        Ok(())
    }

    /// Send `conn` the sorted listing of registered usernames
    pub async fn online(&self, conn: &Connection) -> Result<(), AppError> {
        let usernames = self.registry.list_usernames().await?;
        deliver(conn, Message::online(&usernames));
        Ok(())
    }
}

fn fan_out<'a>(targets: impl Iterator<Item = &'a Connection>, msg: &Message) -> usize {
    targets.filter(|conn| deliver(conn, msg.clone())).count()
}

/// Queue a message for one connection, logging a failure
///
/// A full queue ends the connection: its worker sees the queue close.
pub fn deliver(conn: &Connection, msg: Message) -> bool {
    match conn.send(msg) {
        Ok(()) => true,
        Err(SendError::Full) => {
            warn!(
                "Connection {} ('{}') is not keeping up, disconnecting",
                conn.id, conn.username
            );
            false
        }
        Err(e) => {
            warn!(
                "Dropping message for {} ('{}'): {}",
                conn.id, conn.username, e
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use tokio::sync::mpsc;

    use super::*;
    use crate::channel::Outbound;
    use crate::message::Category;

    async fn join_with_capacity(
        registry: &Registry,
        name: &str,
        capacity: usize,
    ) -> (Connection, mpsc::Receiver<Message>) {
        let (outbound, mut rx) = Outbound::detached(capacity);
        let addr: SocketAddr = "127.0.0.1:6000".parse().unwrap();
        let conn = Connection::new(ConnectionId::new(), addr, name.to_string(), outbound);
        registry
            .register(conn.clone(), Message::welcome(name))
            .await
            .unwrap();
        // Discard the greeting
        rx.recv().await.unwrap();
        (conn, rx)
    }

    async fn join(registry: &Registry, name: &str) -> (Connection, mpsc::Receiver<Message>) {
        join_with_capacity(registry, name, 16).await
    }

    fn drain(rx: &mut mpsc::Receiver<Message>) -> Vec<Message> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn test_broadcast_excludes_sender() {
        let registry = Registry::spawn();
        let router = Router::new(registry.clone());
        let (alice, mut alice_rx) = join(&registry, "alice").await;
        let (_bob, mut bob_rx) = join(&registry, "bob").await;
        let (_carol, mut carol_rx) = join(&registry, "carol").await;

        let delivered = router
            .broadcast(Message::chat("alice", "hello"), Some(alice.id))
            .await
            .unwrap();

        assert_eq!(delivered, 2);
        assert!(drain(&mut alice_rx).is_empty());
        for rx in [&mut bob_rx, &mut carol_rx] {
            let got = drain(rx);
            assert_eq!(got.len(), 1);
            assert_eq!(got[0].sender, "alice");
            assert_eq!(got[0].content, "hello");
        }
    }

    #[tokio::test]
    async fn test_broadcast_survives_failed_recipient() {
        let registry = Registry::spawn();
        let router = Router::new(registry.clone());
        let (_alice, mut alice_rx) = join(&registry, "alice").await;
        let (_bob, bob_rx) = join(&registry, "bob").await;
        let (_carol, mut carol_rx) = join(&registry, "carol").await;

        // Bob's writer is gone
        drop(bob_rx);

        let delivered = router
            .broadcast(Message::system("notice"), None)
            .await
            .unwrap();

        assert_eq!(delivered, 2);
        assert_eq!(drain(&mut alice_rx).len(), 1);
        assert_eq!(drain(&mut carol_rx).len(), 1);
    }

    #[tokio::test]
    async fn test_full_queue_disconnects_recipient() {
        let registry = Registry::spawn();
        let router = Router::new(registry.clone());
        let (alice, _alice_rx) = join(&registry, "alice").await;
        let (slow, mut slow_rx) = join_with_capacity(&registry, "slow", 2).await;

        for i in 0..3 {
            let delivered = router
                .broadcast(Message::chat("alice", format!("line {}", i)), Some(alice.id))
                .await
                .unwrap();
            assert_eq!(delivered, if i < 2 { 1 } else { 0 });
        }

        // The slow peer's worker is woken to tear it down
        tokio::time::timeout(std::time::Duration::from_secs(1), slow.closed())
            .await
            .expect("slow connection closed");

        // Draining does not reopen the feed
        assert_eq!(drain(&mut slow_rx).len(), 2);
        router
            .broadcast(Message::chat("alice", "late"), Some(alice.id))
            .await
            .unwrap();
        assert!(drain(&mut slow_rx).is_empty());
    }

    #[tokio::test]
    async fn test_announce_reaches_given_peers_only() {
        let registry = Registry::spawn();
        let router = Router::new(registry.clone());
        let (alice, mut alice_rx) = join(&registry, "alice").await;
        let (_bob, mut bob_rx) = join(&registry, "bob").await;

        let delivered = router.announce(&[alice], Message::joined("bob"));
        assert_eq!(delivered, 1);
        assert_eq!(drain(&mut alice_rx)[0].encode(), "bob has joined the chat!");
        assert!(drain(&mut bob_rx).is_empty());
    }

    #[tokio::test]
    async fn test_whisper_to_self() {
        let registry = Registry::spawn();
        let router = Router::new(registry.clone());
        let (alice, mut alice_rx) = join(&registry, "alice").await;

        router.whisper(&alice, "alice", "note").await.unwrap();

        let got: Vec<String> = drain(&mut alice_rx).iter().map(Message::encode).collect();
        assert_eq!(got, vec!["[PM from alice] note", "[PM to alice] note"]);
    }

    #[tokio::test]
    async fn test_whisper_hit() {
        let registry = Registry::spawn();
        let router = Router::new(registry.clone());
        let (_alice, mut alice_rx) = join(&registry, "alice").await;
        let (bob, mut bob_rx) = join(&registry, "bob").await;
        let (_carol, mut carol_rx) = join(&registry, "carol").await;

        router.whisper(&bob, "carol", "hi").await.unwrap();

        let to_carol = drain(&mut carol_rx);
        assert_eq!(to_carol.len(), 1);
        assert_eq!(to_carol[0].category, Category::Private);
        assert_eq!(to_carol[0].encode(), "[PM from bob] hi");

        let to_bob = drain(&mut bob_rx);
        assert_eq!(to_bob.len(), 1);
        assert_eq!(to_bob[0].encode(), "[PM to carol] hi");

        assert!(drain(&mut alice_rx).is_empty());
    }

    #[tokio::test]
    async fn test_online_goes_to_requester_only() {
        let registry = Registry::spawn();
        let router = Router::new(registry.clone());
        let (_carol, mut carol_rx) = join(&registry, "carol").await;
        let (alice, mut alice_rx) = join(&registry, "alice").await;

        router.online(&alice).await.unwrap();

        let to_alice = drain(&mut alice_rx);
        assert_eq!(to_alice.len(), 1);
        assert_eq!(to_alice[0].encode(), "Users online: alice, carol");
        assert!(drain(&mut carol_rx).is_empty());
    }

    #[tokio::test]
    async fn test_whisper_miss() {
        let registry = Registry::spawn();
        let router = Router::new(registry.clone());
        let (alice, mut alice_rx) = join(&registry, "alice").await;
        let (_bob, mut bob_rx) = join(&registry, "bob").await;

        let err = router.whisper(&alice, "dave", "psst").await.unwrap_err();
        assert!(matches!(err, AppError::RecipientNotFound(name) if name == "dave"));

        let to_alice = drain(&mut alice_rx);
        assert_eq!(to_alice.len(), 1);
        assert_eq!(to_alice[0].encode(), "Error: User dave is not online.");
        assert!(drain(&mut bob_rx).is_empty());
    }
}
