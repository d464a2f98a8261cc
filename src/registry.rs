//! Connection registry actor
//!
//! The single owner of presence state: which connections are active and
//! under which username. All reads and writes go through one task that
//! processes `RegistryCommand`s in order, so a check-then-insert on
//! registration is atomic with respect to every other registry operation.
//! The newcomer's greeting is queued in that same step, so no broadcast can
//! reach it first.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::connection::Connection;
use crate::error::AppError;
use crate::message::Message;
use crate::types::ConnectionId;

/// Channel buffer size for registry commands
const REGISTRY_BUFFER_SIZE: usize = 256;

/// Commands sent from handles to the registry actor
#[derive(Debug)]
pub enum RegistryCommand {
    /// Insert a connection if its username is free, queue its greeting and
    /// reply with the connections registered before it
    Register {
        connection: Connection,
        greeting: Message,
        reply: oneshot::Sender<Result<Vec<Connection>, AppError>>,
    },
    /// Remove a connection (no-op if absent)
    Unregister {
        id: ConnectionId,
        reply: oneshot::Sender<Option<Connection>>,
    },
    /// Sorted snapshot of usernames
    ListUsernames {
        reply: oneshot::Sender<Vec<String>>,
    },
    /// Exact, case-sensitive lookup
    FindByUsername {
        username: String,
        reply: oneshot::Sender<Option<Connection>>,
    },
    /// Point-in-time copy of every registered connection
    Snapshot {
        reply: oneshot::Sender<Vec<Connection>>,
    },
    /// Number of registered connections
    Len { reply: oneshot::Sender<usize> },
}

/// The registry actor
///
/// Uses HashMap for O(1) lookups by connection and by username.
pub struct RegistryActor {
    /// Registered connections: ConnectionId -> Connection
    connections: HashMap<ConnectionId, Connection>,
    /// Username index: username -> ConnectionId
    usernames: HashMap<String, ConnectionId>,
    /// Command receiver channel
    receiver: mpsc::Receiver<RegistryCommand>,
}

impl RegistryActor {
    /// Create a new actor with the given command receiver
    pub fn new(receiver: mpsc::Receiver<RegistryCommand>) -> Self {
        Self {
            connections: HashMap::new(),
            usernames: HashMap::new(),
            receiver,
        }
    }

    /// Run the registry event loop
    ///
    /// Processes commands until every `Registry` handle is dropped.
    pub async fn run(mut self) {
        debug!("Registry started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        debug!("Registry shutting down");
    }

    /// Process a single command
    ///
    /// A dropped reply receiver only means the requester went away.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register {
                connection,
                greeting,
                reply,
            } => {
                let _ = reply.send(self.handle_register(connection, greeting));
            }
            RegistryCommand::Unregister { id, reply } => {
                let _ = reply.send(self.handle_unregister(id));
            }
            RegistryCommand::ListUsernames { reply } => {
                let mut names: Vec<String> = self.usernames.keys().cloned().collect();
                names.sort();
                let _ = reply.send(names);
            }
            RegistryCommand::FindByUsername { username, reply } => {
                let found = self
                    .usernames
                    .get(&username)
                    .and_then(|id| self.connections.get(id))
                    .cloned();
                let _ = reply.send(found);
            }
            RegistryCommand::Snapshot { reply } => {
                let _ = reply.send(self.connections.values().cloned().collect());
            }
            RegistryCommand::Len { reply } => {
                let _ = reply.send(self.connections.len());
            }
        }
    }

    fn handle_register(
        &mut self,
        connection: Connection,
        greeting: Message,
    ) -> Result<Vec<Connection>, AppError> {
        if self.usernames.contains_key(&connection.username) {
            debug!(
                "Connection {} asked for taken username '{}'",
                connection.id, connection.username
            );
            return Err(AppError::NameTaken(connection.username));
        }

        info!(
            "Connection {} registered as '{}' from {}",
            connection.id, connection.username, connection.addr
        );
        if let Err(e) = connection.send(greeting) {
            debug!("Greeting for {} not queued: {}", connection.id, e);
        }
        let peers = self.connections.values().cloned().collect();
        self.usernames.insert(connection.username.clone(), connection.id);
        self.connections.insert(connection.id, connection);
        debug!("Total registered: {}", self.connections.len());
        Ok(peers)
    }

    fn handle_unregister(&mut self, id: ConnectionId) -> Option<Connection> {
        let connection = self.connections.remove(&id)?;
        self.usernames.remove(&connection.username);
        info!("Connection {} ('{}') unregistered", id, connection.username);
        debug!("Total registered: {}", self.connections.len());
        Some(connection)
    }
}

/// Cloneable handle to the registry actor
#[derive(Debug, Clone)]
pub struct Registry {
    sender: mpsc::Sender<RegistryCommand>,
}

impl Registry {
    /// Start a registry actor on the current runtime and return its handle
    pub fn spawn() -> Self {
        let (sender, receiver) = mpsc::channel(REGISTRY_BUFFER_SIZE);
        tokio::spawn(RegistryActor::new(receiver).run());
        Self { sender }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RegistryCommand,
    ) -> Result<T, AppError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(make(reply))
            .await
            .map_err(|_| AppError::RegistryClosed)?;
        response.await.map_err(|_| AppError::RegistryClosed)
    }

    /// Register `connection` under its username
    ///
    /// `greeting` is queued to the connection before anything else can
    /// address it. Returns the connections that were registered before it.
    /// Exactly one of several concurrent registrations of the same name
    /// succeeds; the others get `AppError::NameTaken`.
    pub async fn register(
        &self,
        connection: Connection,
        greeting: Message,
    ) -> Result<Vec<Connection>, AppError> {
        self.request(|reply| RegistryCommand::Register {
            connection,
            greeting,
            reply,
        })
        .await?
    }

    /// Remove a connection; returns whether it was registered
    pub async fn unregister(&self, id: ConnectionId) -> Result<bool, AppError> {
        let removed = self
            .request(|reply| RegistryCommand::Unregister { id, reply })
            .await?;
        Ok(removed.is_some())
    }

    /// Sorted copy of all registered usernames
    pub async fn list_usernames(&self) -> Result<Vec<String>, AppError> {
        self.request(|reply| RegistryCommand::ListUsernames { reply })
            .await
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<Connection>, AppError> {
        let username = username.to_string();
        self.request(|reply| RegistryCommand::FindByUsername { username, reply })
            .await
    }

    /// Point-in-time copy of every registered connection
    pub async fn snapshot(&self) -> Result<Vec<Connection>, AppError> {
        self.request(|reply| RegistryCommand::Snapshot { reply })
            .await
    }

    pub async fn len(&self) -> Result<usize, AppError> {
        self.request(|reply| RegistryCommand::Len { reply }).await
    }
}
