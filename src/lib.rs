//! Multi-user TCP chat server library
//!
//! A line-based chat service built on tokio: participants pick a unique
//! username, chat with everyone, whisper to one user and query presence.
//!
//! # Features
//! - Concurrent TCP connections, one worker task per connection
//! - Unique username negotiation
//! - Broadcast chat with sender exclusion
//! - Whispers (`/whisper`), presence (`/online`), `/help`, `/quit`
//! - Clean shutdown through a cancellation token
//! - A terminal client with local history, themes and preferences
//!
//! # Architecture
//! - `Registry` is an actor owning all presence state; every read and
//!   write is a message to it, so it is the only synchronization point
//! - Each connection's socket writes go through one writer task fed by a
//!   bounded queue (`channel::Outbound`), which keeps per-recipient order
//! - `Router` fans messages out over a registry snapshot
//! - `handler::handle_connection` runs the per-connection state machine
//!
//! # Wire format
//! Newline-delimited UTF-8 lines, at most 2048 bytes each. See [`message`].
//!
//! # Example
//! ```ignore
//! use relay_chat::ChatServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), relay_chat::AppError> {
//!     let server = ChatServer::bind("127.0.0.1:25000").await?;
//!     let shutdown = server.shutdown_token();
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         shutdown.cancel();
//!     });
//!     server.run().await;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod chat_client;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod logging;
pub mod message;
pub mod registry;
pub mod router;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use command::Command;
pub use config::{ClientConfig, ServerConfig};
pub use connection::Connection;
pub use error::{AppError, SendError};
pub use handler::handle_connection;
pub use message::{Category, Message};
pub use registry::Registry;
pub use router::Router;
pub use server::ChatServer;
pub use types::ConnectionId;
