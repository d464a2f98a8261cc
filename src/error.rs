//! Error types for the chat server
//!
//! Defines application-level errors and per-recipient send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// business errors (send an error reply to the issuing client only).
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Every connection attempt timed out
    #[error("Failed to connect after {attempts} attempts")]
    ConnectTimeout { attempts: u32 },

    /// Line framing error on the read side (fatal)
    #[error("Framing error: {0}")]
    Frame(#[from] LinesCodecError),

    /// The registry actor has stopped (fatal - internal channel broken)
    #[error("Registry closed")]
    RegistryClosed,

    /// The peer closed the connection
    #[error("Channel closed")]
    ChannelClosed,

    /// Username already registered by another connection
    #[error("Username taken: {0}")]
    NameTaken(String),

    /// Username rejected by the naming rules
    #[error("Invalid username: {0}")]
    InvalidUsername(&'static str),

    /// Whisper target is not registered
    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),

    /// Command recognized but its arguments are malformed
    #[error("Malformed command, usage: {0}")]
    MalformedCommand(&'static str),

    /// Command token not recognized
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Inbound frame exceeded the maximum line length
    #[error("Frame too long")]
    FrameTooLong,
}

/// Message send errors
///
/// Occurs when queueing a frame for a connection whose writer is gone
/// or backed up.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The writer task has ended (peer disconnected)
    #[error("Channel closed")]
    ChannelClosed,

    /// The outbound queue is full, the frame was dropped
    #[error("Outbound queue full")]
    Full,
}
