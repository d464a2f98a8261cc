//! Basic type definitions for the chat server
//!
//! Provides the `ConnectionId` newtype and the username rules shared by
//! negotiation and the registry.

use uuid::Uuid;

/// Longest accepted username, in characters
pub const MAX_USERNAME_LEN: usize = 32;

/// Unique connection identifier (newtype pattern)
///
/// Wraps a UUID v4 so every accepted socket gets an identity independent
/// of its username and remote address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Check a trimmed username against the naming rules.
///
/// Returns the reason on rejection so it can be echoed to the user.
pub fn validate_username(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("name is empty");
    }
    if name.chars().count() > MAX_USERNAME_LEN {
        return Err("name is longer than 32 characters");
    }
    if name.chars().any(char::is_whitespace) {
        return Err("name contains whitespace");
    }
    if name.contains(':') {
        return Err("name contains ':'");
    }
    if name.starts_with('/') {
        return Err("name starts with '/'");
    }
    Ok(())
}
