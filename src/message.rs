//! Message model and line protocol
//!
//! Every frame on the wire is one UTF-8 line. The category of a message is
//! carried by the shape of the line, so a client can recover it without any
//! extra envelope:
//!
//! ```text
//! [12:30:05] alice: hello        chat
//! [PM from bob] hi               private, as seen by the recipient
//! [PM to carol] hi               private, echo to the sender
//! Error: Unknown command '/x'.   error reply
//! alice has joined the chat!     system notice (anything else)
//! ```

use chrono::{DateTime, Local, NaiveTime, TimeZone};

use crate::error::AppError;

/// Maximum frame length in bytes, newline excluded
pub const MAX_FRAME_LEN: usize = 2048;

/// Sender name attached to notices produced by the server itself
pub const SERVER_SENDER: &str = "server";

const TIME_FORMAT: &str = "%H:%M:%S";
const PM_FROM_PREFIX: &str = "[PM from ";
const PM_TO_PREFIX: &str = "[PM to ";
const ERROR_PREFIX: &str = "Error: ";
const WELCOME_PREFIX: &str = "Welcome ";
const WELCOME_SUFFIX: &str = "! Type /help for commands.";

/// Usage string for `/whisper`
pub const WHISPER_USAGE: &str = "/whisper <username> <message>";

const HELP_LINES: [&str; 5] = [
    "Available commands:",
    "/help - Show this help message",
    "/online - Show online users",
    "/quit - Leave the chat",
    "/whisper <username> <message> - Send private message",
];

/// Logical category of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Broadcast chat line
    Chat,
    /// Server notice (welcome, join, leave, listings)
    System,
    /// Whisper, as delivered to its recipient
    Private,
    /// Whisper, as echoed back to its sender
    PrivateSent,
    /// Error reply to the issuing connection
    Error,
}

/// An immutable chat message
///
/// Built once at send time and consumed once by the receiving side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub content: String,
    pub category: Category,
    pub sender: String,
    pub timestamp: DateTime<Local>,
    pub recipient: Option<String>,
}

impl Message {
    fn new(
        category: Category,
        sender: impl Into<String>,
        content: impl Into<String>,
        recipient: Option<String>,
    ) -> Self {
        Self {
            content: content.into(),
            category,
            sender: sender.into(),
            timestamp: Local::now(),
            recipient,
        }
    }

    /// A broadcast chat line from `sender`
    pub fn chat(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Category::Chat, sender, content, None)
    }

    /// A server notice
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Category::System, SERVER_SENDER, content, None)
    }

    /// An error reply
    pub fn error(content: impl Into<String>) -> Self {
        Self::new(Category::Error, SERVER_SENDER, content, None)
    }

    /// A whisper as the recipient sees it
    pub fn private(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(Category::Private, sender, content, Some(recipient.into()))
    }

    /// The confirmation echoed to the sender of a whisper
    pub fn private_sent(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(Category::PrivateSent, sender, content, Some(recipient.into()))
    }

    pub fn prompt() -> Self {
        Self::system("Enter your username:")
    }

    pub fn welcome(username: &str) -> Self {
        Self::system(format!("{WELCOME_PREFIX}{username}{WELCOME_SUFFIX}"))
    }

    pub fn joined(username: &str) -> Self {
        Self::system(format!("{username} has joined the chat!"))
    }

    pub fn left(username: &str) -> Self {
        Self::system(format!("{username} has left the chat."))
    }

    pub fn goodbye() -> Self {
        Self::system("Goodbye!")
    }

    pub fn shutting_down() -> Self {
        Self::system("Server is shutting down.")
    }

    /// `Users online: a, b, c` for an already sorted list
    pub fn online(usernames: &[String]) -> Self {
        Self::system(format!("Users online: {}", usernames.join(", ")))
    }

    /// The server command listing, one message per line
    pub fn help() -> Vec<Self> {
        HELP_LINES.iter().map(|line| Self::system(*line)).collect()
    }

    /// Username announced by a welcome notice, if this is one
    pub fn welcomed_username(&self) -> Option<&str> {
        if self.category != Category::System {
            return None;
        }
        self.content
            .strip_prefix(WELCOME_PREFIX)?
            .strip_suffix(WELCOME_SUFFIX)
    }

    /// Encode into a single wire line (without the trailing newline)
    pub fn encode(&self) -> String {
        let recipient = self.recipient.as_deref().unwrap_or_default();
        match self.category {
            Category::Chat => format!(
                "[{}] {}: {}",
                self.timestamp.format(TIME_FORMAT),
                self.sender,
                self.content
            ),
            Category::System => self.content.clone(),
            Category::Private => format!("{PM_FROM_PREFIX}{}] {}", self.sender, self.content),
            Category::PrivateSent => format!("{PM_TO_PREFIX}{}] {}", recipient, self.content),
            Category::Error => format!("{ERROR_PREFIX}{}", self.content),
        }
    }

    /// Decode a wire line received by the participant named `me`
    ///
    /// Never fails: lines that match no other shape are system notices.
    pub fn decode(line: &str, me: &str) -> Self {
        if let Some((sender, content)) = split_tag(line, PM_FROM_PREFIX) {
            return Self::private(sender, me, content);
        }
        if let Some((recipient, content)) = split_tag(line, PM_TO_PREFIX) {
            return Self::private_sent(me, recipient, content);
        }
        if let Some(content) = line.strip_prefix(ERROR_PREFIX) {
            return Self::error(content);
        }
        if let Some((time, sender, content)) = split_chat(line) {
            let mut msg = Self::chat(sender, content);
            let stamped = Local
                .from_local_datetime(&msg.timestamp.date_naive().and_time(time))
                .single();
            if let Some(stamped) = stamped {
                msg.timestamp = stamped;
            }
            return msg;
        }
        Self::system(line)
    }
}

/// Split `<prefix><name>] <content>`
fn split_tag<'a>(line: &'a str, prefix: &str) -> Option<(&'a str, &'a str)> {
    let rest = line.strip_prefix(prefix)?;
    let (name, content) = rest.split_once("] ")?;
    (!name.is_empty()).then_some((name, content))
}

/// Split `[HH:MM:SS] <sender>: <content>`
fn split_chat(line: &str) -> Option<(NaiveTime, &str, &str)> {
    let rest = line.strip_prefix('[')?;
    let (time, rest) = rest.split_once("] ")?;
    let time = NaiveTime::parse_from_str(time, TIME_FORMAT).ok()?;
    let (sender, content) = rest.split_once(": ")?;
    (!sender.is_empty() && !sender.contains(char::is_whitespace)).then_some((time, sender, content))
}

/// Convert a business error into the reply sent to the issuing client
impl From<AppError> for Message {
    fn from(err: AppError) -> Self {
        let content = match &err {
            AppError::NameTaken(name) => {
                format!("Username '{}' is already taken. Try again.", name)
            }
            AppError::InvalidUsername(reason) => {
                format!("Invalid username: {}. Try again.", reason)
            }
            AppError::RecipientNotFound(name) => format!("User {} is not online.", name),
            AppError::MalformedCommand(usage) => format!("Usage: {}", usage),
            AppError::UnknownCommand(token) => format!(
                "Unknown command '{}'. Type /help for available commands.",
                token
            ),
            AppError::FrameTooLong => {
                format!("Message too long (max {} bytes).", MAX_FRAME_LEN)
            }
            // Fatal errors are not typically converted (connection closes)
            _ => "Internal error".to_string(),
        };
        Message::error(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_encoding() {
        let msg = Message::chat("alice", "hello");
        let line = msg.encode();
        let expected_time = msg.timestamp.format("%H:%M:%S").to_string();
        assert_eq!(line, format!("[{}] alice: hello", expected_time));
    }

    #[test]
    fn test_private_encoding() {
        let msg = Message::private("bob", "carol", "hi there");
        assert_eq!(msg.encode(), "[PM from bob] hi there");

        let echo = Message::private_sent("bob", "carol", "hi there");
        assert_eq!(echo.encode(), "[PM to carol] hi there");
    }

    #[test]
    fn test_decode_chat_keeps_content_verbatim() {
        let msg = Message::decode("[09:15:00] alice: note: this has colons", "bob");
        assert_eq!(msg.category, Category::Chat);
        assert_eq!(msg.sender, "alice");
        assert_eq!(msg.content, "note: this has colons");
        assert_eq!(msg.timestamp.format("%H:%M:%S").to_string(), "09:15:00");
    }

    #[test]
    fn test_decode_private_and_echo() {
        let incoming = Message::decode("[PM from bob] hi", "carol");
        assert_eq!(incoming.category, Category::Private);
        assert_eq!(incoming.sender, "bob");
        assert_eq!(incoming.recipient.as_deref(), Some("carol"));
        assert_eq!(incoming.content, "hi");

        let echo = Message::decode("[PM to carol] hi", "bob");
        assert_eq!(echo.category, Category::PrivateSent);
        assert_eq!(echo.sender, "bob");
        assert_eq!(echo.recipient.as_deref(), Some("carol"));
    }

    #[test]
    fn test_decode_error_and_system() {
        let err = Message::decode("Error: User dave is not online.", "bob");
        assert_eq!(err.category, Category::Error);
        assert_eq!(err.content, "User dave is not online.");

        let notice = Message::decode("carol has left the chat.", "bob");
        assert_eq!(notice.category, Category::System);
        assert_eq!(notice.content, "carol has left the chat.");

        // Bracketed text that is not a timestamp stays a notice
        let odd = Message::decode("[not a time] x: y", "bob");
        assert_eq!(odd.category, Category::System);
    }

    #[test]
    fn test_welcome_round_trip() {
        let welcome = Message::welcome("alice");
        let decoded = Message::decode(&welcome.encode(), "");
        assert_eq!(decoded.welcomed_username(), Some("alice"));
        assert_eq!(Message::joined("alice").welcomed_username(), None);
    }

    #[test]
    fn test_online_listing() {
        let names = vec!["alice".to_string(), "bob".to_string()];
        assert_eq!(Message::online(&names).encode(), "Users online: alice, bob");
    }

    #[test]
    fn test_error_conversion() {
        let msg: Message = AppError::UnknownCommand("/dance".to_string()).into();
        assert_eq!(msg.category, Category::Error);
        assert!(msg.encode().starts_with("Error: Unknown command '/dance'"));

        let msg: Message = AppError::MalformedCommand(WHISPER_USAGE).into();
        assert_eq!(msg.encode(), "Error: Usage: /whisper <username> <message>");

        let msg: Message = AppError::RecipientNotFound("dave".to_string()).into();
        assert_eq!(msg.encode(), "Error: User dave is not online.");
    }
}
