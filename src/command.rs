//! Server command parsing
//!
//! Lines starting with `/` are commands. The first whitespace-delimited
//! token selects the command (case-insensitive); arguments keep their case.

use crate::error::AppError;
use crate::message::WHISPER_USAGE;

/// Server-side commands, each carrying its parsed arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Leave the chat
    Quit,
    /// List registered usernames
    Online,
    /// Show the command listing
    Help,
    /// Private message to one user
    Whisper { recipient: String, text: String },
}

impl Command {
    /// Whether a raw line should be treated as a command
    pub fn is_command(line: &str) -> bool {
        line.trim_start().starts_with('/')
    }

    /// Parse a command line
    ///
    /// Extra arguments to argument-less commands are ignored. Whisper text
    /// is kept verbatim apart from its leading whitespace.
    pub fn parse(line: &str) -> Result<Self, AppError> {
        let line = line.trim_start();
        let (token, args) = match line.split_once(char::is_whitespace) {
            Some((token, args)) => (token, args.trim_start()),
            None => (line, ""),
        };

        match token.to_lowercase().as_str() {
            "/quit" => Ok(Command::Quit),
            "/online" => Ok(Command::Online),
            "/help" => Ok(Command::Help),
            "/whisper" => parse_whisper(args),
            _ => Err(AppError::UnknownCommand(token.to_string())),
        }
    }
}

/// `<username> <message...>`
fn parse_whisper(args: &str) -> Result<Command, AppError> {
    let (recipient, text) = args
        .split_once(char::is_whitespace)
        .ok_or(AppError::MalformedCommand(WHISPER_USAGE))?;
    let text = text.trim_start();
    if recipient.is_empty() || text.is_empty() {
        return Err(AppError::MalformedCommand(WHISPER_USAGE));
    }
    Ok(Command::Whisper {
        recipient: recipient.to_string(),
        text: text.to_string(),
    })
}
