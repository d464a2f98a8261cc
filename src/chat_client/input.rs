//! Classification of typed lines
//!
//! Local commands and server commands are two disjoint sets: a local
//! command is handled in the client and never sent upstream.

use std::path::PathBuf;

/// Commands handled entirely by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalCommand {
    Clear,
    History,
    Version,
    Preferences,
    Status,
    Theme(Option<String>),
    Export(Option<PathBuf>),
    Filter(Option<String>),
}

impl LocalCommand {
    /// Parse a `/`-prefixed line; `None` if it is not a local command
    pub fn parse(line: &str) -> Option<Self> {
        let (token, args) = match line.split_once(char::is_whitespace) {
            Some((token, args)) => (token, args.trim()),
            None => (line, ""),
        };
        let first_arg = args.split_whitespace().next().map(str::to_string);

        let cmd = match token.to_lowercase().as_str() {
            "/clear" => LocalCommand::Clear,
            "/history" => LocalCommand::History,
            "/version" => LocalCommand::Version,
            "/preferences" => LocalCommand::Preferences,
            "/status" => LocalCommand::Status,
            "/theme" => LocalCommand::Theme(first_arg),
            "/export" => LocalCommand::Export(first_arg.map(PathBuf::from)),
            "/filter" => LocalCommand::Filter((!args.is_empty()).then(|| args.to_string())),
            _ => return None,
        };
        Some(cmd)
    }
}

/// What to do with one line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Blank line
    Empty,
    /// `bye`, `quit` or `/quit` in any case
    Quit,
    /// Handled locally
    Local(LocalCommand),
    /// Sent to the server as-is (chat text or a server command)
    Upstream(String),
}

impl Input {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Input::Empty;
        }

        let first = line.split_whitespace().next().unwrap_or_default();
        if line.eq_ignore_ascii_case("bye")
            || line.eq_ignore_ascii_case("quit")
            || first.eq_ignore_ascii_case("/quit")
        {
            return Input::Quit;
        }

        if line.starts_with('/') {
            if let Some(cmd) = LocalCommand::parse(line) {
                return Input::Local(cmd);
            }
        }

        Input::Upstream(line.to_string())
    }
}
