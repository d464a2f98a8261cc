//! Bounded message history

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::message::Message;

/// How many entries `/history` and `/filter` show
pub const HISTORY_VIEW_LEN: usize = 20;

/// Keeps the most recent `capacity` messages, oldest first
#[derive(Debug)]
pub struct History {
    entries: VecDeque<Message>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, msg: Message) {
        self.entries.push_back(msg);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The last `n` messages, oldest first
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &Message> {
        self.entries.iter().skip(self.entries.len().saturating_sub(n))
    }

    /// The last `HISTORY_VIEW_LEN` messages whose content contains `needle`
    /// (case-insensitive)
    pub fn filter(&self, needle: &str) -> Vec<&Message> {
        let needle = needle.to_lowercase();
        let matches: Vec<&Message> = self
            .entries
            .iter()
            .filter(|msg| msg.content.to_lowercase().contains(&needle))
            .collect();
        let skip = matches.len().saturating_sub(HISTORY_VIEW_LEN);
        matches.into_iter().skip(skip).collect()
    }

    /// Write every entry as `[YYYY-mm-dd HH:MM:SS] sender: content`
    pub fn export(&self, path: &Path) -> std::io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        for msg in &self.entries {
            writeln!(
                out,
                "[{}] {}: {}",
                msg.timestamp.format("%Y-%m-%d %H:%M:%S"),
                msg.sender,
                msg.content
            )?;
        }
        out.flush()
    }
}

/// `chat_history_<YYYYmmdd_HHMMSS>.txt` in the working directory
pub fn default_export_path() -> PathBuf {
    PathBuf::from(format!(
        "chat_history_{}.txt",
        Local::now().format("%Y%m%d_%H%M%S")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_drops_oldest() {
        let mut history = History::new(3);
        for i in 0..5 {
            history.push(Message::system(format!("m{}", i)));
        }
        let contents: Vec<&str> = history.recent(10).map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_recent_takes_tail() {
        let mut history = History::new(100);
        for i in 0..30 {
            history.push(Message::system(format!("m{}", i)));
        }
        let recent: Vec<&Message> = history.recent(HISTORY_VIEW_LEN).collect();
        assert_eq!(recent.len(), HISTORY_VIEW_LEN);
        assert_eq!(recent[0].content, "m10");
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let mut history = History::new(10);
        history.push(Message::chat("alice", "Good Morning"));
        history.push(Message::chat("bob", "evening"));
        history.push(Message::chat("carol", "morning!"));

        let found: Vec<&str> = history
            .filter("MORNING")
            .iter()
            .map(|m| m.sender.as_str())
            .collect();
        assert_eq!(found, vec!["alice", "carol"]);
        assert!(history.filter("night").is_empty());
    }

    #[test]
    fn test_export_writes_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.txt");

        let mut history = History::new(10);
        history.push(Message::chat("alice", "hello"));
        history.push(Message::system("bob has joined the chat!"));
        history.export(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("] alice: hello"));
        assert!(lines[1].ends_with("] server: bob has joined the chat!"));
    }
}
