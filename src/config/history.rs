//! Conversation history capped by turns and characters

use super::settings::{read_json, write_json};
use super::PersistError;
use crate::chat::ChatMessage;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// `history.json`
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    max_turns: usize,
    max_chars: usize,
    messages: Vec<ChatMessage>,
}

impl HistoryStore {
    /// Load `path`, starting empty when it is missing or unreadable
    pub fn load(path: impl Into<PathBuf>, max_turns: usize, max_chars: usize) -> Self {
        let path = path.into();
        let messages = match read_json::<Vec<ChatMessage>>(&path) {
            Ok(messages) => messages.unwrap_or_default(),
            Err(e) => {
                warn!("ignoring history {}: {}", path.display(), e);
                Vec::new()
            }
        };
        let mut store = Self {
            path,
            max_turns,
            max_chars,
            messages,
        };
        store.trim();
        debug!("history: {} message(s)", store.messages.len());
        store
    }

    /// File backing this store
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Messages, oldest first
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the history is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Total characters held
    pub fn total_chars(&self) -> usize {
        self.messages.iter().map(|m| m.content.chars().count()).sum()
    }

    /// Append a message, evicting old ones to stay within the caps
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.trim();
    }

    /// Write the history back
    pub fn save(&mut self) -> Result<(), PersistError> {
        self.trim();
        write_json(&self.path, &self.messages)
    }

    /// Forget everything and delete the file
    pub fn reset(&mut self) -> Result<(), PersistError> {
        self.messages.clear();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn trim(&mut self) {
        let max_messages = self.max_turns.saturating_mul(2);
        let excess = self.messages.len().saturating_sub(max_messages);
        self.messages.drain(..excess);

        let mut total = self.total_chars();
        let mut evict = 0;
        while total > self.max_chars && evict < self.messages.len() {
            total -= self.messages[evict].content.chars().count();
            evict += 1;
        }
        self.messages.drain(..evict);
    }
}
