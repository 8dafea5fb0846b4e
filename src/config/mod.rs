//! Configuration module
//!
//! Handles defaults, the session configuration file, conversation history
//! and the system prompt

mod history;
mod settings;

pub use history::HistoryStore;
pub use settings::{load_system_prompt, ConfigStore, Defaults, SessionConfig, DEFAULTS};

use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Session configuration file name
pub const CONFIG_FILE: &str = "config.json";
/// History file name
pub const HISTORY_FILE: &str = "history.json";
/// System prompt override file name
pub const SYSTEM_PROFILE_FILE: &str = "system_profile.txt";

/// Persistence errors
#[derive(Error, Debug)]
pub enum PersistError {
    /// File could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File content is not valid JSON for the expected shape
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("org", "minitel", "minitel-chat")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the application data directory (log files)
pub fn data_dir() -> Option<PathBuf> {
    ProjectDirs::from("org", "minitel", "minitel-chat")
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Directory holding the session files
///
/// An explicit override wins; without a platform directory the current
/// directory is used.
pub fn resolve_config_dir(override_dir: Option<&Path>) -> PathBuf {
    override_dir
        .map(Path::to_path_buf)
        .or_else(config_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Paths of every session file under one directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    /// `config.json`
    pub config: PathBuf,
    /// `history.json`
    pub history: PathBuf,
    /// `system_profile.txt`
    pub system_profile: PathBuf,
}

impl SessionPaths {
    /// Session files under `dir`
    pub fn new(dir: &Path) -> Self {
        Self {
            config: dir.join(CONFIG_FILE),
            history: dir.join(HISTORY_FILE),
            system_profile: dir.join(SYSTEM_PROFILE_FILE),
        }
    }
}

/// Create the configuration directory
pub fn init_directory(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins() {
        let dir = resolve_config_dir(Some(Path::new("/tmp/minitel-test")));
        assert_eq!(dir, PathBuf::from("/tmp/minitel-test"));
    }

    #[test]
    fn test_session_paths() {
        let paths = SessionPaths::new(Path::new("/cfg"));
        assert_eq!(paths.config, PathBuf::from("/cfg/config.json"));
        assert_eq!(paths.history, PathBuf::from("/cfg/history.json"));
        assert_eq!(paths.system_profile, PathBuf::from("/cfg/system_profile.txt"));
    }
}
