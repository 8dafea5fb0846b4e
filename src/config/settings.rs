//! Session settings and their JSON store

use super::PersistError;
use crate::core::codec::TextEncoding;
use crate::core::transport::{LinkSettings, SerialConfig, SerialParity};
use crate::i18n::t;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Built-in defaults, merged under whatever the config file provides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Defaults {
    /// Chat model
    pub model: &'static str,
    /// Terminal width
    pub columns: usize,
    /// Lines between pagination pauses
    pub page_lines: usize,
    /// Delay after each written line
    pub line_delay_ms: u64,
    /// Delay after each written byte
    pub char_delay_ms: u64,
    /// History cap in user/assistant turns
    pub max_history_turns: usize,
    /// History cap in characters
    pub max_history_chars: usize,
    /// How long the prompt waits for a line
    pub read_line_timeout: Duration,
    /// How long a pagination pause waits for a key
    pub keypress_timeout: Duration,
    /// How long each probe candidate waits for a confirmation
    pub probe_window: Duration,
}

/// Immutable defaults
pub const DEFAULTS: Defaults = Defaults {
    model: "gpt-4o-mini",
    columns: 40,
    page_lines: 18,
    line_delay_ms: 80,
    char_delay_ms: 0,
    max_history_turns: 20,
    max_history_chars: 16000,
    read_line_timeout: Duration::from_secs(3600),
    keypress_timeout: Duration::from_secs(300),
    probe_window: Duration::from_secs(6),
};

/// Speed assumed for a port given on the command line without a stored one
const FALLBACK_BAUD: u32 = 1200;

/// Persisted session configuration
///
/// Every field is optional so a partial file stays valid; unknown keys are
/// kept and written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Serial port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// Baud rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baud: Option<u32>,
    /// Data bits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytesize: Option<u8>,
    /// Parity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parity: Option<SerialParity>,
    /// Stop bits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopbits: Option<u8>,
    /// Chat model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Lines between pagination pauses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_lines: Option<usize>,
    /// Delay after each written line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_delay_ms: Option<u64>,
    /// Delay after each written byte
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_delay_ms: Option<u64>,
    /// Terminal charset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<TextEncoding>,
    /// Keys this version does not know about
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl SessionConfig {
    /// Resolved serial link, if a port and speed are known
    pub fn serial_config(&self) -> Option<SerialConfig> {
        let port = self.port.as_deref()?;
        let baud = self.baud?;
        Some(self.framed(port, baud))
    }

    /// Serial link on an explicitly chosen port
    ///
    /// Stored framing applies; anything missing falls back to 1200 7E1.
    pub fn serial_config_on(&self, port: &str) -> SerialConfig {
        self.framed(port, self.baud.unwrap_or(FALLBACK_BAUD))
    }

    fn framed(&self, port: &str, baud: u32) -> SerialConfig {
        let defaults = SerialConfig::new(port, baud);
        defaults
            .clone()
            .data_bits(self.bytesize.unwrap_or(defaults.data_bits))
            .parity(self.parity.unwrap_or(defaults.parity))
            .stop_bits(self.stopbits.unwrap_or(defaults.stop_bits))
    }

    /// Record a resolved serial link
    pub fn set_serial_config(&mut self, config: &SerialConfig) {
        self.port = Some(config.port.clone());
        self.baud = Some(config.baud_rate);
        self.bytesize = Some(config.data_bits);
        self.parity = Some(config.parity);
        self.stopbits = Some(config.stop_bits);
    }

    /// Forget the serial link so the next start probes again
    pub fn clear_serial_config(&mut self) {
        self.port = None;
        self.baud = None;
        self.bytesize = None;
        self.parity = None;
        self.stopbits = None;
    }

    /// Chat model
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULTS.model)
    }

    /// Lines between pagination pauses
    pub fn page_lines(&self) -> usize {
        self.page_lines.unwrap_or(DEFAULTS.page_lines)
    }

    /// Delay after each written line, in milliseconds
    pub fn line_delay_ms(&self) -> u64 {
        self.line_delay_ms.unwrap_or(DEFAULTS.line_delay_ms)
    }

    /// Delay after each written byte, in milliseconds
    pub fn char_delay_ms(&self) -> u64 {
        self.char_delay_ms.unwrap_or(DEFAULTS.char_delay_ms)
    }

    /// Terminal charset, Latin-1 unless configured
    pub fn charset(&self) -> TextEncoding {
        self.charset.unwrap_or_default()
    }

    /// Transport pacing and charset derived from this configuration
    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings::default()
            .line_delay(Duration::from_millis(self.line_delay_ms()))
            .char_delay(Duration::from_millis(self.char_delay_ms()))
            .encoding(self.charset())
    }
}

/// `config.json` next to the other session files
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    config: SessionConfig,
}

impl ConfigStore {
    /// Load `path`, falling back to defaults when it is missing or unreadable
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let config = match read_json::<SessionConfig>(&path) {
            Ok(Some(config)) => config,
            Ok(None) => {
                debug!("no config at {}", path.display());
                SessionConfig::default()
            }
            Err(e) => {
                warn!("ignoring config {}: {}", path.display(), e);
                SessionConfig::default()
            }
        };
        Self { path, config }
    }

    /// File backing this store
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Mutable configuration, call [`ConfigStore::save`] to persist
    pub fn config_mut(&mut self) -> &mut SessionConfig {
        &mut self.config
    }

    /// Write the configuration back
    pub fn save(&self) -> Result<(), PersistError> {
        write_json(&self.path, &self.config)
    }
}

/// Read JSON from `path`, `Ok(None)` if the file does not exist
pub(crate) fn read_json<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<Option<T>, PersistError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&content)?))
}

/// Write pretty JSON to `path`, creating the parent directory
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// System prompt: `system_profile.txt` when present and non-empty
pub fn load_system_prompt(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) if !content.trim().is_empty() => {
            debug!("system prompt from {}", path.display());
            content.trim().to_string()
        }
        Ok(_) => t("session.default_system_prompt"),
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("cannot read {}: {}", path.display(), e);
            }
            t("session.default_system_prompt")
        }
    }
}
