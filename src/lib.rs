//! # Minitel Chat Core Library
//!
//! Turns a Minitel videotex terminal on a serial line into a console for a
//! chat-completion service:
//! - Serial, console and scripted terminal transports
//! - Line discipline with echo and destructive erase
//! - Streaming word-wrap formatter with pagination
//! - Automatic discovery of the terminal's serial framing
//! - Interactive shell with local slash commands
//! - OpenAI-compatible chat client with streaming and retry
//! - Internationalization (i18n)
//!
//! ## Example
//!
//! ```rust,no_run
//! use minitel_core::chat::OpenAiClient;
//! use minitel_core::config::{ConfigStore, HistoryStore};
//! use minitel_core::core::session::Shell;
//! use minitel_core::core::transport::{ConsoleTransport, LinkSettings, TerminalTransport};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let chat = OpenAiClient::new(std::env::var("OPENAI_API_KEY")?)?;
//!     let mut config = ConfigStore::load("config.json");
//!     let mut history = HistoryStore::load("history.json", 20, 16_000);
//!     let interrupt = CancellationToken::new();
//!
//!     let mut term = ConsoleTransport::new(LinkSettings::default(), interrupt.clone());
//!     term.open().await?;
//!     let exit = Shell::new(&mut term, &chat, &mut config, &mut history, interrupt)
//!         .run()
//!         .await;
//!     println!("{exit:?}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Initialize i18n - load translations from i18n folder (TOML)
rust_i18n::i18n!("i18n", fallback = "en");

pub mod chat;
pub mod cli;
pub mod config;
pub mod core;
pub mod i18n;

// Re-exports for convenience
pub use crate::chat::{ChatError, ChatMessage, ChatService, OpenAiClient, Role};
pub use crate::cli::{CliResult, ExitCodes};
pub use crate::config::{ConfigStore, HistoryStore, SessionConfig, DEFAULTS};
pub use crate::core::format::Formatter;
pub use crate::core::probe::{LinkProber, ProbeOperator, LINK_CANDIDATES};
pub use crate::core::session::{Shell, ShellExit};
pub use crate::core::transport::{
    ConsoleTransport, LinkSettings, ScriptedTransport, SerialConfig, SerialParity,
    SerialTransport, TerminalTransport, TransportError, TransportType,
};
pub use crate::i18n::{get_locale, set_locale, t, Locale};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
