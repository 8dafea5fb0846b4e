//! Command-line arguments

use crate::core::codec::TextEncoding;
use crate::i18n::Locale;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Interface language
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Language {
    /// English
    En,
    /// French
    Fr,
}

impl Language {
    /// Locale for this language
    pub fn locale(self) -> Locale {
        match self {
            Self::En => Locale::English,
            Self::Fr => Locale::French,
        }
    }
}

/// Terminal charset
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Charset {
    /// ISO-8859-1, accented letters included
    Latin1,
    /// 7-bit ASCII, accented letters become `?`
    Ascii,
}

impl Charset {
    /// Codec for this charset
    pub fn encoding(self) -> TextEncoding {
        match self {
            Self::Latin1 => TextEncoding::Latin1,
            Self::Ascii => TextEncoding::Ascii,
        }
    }
}

/// Minitel chat console
#[derive(Parser, Debug)]
#[command(
    name = "minitel-chat",
    version,
    about = "Chat with a language model from a Minitel plugged into a serial port",
    long_about = None
)]
pub struct Cli {
    /// Use this console instead of a serial Minitel
    #[arg(long)]
    pub simulate: bool,

    /// Serial port to use (e.g. /dev/cu.usbserial-1234), skips the port prompt
    #[arg(long, value_name = "PORT")]
    pub port: Option<String>,

    /// Trace every received byte
    #[arg(long)]
    pub debug: bool,

    /// Show answers only once complete
    #[arg(long)]
    pub no_stream: bool,

    /// Directory holding config.json, history.json and system_profile.txt
    #[arg(long, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Chat service API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Chat service base URL
    #[arg(long, env = "OPENAI_BASE_URL", value_name = "URL")]
    pub base_url: Option<String>,

    /// Terminal charset, overrides the stored one for this run
    #[arg(long, value_enum)]
    pub charset: Option<Charset>,

    /// Interface language
    #[arg(long, value_enum, default_value_t = Language::En)]
    pub lang: Language,

    /// Also write logs to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// List serial ports and exit
    #[arg(long)]
    pub list_ports: bool,

    /// Print the exit code table and exit
    #[arg(long)]
    pub exit_codes: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["minitel-chat"]).unwrap();
        assert!(!cli.simulate);
        assert!(!cli.no_stream);
        assert_eq!(cli.port, None);
        assert_eq!(cli.lang, Language::En);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "minitel-chat",
            "--port",
            "/dev/cu.usbserial-1234",
            "--debug",
            "--no-stream",
            "--lang",
            "fr",
            "--config-dir",
            "/tmp/minitel",
        ])
        .unwrap();
        assert_eq!(cli.port.as_deref(), Some("/dev/cu.usbserial-1234"));
        assert!(cli.debug);
        assert!(cli.no_stream);
        assert_eq!(cli.lang.locale(), Locale::French);
        assert_eq!(cli.config_dir, Some(PathBuf::from("/tmp/minitel")));
    }

    #[test]
    fn test_charset_flag() {
        let cli = Cli::try_parse_from(["minitel-chat", "--charset", "ascii"]).unwrap();
        assert_eq!(cli.charset.map(Charset::encoding), Some(TextEncoding::Ascii));
        assert_eq!(Cli::try_parse_from(["minitel-chat"]).unwrap().charset, None);
        assert!(Cli::try_parse_from(["minitel-chat", "--charset", "utf8"]).is_err());
    }

    #[test]
    fn test_rejects_unknown_language() {
        assert!(Cli::try_parse_from(["minitel-chat", "--lang", "hu"]).is_err());
    }
}
