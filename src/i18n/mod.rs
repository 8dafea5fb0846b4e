//! Internationalization (i18n) module
//!
//! Provides multi-language support for everything shown on the terminal
//! and the host console.
//! Currently supports:
//! - English (en)
//! - French (fr)

use parking_lot::RwLock;
use std::sync::LazyLock;

/// Supported locales
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    /// English (default)
    #[default]
    English,
    /// French (Français)
    French,
}

impl Locale {
    /// Get locale code
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::French => "fr",
        }
    }

    /// Get locale display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::English => "English",
            Self::French => "Français",
        }
    }

    /// Parse from string
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_lowercase().as_str() {
            "en" | "en-us" | "en-gb" => Some(Self::English),
            "fr" | "fr-fr" | "fr-be" | "fr-ca" => Some(Self::French),
            _ => None,
        }
    }

    /// Get all available locales
    pub fn available() -> &'static [Self] {
        &[Self::English, Self::French]
    }
}

/// Current locale
static CURRENT_LOCALE: LazyLock<RwLock<Locale>> = LazyLock::new(|| RwLock::new(Locale::English));

/// Get current locale
pub fn get_locale() -> Locale {
    *CURRENT_LOCALE.read()
}

/// Set current locale
pub fn set_locale(locale: Locale) {
    *CURRENT_LOCALE.write() = locale;
    rust_i18n::set_locale(locale.code());
}

/// Translate a key using rust-i18n
///
/// For messages with placeholders, use the `rust_i18n::t!` macro directly.
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_codes() {
        for locale in Locale::available() {
            assert_eq!(Locale::from_code(locale.code()), Some(*locale));
        }
        assert_eq!(Locale::from_code("FR-ca"), Some(Locale::French));
        assert_eq!(Locale::from_code("hu"), None);
    }

    #[test]
    fn test_every_locale_has_the_shell_strings() {
        for key in ["shell.title", "shell.help", "shell.chat_error", "format.more", "probe.test"] {
            for locale in Locale::available() {
                let text = rust_i18n::t!(key, locale = locale.code());
                assert!(!text.ends_with(key), "{key} missing in {}", locale.code());
            }
        }
    }

    #[test]
    fn test_placeholders_are_filled() {
        let text = rust_i18n::t!("shell.throttle_current", locale = "fr", ms = 120);
        assert!(text.contains("120ms"));
    }
}
