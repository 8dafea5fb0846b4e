//! CLI Exit Codes
//!
//! Process exit codes, so wrapper scripts can tell why the session ended.

use std::process::ExitCode;

/// Exit code constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Success
    pub const SUCCESS: u8 = 0;

    /// General error
    pub const ERROR: u8 = 1;

    /// Serial link could not be opened
    pub const CONNECTION_FAILED: u8 = 3;

    /// Chat service credentials missing or rejected
    pub const AUTH_FAILED: u8 = 5;

    /// User cancelled
    pub const CANCELLED: u8 = 11;

    /// Link lost during the session and not recovered
    pub const LINK_LOST: u8 = 18;
}

/// CLI operation result
#[derive(Debug)]
pub enum CliResult {
    /// Success with optional message
    Success(Option<String>),

    /// Error with code and message
    Error(u8, String),
}

impl CliResult {
    /// Plain success
    pub fn success() -> Self {
        Self::Success(None)
    }

    /// Success with a closing message
    pub fn success_with_message(msg: impl Into<String>) -> Self {
        Self::Success(Some(msg.into()))
    }

    /// Failure with an explicit code
    pub fn error(code: u8, msg: impl Into<String>) -> Self {
        Self::Error(code, msg.into())
    }

    /// Serial link could not be opened
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::CONNECTION_FAILED, msg.into())
    }

    /// Chat credentials problem
    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::AUTH_FAILED, msg.into())
    }

    /// Interrupted by the operator
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::CANCELLED, msg.into())
    }

    /// Link lost mid-session
    pub fn link_lost(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::LINK_LOST, msg.into())
    }

    /// Get exit code
    pub fn code(&self) -> u8 {
        match self {
            Self::Success(_) => ExitCodes::SUCCESS,
            Self::Error(code, _) => *code,
        }
    }

    /// Get message
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(Some(msg)) | Self::Error(_, msg) => Some(msg),
            Self::Success(None) => None,
        }
    }

    /// Convert to ExitCode
    pub fn to_exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Is success?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Every code the program can exit with
const ALL_CODES: [u8; 6] = [
    ExitCodes::SUCCESS,
    ExitCodes::ERROR,
    ExitCodes::CONNECTION_FAILED,
    ExitCodes::AUTH_FAILED,
    ExitCodes::CANCELLED,
    ExitCodes::LINK_LOST,
];

/// Exit code description
pub fn exit_code_description(code: u8) -> &'static str {
    match code {
        0 => "Success",
        1 => "General error",
        3 => "Serial link could not be opened",
        5 => "Chat service credentials missing",
        11 => "Operation cancelled",
        18 => "Link lost",
        _ => "Unknown error",
    }
}

/// Print exit code table
pub fn print_exit_codes() {
    println!("Exit Codes:");
    for code in ALL_CODES {
        println!("  {:>3}  {}", code, exit_code_description(code));
    }
}
