//! CLI Module
//!
//! Provides command-line interface functionality including:
//! - Argument parsing
//! - Exit codes for automation
//! - Host console dialogue for the link setup wizard
//! - Logging setup and the process lifecycle

pub mod app;
pub mod args;
pub mod exit_codes;
pub mod logging;
pub mod operator;
pub mod prompt;

pub use args::{Charset, Cli, Language};
pub use exit_codes::{exit_code_description, print_exit_codes, CliResult, ExitCodes};
pub use operator::ConsoleOperator;
pub use prompt::StdinLineReader;
