//! Minitel Chat - a chat console on a Minitel videotex terminal
//!
//! Drives the terminal over a serial port (or this console with
//! `--simulate`) and forwards typed lines to a chat-completion service.

use clap::Parser;
use minitel_core::cli::{app, logging, Cli, CliResult, ExitCodes};
use minitel_core::i18n::set_locale;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.debug, cli.log_file.as_deref());
    set_locale(cli.lang.locale());

    tracing::info!("Starting minitel-chat v{}", env!("CARGO_PKG_VERSION"));

    let interrupt = CancellationToken::new();
    let handler_token = interrupt.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        tracing::warn!("Ctrl+C handler not installed: {}", e);
    }

    let result = match app::run(&cli, interrupt).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("{:#}", e);
            CliResult::error(ExitCodes::ERROR, format!("{e:#}"))
        }
    };

    match (&result, result.message()) {
        (CliResult::Success(_), Some(msg)) => println!("{msg}"),
        (CliResult::Error(..), Some(msg)) => eprintln!("{msg}"),
        _ => {}
    }
    result.to_exit_code()
}
