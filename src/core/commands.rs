//! Slash commands typed at the terminal prompt
//!
//! Commands are handled locally and never reach the chat service.

/// Largest inter-line delay `/throttle` accepts, in milliseconds
pub const MAX_THROTTLE_MS: u64 = 5_000;

/// A parsed shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    /// Show the command list
    Help,
    /// Clear the screen
    Clear,
    /// Leave the program
    Quit,
    /// Leave the shell and probe the link again
    Reset,
    /// Show (`None`) or change the chat model
    Model(Option<String>),
    /// Toggle receive tracing
    Debug,
    /// Forget the conversation
    HistoryReset,
    /// Toggle pagination pauses
    NoPage,
    /// Show (`None`) or change the inter-line delay in milliseconds
    Throttle(Option<u64>),
    /// `/throttle` with an argument that is not a number up to [`MAX_THROTTLE_MS`]
    ThrottleUsage,
    /// Anything else starting with `/`
    Unknown(String),
}

/// Parse a prompt line
///
/// Returns `None` for text that should go to the chat service. The command
/// name is case-insensitive; everything after the first space is the
/// argument.
pub fn parse_command(input: &str) -> Option<ShellCommand> {
    let input = input.trim();
    let body = input.strip_prefix('/')?;

    let mut parts = body.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default().to_lowercase();
    let argument = parts.next().map(str::trim).filter(|s| !s.is_empty());

    let command = match name.as_str() {
        "help" => ShellCommand::Help,
        "clear" => ShellCommand::Clear,
        "quit" | "exit" => ShellCommand::Quit,
        "reset" => ShellCommand::Reset,
        "model" => ShellCommand::Model(argument.map(str::to_string)),
        "debug" => ShellCommand::Debug,
        "history_reset" => ShellCommand::HistoryReset,
        "nopage" => ShellCommand::NoPage,
        "throttle" => match argument {
            None => ShellCommand::Throttle(None),
            Some(arg) => match arg.parse::<u64>() {
                Ok(ms) if ms <= MAX_THROTTLE_MS => ShellCommand::Throttle(Some(ms)),
                _ => ShellCommand::ThrottleUsage,
            },
        },
        _ => ShellCommand::Unknown(format!("/{name}")),
    };
    Some(command)
}
