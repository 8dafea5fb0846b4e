//! Process lifecycle
//!
//! Configure the link (stored, forced with `--port`, or probed), open it,
//! run the shell, and start over when the shell asks for reconfiguration.

use super::args::Cli;
use super::exit_codes::{print_exit_codes, CliResult};
use super::operator::ConsoleOperator;
use super::prompt::StdinLineReader;
use crate::chat::{ChatError, ChatService, OpenAiClient};
use crate::config::{
    init_directory, load_system_prompt, resolve_config_dir, ConfigStore, HistoryStore,
    SessionConfig, SessionPaths, DEFAULTS,
};
use crate::core::probe::{LinkProber, ProbeError};
use crate::core::session::{Shell, ShellExit};
use crate::core::transport::{
    list_ports, ConsoleTransport, LinkSettings, SerialConfig, SerialTransport, TerminalTransport,
};
use crate::i18n::t;
use anyhow::Context;
use std::io::Stdout;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Everything one shell run needs besides the transport
struct SessionContext<'a> {
    chat: &'a dyn ChatService,
    config: ConfigStore,
    history: HistoryStore,
    system_prompt: String,
    streaming: bool,
    interrupt: CancellationToken,
}

impl SessionContext<'_> {
    async fn shell<T: TerminalTransport + ?Sized>(&mut self, term: &mut T) -> ShellExit {
        let exit = Shell::new(
            term,
            self.chat,
            &mut self.config,
            &mut self.history,
            self.interrupt.clone(),
        )
        .streaming(self.streaming)
        .system_prompt(self.system_prompt.as_str())
        .run()
        .await;

        if let Err(e) = self.history.save() {
            warn!("history not saved to {}: {}", self.history.path().display(), e);
        }
        exit
    }

    fn save_config(&self) {
        if let Err(e) = self.config.save() {
            warn!("config not saved to {}: {}", self.config.path().display(), e);
        }
    }

    fn forget_link(&mut self) {
        self.config.config_mut().clear_serial_config();
        self.save_config();
    }
}

/// How the link for the next session was settled
enum LinkChoice {
    Use(SerialConfig),
    Abandoned,
    Interrupted,
}

/// Link settings for this run: stored pacing and charset, command-line overrides
fn link_settings(cli: &Cli, config: &SessionConfig) -> LinkSettings {
    let settings = config.link_settings().trace_rx(cli.debug);
    match cli.charset {
        Some(charset) => settings.encoding(charset.encoding()),
        None => settings,
    }
}

fn chat_client(cli: &Cli) -> Result<OpenAiClient, ChatError> {
    let client = OpenAiClient::new(cli.api_key.clone().unwrap_or_default())?;
    Ok(match &cli.base_url {
        Some(url) => client.base_url(url.as_str()),
        None => client,
    })
}

/// Run the program to completion
pub async fn run(cli: &Cli, interrupt: CancellationToken) -> anyhow::Result<CliResult> {
    if cli.exit_codes {
        print_exit_codes();
        return Ok(CliResult::success());
    }
    if cli.list_ports {
        for port in list_ports()? {
            println!("{port}");
        }
        return Ok(CliResult::success());
    }

    let dir = resolve_config_dir(cli.config_dir.as_deref());
    init_directory(&dir).with_context(|| format!("cannot create {}", dir.display()))?;
    let paths = SessionPaths::new(&dir);
    info!("session files in {}", dir.display());

    let chat = match chat_client(cli) {
        Ok(chat) => chat,
        Err(e) => {
            eprintln!("{}", t("cli.missing_api_key"));
            return Ok(CliResult::auth_failed(e.to_string()));
        }
    };

    let mut session = SessionContext {
        chat: &chat,
        config: ConfigStore::load(&paths.config),
        history: HistoryStore::load(
            &paths.history,
            DEFAULTS.max_history_turns,
            DEFAULTS.max_history_chars,
        ),
        system_prompt: load_system_prompt(&paths.system_profile),
        streaming: !cli.no_stream,
        interrupt: interrupt.clone(),
    };

    if cli.simulate {
        simulate(cli, &mut session).await
    } else {
        serial(cli, &mut session).await
    }
}

async fn simulate(cli: &Cli, session: &mut SessionContext<'_>) -> anyhow::Result<CliResult> {
    let rule = "=".repeat(50);
    println!("{rule}");
    println!("{}", t("cli.simulate_banner"));
    println!("{}", t("cli.simulate_hint"));
    println!("{rule}");
    println!();

    let settings = link_settings(cli, session.config.config()).line_delay(Duration::ZERO);
    let mut term = ConsoleTransport::new(settings, session.interrupt.clone());
    term.open().await?;
    let exit = session.shell(&mut term).await;
    term.close().await;

    info!("console session ended: {:?}", exit);
    Ok(CliResult::success_with_message(t("cli.goodbye")))
}

async fn serial(cli: &Cli, session: &mut SessionContext<'_>) -> anyhow::Result<CliResult> {
    let lines = StdinLineReader::spawn().context("cannot read stdin")?;
    let mut operator = ConsoleOperator::new(lines, std::io::stdout(), session.interrupt.clone());

    loop {
        let link = match settle_link(cli, session, &mut operator).await? {
            LinkChoice::Use(link) => link,
            LinkChoice::Abandoned => return Ok(CliResult::cancelled(t("cli.cancelled"))),
            LinkChoice::Interrupted => return Ok(CliResult::cancelled(t("cli.goodbye"))),
        };

        let settings = link_settings(cli, session.config.config());
        let mut term = SerialTransport::new(link.clone(), settings, session.interrupt.clone());
        if let Err(e) = term.open().await {
            if e.is_interrupt() {
                return Ok(CliResult::cancelled(t("cli.goodbye")));
            }
            error!("cannot open {}: {}", link, e);
            eprintln!("{}", rust_i18n::t!("cli.open_failed", port = link.port));
            eprintln!();
            eprintln!("{}", t("cli.available_ports"));
            for port in list_ports().unwrap_or_default() {
                eprintln!("  - {port}");
            }
            eprintln!();
            if operator.confirm(&t("cli.reconfigure_prompt")).await {
                session.forget_link();
                continue;
            }
            return Ok(CliResult::connection_failed(e.to_string()));
        }

        println!(
            "{}",
            rust_i18n::t!("cli.connected", port = link.port, baud = link.baud_rate)
        );
        println!("{}", t("cli.ctrl_c_hint"));

        let exit = session.shell(&mut term).await;
        term.close().await;

        match exit {
            ShellExit::Reconfigure => session.forget_link(),
            ShellExit::Quit | ShellExit::Interrupted => {
                return Ok(CliResult::success_with_message(t("cli.goodbye")));
            }
            ShellExit::LinkLost => return Ok(CliResult::link_lost(t("cli.link_lost"))),
        }
    }
}

/// Pick the link: `--port`, then the stored one, then a probe
async fn settle_link(
    cli: &Cli,
    session: &mut SessionContext<'_>,
    operator: &mut ConsoleOperator<Stdout>,
) -> anyhow::Result<LinkChoice> {
    if session.interrupt.is_cancelled() {
        return Ok(LinkChoice::Interrupted);
    }
    if let Some(port) = &cli.port {
        return Ok(LinkChoice::Use(session.config.config().serial_config_on(port)));
    }
    if let Some(link) = session.config.config().serial_config() {
        return Ok(LinkChoice::Use(link));
    }

    // Probing runs unthrottled; only the charset and tracing carry over.
    let probe_settings = LinkSettings::default()
        .encoding(link_settings(cli, session.config.config()).encoding)
        .trace_rx(cli.debug);
    let token = session.interrupt.clone();
    let factory = move |config: &SerialConfig| {
        Box::new(SerialTransport::new(config.clone(), probe_settings.clone(), token.clone()))
            as Box<dyn TerminalTransport>
    };
    let mut prober =
        LinkProber::new(factory, session.interrupt.clone()).window(DEFAULTS.probe_window);

    match prober.run(operator, list_ports).await {
        Ok(Some(link)) => {
            session.config.config_mut().set_serial_config(&link);
            session.save_config();
            Ok(LinkChoice::Use(link))
        }
        Ok(None) if session.interrupt.is_cancelled() => Ok(LinkChoice::Interrupted),
        Ok(None) => Ok(LinkChoice::Abandoned),
        Err(ProbeError::Interrupted) => Ok(LinkChoice::Interrupted),
        Err(e) => Err(e.into()),
    }
}
