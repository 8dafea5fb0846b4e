//! Interactive session on the terminal
//!
//! The shell reads one line at a time. Slash commands are handled locally;
//! anything else is sent to the chat service together with the system
//! prompt and the stored history, and the answer is shown through the
//! formatter. A failed exchange prints one line and the prompt comes back.

use crate::chat::{ChatError, ChatMessage, ChatService};
use crate::config::{ConfigStore, HistoryStore, DEFAULTS};
use crate::core::commands::{parse_command, ShellCommand};
use crate::core::format::Formatter;
use crate::core::transport::{TerminalTransport, TransportError};
use crate::i18n::t;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Why the shell returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellExit {
    /// `/quit`
    Quit,
    /// `/reset`: probe the link again
    Reconfigure,
    /// Ctrl+C
    Interrupted,
    /// The link failed again after one reconnect
    LinkLost,
}

/// Errors that end the current prompt cycle
#[derive(Error, Debug)]
pub enum ShellError {
    /// The transport failed
    #[error("Link failure: {0}")]
    Link(TransportError),

    /// Interrupted by the operator
    #[error("Interrupted")]
    Interrupted,
}

impl From<TransportError> for ShellError {
    fn from(e: TransportError) -> Self {
        if e.is_interrupt() {
            Self::Interrupted
        } else {
            Self::Link(e)
        }
    }
}

enum Flow {
    Continue,
    Exit(ShellExit),
}

/// Session shell
pub struct Shell<'a, T: ?Sized> {
    term: &'a mut T,
    chat: &'a dyn ChatService,
    config: &'a mut ConfigStore,
    history: &'a mut HistoryStore,
    formatter: Formatter,
    streaming: bool,
    system_prompt: String,
    read_timeout: Duration,
    interrupt: CancellationToken,
    /// Set by the first recovery, a session gets one reopen
    reconnected: bool,
}

impl<'a, T> Shell<'a, T>
where
    T: TerminalTransport + ?Sized,
{
    /// Create a shell over an open transport
    pub fn new(
        term: &'a mut T,
        chat: &'a dyn ChatService,
        config: &'a mut ConfigStore,
        history: &'a mut HistoryStore,
        interrupt: CancellationToken,
    ) -> Self {
        Self {
            term,
            chat,
            config,
            history,
            formatter: Formatter::new(DEFAULTS.columns).keypress_timeout(DEFAULTS.keypress_timeout),
            streaming: true,
            system_prompt: t("session.default_system_prompt"),
            read_timeout: DEFAULTS.read_line_timeout,
            interrupt,
            reconnected: false,
        }
    }

    /// Replace the formatter
    #[must_use]
    pub fn formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Stream answers as they arrive (default) or show them whole
    #[must_use]
    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Set the system prompt
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Set how long the prompt waits for a line
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Run until the session ends
    pub async fn run(&mut self) -> ShellExit {
        let mut banner_due = true;
        loop {
            let result = if banner_due {
                banner_due = false;
                self.banner().await.map(|()| Flow::Continue)
            } else {
                self.step().await
            };

            match result {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit(exit)) => {
                    debug!("shell exit: {:?}", exit);
                    return exit;
                }
                Err(ShellError::Interrupted) => {
                    self.say_interrupted().await;
                    return ShellExit::Interrupted;
                }
                Err(ShellError::Link(e)) => {
                    if let Some(exit) = self.recover(e).await {
                        return exit;
                    }
                }
            }
        }
    }

    async fn recover(&mut self, cause: TransportError) -> Option<ShellExit> {
        if self.reconnected {
            error!("link failed again: {}", cause);
            return Some(ShellExit::LinkLost);
        }
        self.reconnected = true;
        warn!("link failure: {}, reconnecting", cause);

        match self.term.reopen().await {
            Ok(()) => {
                debug!("link restored: {}", self.term.connection_info());
                if let Err(e) = self.term.write_line(&t("shell.link_restored")).await {
                    error!("link failed right after reconnect: {}", e);
                    return Some(ShellExit::LinkLost);
                }
                None
            }
            Err(e) => {
                error!("reconnect failed: {}", e);
                Some(ShellExit::LinkLost)
            }
        }
    }

    async fn say_interrupted(&mut self) {
        // Pacing waits would stop at the cancelled token after one byte.
        let settings = self.term.settings_mut();
        settings.char_delay = Duration::ZERO;
        settings.line_delay = Duration::ZERO;
        let _ = self.term.write_line("").await;
        let _ = self.term.write_line(&t("shell.interrupted")).await;
    }

    async fn banner(&mut self) -> Result<(), ShellError> {
        self.clear_screen().await;
        let rule = "=".repeat(self.formatter.width());
        self.term.write_line(&rule).await?;
        self.term.write_line(&format!("  {}", t("shell.title"))).await?;
        self.term.write_line(&format!("  {}", t("shell.help_hint"))).await?;
        self.term.write_line(&rule).await?;
        self.term.write_line("").await?;
        Ok(())
    }

    async fn clear_screen(&mut self) {
        if let Err(e) = self.term.clear().await {
            warn!("screen clear failed: {}", e);
        }
    }

    async fn step(&mut self) -> Result<Flow, ShellError> {
        if self.interrupt.is_cancelled() {
            return Err(ShellError::Interrupted);
        }
        self.term.write("> ").await?;
        let Some(line) = self.term.read_line(self.read_timeout, true).await? else {
            return Ok(Flow::Continue);
        };
        let input = line.trim();
        if input.is_empty() {
            return Ok(Flow::Continue);
        }

        match parse_command(input) {
            Some(command) => {
                debug!("command: {:?}", command);
                self.execute(command).await
            }
            None => {
                self.converse(input).await?;
                Ok(Flow::Continue)
            }
        }
    }

    async fn say(&mut self, line: &str) -> Result<(), ShellError> {
        self.term.write_line(line).await?;
        Ok(())
    }

    fn save_config(&self) {
        if let Err(e) = self.config.save() {
            warn!("config not saved to {}: {}", self.config.path().display(), e);
        }
    }

    async fn execute(&mut self, command: ShellCommand) -> Result<Flow, ShellError> {
        match command {
            ShellCommand::Help => {
                let page = self.config.config().page_lines();
                self.formatter
                    .display_wrapped(&mut *self.term, &t("shell.help"), page)
                    .await?;
            }
            ShellCommand::Clear => self.clear_screen().await,
            ShellCommand::Quit => {
                self.say(&t("shell.goodbye")).await?;
                return Ok(Flow::Exit(ShellExit::Quit));
            }
            ShellCommand::Reset => {
                self.say(&t("shell.reconfiguring")).await?;
                return Ok(Flow::Exit(ShellExit::Reconfigure));
            }
            ShellCommand::Model(Some(model)) => {
                self.config.config_mut().model = Some(model.clone());
                self.save_config();
                self.say(&rust_i18n::t!("shell.model_set", model = model)).await?;
            }
            ShellCommand::Model(None) => {
                let model = self.config.config().model().to_string();
                self.say(&rust_i18n::t!("shell.model_current", model = model)).await?;
            }
            ShellCommand::Debug => {
                let settings = self.term.settings_mut();
                settings.trace_rx = !settings.trace_rx;
                let enabled = settings.trace_rx;
                debug!("receive tracing {}", if enabled { "on" } else { "off" });
                let key = if enabled { "shell.debug_on" } else { "shell.debug_off" };
                self.say(&t(key)).await?;
            }
            ShellCommand::HistoryReset => {
                if let Err(e) = self.history.reset() {
                    warn!("history file not removed: {}", e);
                }
                self.say(&t("shell.history_cleared")).await?;
            }
            ShellCommand::NoPage => {
                let enabled = !self.term.pagination_enabled();
                self.term.set_pagination(enabled);
                let key = if enabled { "shell.pagination_on" } else { "shell.pagination_off" };
                self.say(&t(key)).await?;
            }
            ShellCommand::Throttle(Some(ms)) => {
                self.term.settings_mut().line_delay = Duration::from_millis(ms);
                self.config.config_mut().line_delay_ms = Some(ms);
                self.save_config();
                self.say(&rust_i18n::t!("shell.throttle_set", ms = ms)).await?;
            }
            ShellCommand::Throttle(None) => {
                let ms = self.term.settings().line_delay.as_millis();
                self.say(&rust_i18n::t!("shell.throttle_current", ms = ms)).await?;
            }
            ShellCommand::ThrottleUsage => self.say(&t("shell.throttle_usage")).await?,
            ShellCommand::Unknown(name) => {
                self.say(&rust_i18n::t!("shell.unknown_command", command = name)).await?;
            }
        }
        Ok(Flow::Continue)
    }

    /// Send one user line to the chat service and show the answer
    async fn converse(&mut self, input: &str) -> Result<(), ShellError> {
        self.term.write_line("").await?;

        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt.as_str()));
        messages.extend_from_slice(self.history.messages());
        messages.push(ChatMessage::user(input));

        let model = self.config.config().model().to_string();
        let page = self.config.config().page_lines();

        let answer = if self.streaming {
            self.stream_answer(&model, &messages, page).await?
        } else {
            self.whole_answer(&model, &messages, page).await?
        };

        match answer {
            Ok(text) => {
                self.history.push(ChatMessage::user(input));
                self.history.push(ChatMessage::assistant(text));
                if let Err(e) = self.history.save() {
                    warn!("history not saved to {}: {}", self.history.path().display(), e);
                }
            }
            Err(e) => {
                warn!("chat exchange failed: {}", e);
                let key = match e {
                    ChatError::Authentication(_) | ChatError::MissingApiKey => "shell.auth_error",
                    _ => "shell.chat_error",
                };
                self.term.write_line("").await?;
                self.term.write_line(&t(key)).await?;
            }
        }
        self.term.write_line("").await?;
        Ok(())
    }

    async fn stream_answer(
        &mut self,
        model: &str,
        messages: &[ChatMessage],
        page: usize,
    ) -> Result<Result<String, ChatError>, ShellError> {
        let request = self.chat.stream(model, messages);
        let stream = tokio::select! {
            result = request => result,
            () = self.interrupt.cancelled() => return Err(ShellError::Interrupted),
        };
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => return Ok(Err(e)),
        };

        let stream = stream.take_until(self.interrupt.clone().cancelled_owned());
        let shown = self
            .formatter
            .display_streaming(&mut *self.term, stream, page)
            .await?;
        if self.interrupt.is_cancelled() {
            return Err(ShellError::Interrupted);
        }
        debug!("streamed {} chars, {:?}", shown.text.len(), shown.stats);
        Ok(match shown.error {
            None => Ok(shown.text),
            Some(e) => Err(e),
        })
    }

    async fn whole_answer(
        &mut self,
        model: &str,
        messages: &[ChatMessage],
        page: usize,
    ) -> Result<Result<String, ChatError>, ShellError> {
        let request = self.chat.complete(model, messages);
        let text = tokio::select! {
            result = request => result,
            () = self.interrupt.cancelled() => return Err(ShellError::Interrupted),
        };
        let text = match text {
            Ok(text) => text,
            Err(e) => return Ok(Err(e)),
        };
        self.formatter
            .display_wrapped(&mut *self.term, &text, page)
            .await?;
        Ok(Ok(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::TextStream;
    use crate::config::SessionConfig;
    use crate::core::transport::{ScriptedTransport, TranscriptHandle};
    use async_trait::async_trait;
    use futures::stream;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    /// Chat service replaying canned answers
    #[derive(Default)]
    struct CannedChat {
        replies: Mutex<VecDeque<Result<String, ChatError>>>,
        requests: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl CannedChat {
        fn reply(self, text: &str) -> Self {
            self.replies.lock().push_back(Ok(text.to_string()));
            self
        }

        fn fail(self, error: ChatError) -> Self {
            self.replies.lock().push_back(Err(error));
            self
        }

        fn next(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
            self.requests.lock().push(messages.to_vec());
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(ChatError::Connection("no canned reply".into())))
        }
    }

    #[async_trait]
    impl ChatService for CannedChat {
        async fn complete(&self, _model: &str, messages: &[ChatMessage]) -> Result<String, ChatError> {
            self.next(messages)
        }

        async fn stream(&self, _model: &str, messages: &[ChatMessage]) -> Result<TextStream, ChatError> {
            let text = self.next(messages)?;
            let chunks: Vec<Result<String, ChatError>> = text
                .as_bytes()
                .chunks(3)
                .map(|c| Ok(String::from_utf8_lossy(c).into_owned()))
                .collect();
            Ok(Box::pin(stream::iter(chunks)))
        }
    }

    struct Fixture {
        _dir: TempDir,
        config: ConfigStore,
        history: HistoryStore,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let config = ConfigStore::load(dir.path().join("config.json"));
            let history = HistoryStore::load(dir.path().join("history.json"), 20, 16_000);
            Self {
                _dir: dir,
                config,
                history,
            }
        }
    }

    async fn terminal(typed: &[u8]) -> (ScriptedTransport, TranscriptHandle) {
        let mut term = ScriptedTransport::new().input(typed).hang_up_when_drained(true);
        let transcript = term.transcript();
        term.open().await.unwrap();
        (term, transcript)
    }

    #[tokio::test(start_paused = true)]
    async fn test_quit() {
        let mut fx = Fixture::new();
        let chat = CannedChat::default();
        let (mut term, transcript) = terminal(b"/quit\r\n").await;

        let exit = Shell::new(&mut term, &chat, &mut fx.config, &mut fx.history, CancellationToken::new())
            .run()
            .await;
        assert_eq!(exit, ShellExit::Quit);
        assert!(transcript.text().contains(&t("shell.title")));
        assert!(transcript.text().contains(&t("shell.goodbye")));
        assert_eq!(transcript.clears(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_sets_and_reports() {
        let mut fx = Fixture::new();
        let chat = CannedChat::default();
        let (mut term, transcript) = terminal(b"/throttle 200\r\n/throttle\r\n/quit\r\n").await;

        let exit = Shell::new(&mut term, &chat, &mut fx.config, &mut fx.history, CancellationToken::new())
            .run()
            .await;
        assert_eq!(exit, ShellExit::Quit);
        assert_eq!(term.settings().line_delay, Duration::from_millis(200));
        assert_eq!(fx.config.config().line_delay_ms, Some(200));

        let reloaded = ConfigStore::load(fx.config.path());
        assert_eq!(reloaded.config().line_delay_ms(), 200);
        let reported = rust_i18n::t!("shell.throttle_current", ms = 200).to_string();
        assert!(reported.contains("200ms"));
        assert!(transcript.text().contains(&reported));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_usage_and_unknown() {
        let mut fx = Fixture::new();
        let chat = CannedChat::default();
        let (mut term, transcript) = terminal(b"/throttle vite\r\n/bogus\r\n/quit\r\n").await;

        Shell::new(&mut term, &chat, &mut fx.config, &mut fx.history, CancellationToken::new())
            .run()
            .await;
        let text = transcript.text();
        assert!(text.contains(&t("shell.throttle_usage")));
        assert!(text.contains(&rust_i18n::t!("shell.unknown_command", command = "/bogus").to_string()));
        assert_eq!(fx.config.config(), &SessionConfig::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_model_and_toggles() {
        let mut fx = Fixture::new();
        let chat = CannedChat::default();
        let (mut term, _) = terminal(b"/model gpt-4o\r\n/nopage\r\n/debug\r\n/quit\r\n").await;

        Shell::new(&mut term, &chat, &mut fx.config, &mut fx.history, CancellationToken::new())
            .run()
            .await;
        assert_eq!(fx.config.config().model(), "gpt-4o");
        assert!(!term.pagination_enabled());
        assert!(term.settings().trace_rx);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_requests_reconfiguration() {
        let mut fx = Fixture::new();
        let chat = CannedChat::default();
        let (mut term, _) = terminal(b"/reset\r\n").await;

        let exit = Shell::new(&mut term, &chat, &mut fx.config, &mut fx.history, CancellationToken::new())
            .run()
            .await;
        assert_eq!(exit, ShellExit::Reconfigure);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_exchange_recorded() {
        let mut fx = Fixture::new();
        let chat = CannedChat::default().reply("Bonjour, comment puis-je aider ?");
        let (mut term, transcript) = terminal(b"salut\r\n/quit\r\n").await;

        Shell::new(&mut term, &chat, &mut fx.config, &mut fx.history, CancellationToken::new())
            .system_prompt("Sois bref.")
            .run()
            .await;

        assert!(transcript.text().contains("Bonjour, comment puis-je aider ?"));
        let history = fx.history.messages();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], ChatMessage::user("salut"));
        assert_eq!(history[1], ChatMessage::assistant("Bonjour, comment puis-je aider ?"));

        let requests = chat.requests.lock();
        assert_eq!(requests[0][0], ChatMessage::system("Sois bref."));
        assert_eq!(requests[0].last(), Some(&ChatMessage::user("salut")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_is_sent_with_next_question() {
        let mut fx = Fixture::new();
        let chat = CannedChat::default().reply("un").reply("deux");
        let (mut term, _) = terminal(b"q1\r\nq2\r\n/quit\r\n").await;

        Shell::new(&mut term, &chat, &mut fx.config, &mut fx.history, CancellationToken::new())
            .streaming(false)
            .run()
            .await;

        let requests = chat.requests.lock();
        assert_eq!(requests[1].len(), 4);
        assert_eq!(requests[1][1], ChatMessage::user("q1"));
        assert_eq!(requests[1][2], ChatMessage::assistant("un"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_failure_prints_error_and_keeps_history() {
        let mut fx = Fixture::new();
        let chat = CannedChat::default().fail(ChatError::from_status(400, "bad".into(), None));
        let (mut term, transcript) = terminal(b"salut\r\n/quit\r\n").await;

        let exit = Shell::new(&mut term, &chat, &mut fx.config, &mut fx.history, CancellationToken::new())
            .run()
            .await;
        assert_eq!(exit, ShellExit::Quit);
        assert!(transcript.text().contains(&t("shell.chat_error")));
        assert!(fx.history.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_reset_command() {
        let mut fx = Fixture::new();
        fx.history.push(ChatMessage::user("old"));
        fx.history.save().unwrap();
        let chat = CannedChat::default();
        let (mut term, _) = terminal(b"/history_reset\r\n/quit\r\n").await;

        Shell::new(&mut term, &chat, &mut fx.config, &mut fx.history, CancellationToken::new())
            .run()
            .await;
        assert!(fx.history.is_empty());
        assert!(!fx.history.path().exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_lost_after_second_failure() {
        let mut fx = Fixture::new();
        let chat = CannedChat::default();
        let (mut term, transcript) = terminal(b"").await;

        let exit = Shell::new(&mut term, &chat, &mut fx.config, &mut fx.history, CancellationToken::new())
            .run()
            .await;
        assert_eq!(exit, ShellExit::LinkLost);
        assert_eq!(transcript.opens(), 2);
        assert!(transcript.text().contains(&t("shell.link_restored")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_after_write_failure() {
        let mut fx = Fixture::new();
        let chat = CannedChat::default();
        let mut term = ScriptedTransport::new().input(b"/quit\r\n").failing_sends(1);
        let transcript = term.transcript();
        term.open().await.unwrap();

        let exit = Shell::new(&mut term, &chat, &mut fx.config, &mut fx.history, CancellationToken::new())
            .run()
            .await;
        assert_eq!(exit, ShellExit::Quit);
        assert_eq!(transcript.opens(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_ends_session() {
        let mut fx = Fixture::new();
        let chat = CannedChat::default();
        let token = CancellationToken::new();
        let mut term = ScriptedTransport::new().interrupt(token.clone());
        let transcript = term.transcript();
        term.open().await.unwrap();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            canceller.cancel();
        });

        let exit = Shell::new(&mut term, &chat, &mut fx.config, &mut fx.history, token)
            .run()
            .await;
        assert_eq!(exit, ShellExit::Interrupted);
        assert!(transcript.text().contains(&t("shell.interrupted")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_cuts_throttled_output() {
        let mut fx = Fixture::new();
        let chat = CannedChat::default();
        let token = CancellationToken::new();
        let mut term = ScriptedTransport::new()
            .input(b"/throttle 100000000\r\n/throttle 5000\r\n/help\r\n")
            .interrupt(token.clone());
        let transcript = term.transcript();
        term.open().await.unwrap();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            canceller.cancel();
        });

        let start = tokio::time::Instant::now();
        let exit = Shell::new(&mut term, &chat, &mut fx.config, &mut fx.history, token)
            .run()
            .await;
        assert_eq!(exit, ShellExit::Interrupted);
        assert!(start.elapsed() < Duration::from_secs(10));
        assert_eq!(fx.config.config().line_delay_ms, Some(5000));

        let text = transcript.text();
        assert!(text.contains(&t("shell.throttle_usage")));
        assert!(text.contains(&t("shell.interrupted")));
    }

    /// Log sink shared with a scoped subscriber
    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_routine_session_stays_quiet_at_info() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut fx = Fixture::new();
        let chat = CannedChat::default().reply("Oui.");
        let (mut term, _transcript) = terminal(b"salut\r\n/model\r\n/nopage\r\n/quit\r\n").await;

        let exit = Shell::new(&mut term, &chat, &mut fx.config, &mut fx.history, CancellationToken::new())
            .run()
            .await;
        assert_eq!(exit, ShellExit::Quit);
        let logged = String::from_utf8_lossy(&logs.0.lock()).into_owned();
        assert!(logged.is_empty(), "{logged}");
    }
}
