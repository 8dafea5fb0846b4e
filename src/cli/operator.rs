//! Host console side of the link setup wizard

use super::prompt::StdinLineReader;
use crate::core::probe::{LinkCandidate, PortChoice, ProbeAttempt, ProbeOperator, ProbeVerdict};
use crate::i18n::t;
use async_trait::async_trait;
use std::io::Write;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Wizard dialogue printed to `out` and answered on stdin
pub struct ConsoleOperator<W> {
    lines: StdinLineReader,
    out: W,
    interrupt: CancellationToken,
    port: Option<String>,
}

impl<W: Write + Send> ConsoleOperator<W> {
    /// Create an operator dialogue
    pub fn new(lines: StdinLineReader, out: W, interrupt: CancellationToken) -> Self {
        Self {
            lines,
            out,
            interrupt,
            port: None,
        }
    }

    fn print(&mut self, text: &str) {
        if let Err(e) = write!(self.out, "{text}").and_then(|()| self.out.flush()) {
            debug!("console write failed: {}", e);
        }
    }

    fn println(&mut self, text: &str) {
        self.print(&format!("{text}\n"));
    }

    fn rule(&mut self, width: usize, c: char) {
        let rule: String = std::iter::repeat(c).take(width).collect();
        self.println(&rule);
    }

    /// Ask a yes/no question, anything but an answer starting with `n` is yes
    ///
    /// Returns `false` when stdin closes or the wait is interrupted.
    pub async fn confirm(&mut self, question: &str) -> bool {
        self.print(question);
        match self.lines.next_line(&self.interrupt).await {
            Some(answer) => !answer.trim().to_lowercase().starts_with('n'),
            None => false,
        }
    }
}

fn parse_choice(answer: &str, count: usize) -> Option<PortChoice> {
    let answer = answer.trim().to_lowercase();
    match answer.as_str() {
        "r" => Some(PortChoice::Rescan),
        "q" => Some(PortChoice::Abort),
        _ => match answer.parse::<usize>() {
            Ok(n) if (1..=count).contains(&n) => Some(PortChoice::Selected(n - 1)),
            _ => None,
        },
    }
}

#[async_trait]
impl<W: Write + Send> ProbeOperator for ConsoleOperator<W> {
    async fn select_port(&mut self, ports: &[String]) -> PortChoice {
        self.println("");
        self.rule(60, '=');
        self.println(&format!("   {}", t("cli.wizard_title")));
        self.rule(60, '=');

        if ports.is_empty() {
            self.println("");
            self.println(&t("cli.no_ports"));
            self.println("");
            self.println(&t("cli.press_enter_to_rescan"));
            return match self.lines.next_line(&self.interrupt).await {
                Some(_) => PortChoice::Rescan,
                None => PortChoice::Abort,
            };
        }

        self.println("");
        self.println(&rust_i18n::t!("cli.ports_found", count = ports.len()));
        self.println("");
        for (i, port) in ports.iter().enumerate() {
            self.println(&format!("  [{}] {}", i + 1, port));
        }
        self.println("");
        self.println(&format!("  {}", t("cli.rescan_option")));
        self.println(&format!("  {}", t("cli.quit_option")));

        let choice = loop {
            self.println("");
            self.print(&t("cli.choice"));
            let Some(answer) = self.lines.next_line(&self.interrupt).await else {
                break PortChoice::Abort;
            };
            match parse_choice(&answer, ports.len()) {
                Some(choice) => break choice,
                None => self.println(&t("cli.invalid_choice")),
            }
        };

        if let PortChoice::Selected(index) = choice {
            let port = ports[index].clone();
            self.println("");
            self.println(&rust_i18n::t!("cli.selected_port", port = port));
            self.println("");
            self.rule(40, '-');
            self.println(&t("cli.testing"));
            self.println(&t("cli.watch_screen"));
            self.rule(40, '-');
            self.port = Some(port);
        }
        choice
    }

    fn attempt_started(&mut self, candidate: &LinkCandidate) {
        self.print(&format!("\n{}", rust_i18n::t!("cli.attempt", label = candidate.label)));
    }

    fn attempt_finished(&mut self, candidate: &LinkCandidate, verdict: &ProbeVerdict) {
        match verdict {
            ProbeVerdict::Confirmed => {
                self.println(&t("cli.attempt_ok"));
                let port = self.port.clone().unwrap_or_default();
                self.println("");
                self.rule(40, '=');
                self.println(&t("cli.confirmed"));
                self.println(&rust_i18n::t!("cli.confirmed_port", port = port));
                self.println(&rust_i18n::t!("cli.confirmed_format", label = candidate.label));
                self.rule(40, '=');
            }
            ProbeVerdict::NoResponse => self.println(&t("cli.attempt_no_response")),
            ProbeVerdict::OpenFailed(reason)
            | ProbeVerdict::WriteFailed(reason)
            | ProbeVerdict::ReadFailed(reason) => {
                self.println(&rust_i18n::t!("cli.attempt_error", reason = reason));
            }
        }
    }

    async fn confirm_retry(&mut self, attempts: &[ProbeAttempt]) -> bool {
        debug!("{} candidate(s) tried without confirmation", attempts.len());
        self.println("");
        self.rule(60, '=');
        self.println(&t("cli.nothing_worked"));
        self.rule(60, '=');
        self.println("");
        self.println(&t("cli.diagnostics"));
        self.println("");
        self.confirm(&t("cli.retry_prompt")).await
    }
}
