//! Shell sessions driven end to end over a scripted terminal

use async_trait::async_trait;
use futures::stream;
use minitel_core::chat::{ChatError, ChatMessage, ChatService, TextStream};
use minitel_core::config::{ConfigStore, HistoryStore};
use minitel_core::core::session::{Shell, ShellExit};
use minitel_core::core::transport::{ScriptedTransport, TerminalTransport, TranscriptHandle};
use minitel_core::i18n::t;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Streams a fixed set of fragments, optionally ending with an error
struct FragmentChat {
    fragments: Vec<&'static str>,
    fail_after: bool,
}

#[async_trait]
impl ChatService for FragmentChat {
    async fn complete(&self, _model: &str, _messages: &[ChatMessage]) -> Result<String, ChatError> {
        if self.fail_after {
            return Err(ChatError::Timeout);
        }
        Ok(self.fragments.concat())
    }

    async fn stream(&self, _model: &str, _messages: &[ChatMessage]) -> Result<TextStream, ChatError> {
        let mut items: Vec<Result<String, ChatError>> =
            self.fragments.iter().map(|f| Ok((*f).to_string())).collect();
        if self.fail_after {
            items.push(Err(ChatError::Connection("reset by peer".into())));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}

struct Session {
    _dir: TempDir,
    config: ConfigStore,
    history: HistoryStore,
    term: ScriptedTransport,
    transcript: TranscriptHandle,
}

impl Session {
    async fn new(typed: &[u8]) -> Self {
        let dir = TempDir::new().unwrap();
        let config = ConfigStore::load(dir.path().join("config.json"));
        let history = HistoryStore::load(dir.path().join("history.json"), 20, 16_000);
        let mut term = ScriptedTransport::new().input(typed);
        let transcript = term.transcript();
        term.open().await.unwrap();
        Self {
            _dir: dir,
            config,
            history,
            term,
            transcript,
        }
    }

    async fn run(&mut self, chat: &dyn ChatService, streaming: bool) -> ShellExit {
        Shell::new(
            &mut self.term,
            chat,
            &mut self.config,
            &mut self.history,
            CancellationToken::new(),
        )
        .streaming(streaming)
        .run()
        .await
    }
}

#[tokio::test(start_paused = true)]
async fn streamed_answer_is_shown_and_remembered() {
    let chat = FragmentChat {
        fragments: vec!["Le 3615 ", "était un ", "code."],
        fail_after: false,
    };
    let mut session = Session::new(b"c'est quoi 3615 ?\r\n/quit\r\n").await;

    assert_eq!(session.run(&chat, true).await, ShellExit::Quit);
    assert!(session
        .transcript
        .text()
        .contains("Le 3615 était un code."));

    let reloaded = HistoryStore::load(session.history.path(), 20, 16_000);
    assert_eq!(reloaded.len(), 2);
    assert_eq!(
        reloaded.messages()[1],
        ChatMessage::assistant("Le 3615 était un code.")
    );
}

#[tokio::test(start_paused = true)]
async fn interrupted_stream_reports_error_and_forgets_exchange() {
    let chat = FragmentChat {
        fragments: vec!["Début de ", "réponse"],
        fail_after: true,
    };
    let mut session = Session::new(b"bonjour\r\n/quit\r\n").await;

    assert_eq!(session.run(&chat, true).await, ShellExit::Quit);
    let text = session.transcript.text();
    assert!(text.contains("Début de réponse"));
    assert!(text.contains(&t("shell.chat_error")));
    assert!(session.history.is_empty());
    assert!(!session.history.path().exists());
}

#[tokio::test(start_paused = true)]
async fn whole_answer_mode_reports_failures() {
    let chat = FragmentChat {
        fragments: vec![],
        fail_after: true,
    };
    let mut session = Session::new(b"bonjour\r\n/quit\r\n").await;

    assert_eq!(session.run(&chat, false).await, ShellExit::Quit);
    assert!(session.transcript.text().contains(&t("shell.chat_error")));
    assert!(session.history.is_empty());
}

#[tokio::test(start_paused = true)]
async fn help_is_paginated_like_answers() {
    let chat = FragmentChat {
        fragments: vec![],
        fail_after: false,
    };
    // Spaces answer the "more" pauses; extras are trimmed from the next prompt.
    let mut session = Session::new(b"/help\r\n     /quit\r\n").await;
    session.config.config_mut().page_lines = Some(3);

    assert_eq!(session.run(&chat, true).await, ShellExit::Quit);
    let text = session.transcript.text();
    assert!(text.contains("/history_reset"));
    assert!(text.contains(&t("format.more")));
}
