//! Chat-completion collaborator
//!
//! The shell only sees [`ChatService`]. [`OpenAiClient`] implements it
//! against an OpenAI-compatible HTTP endpoint.

mod error;
mod openai;
mod retry;
mod sse;

pub use error::ChatError;
pub use openai::{OpenAiClient, DEFAULT_BASE_URL};
pub use retry::RetryPolicy;
pub use sse::{parse_data_line, SseEvent, SseLineBuffer};

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions framing the conversation
    System,
    /// The person at the terminal
    User,
    /// The model
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One role-tagged message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author
    pub role: Role,
    /// Text
    pub content: String,
}

impl ChatMessage {
    /// Create a message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// System message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// User message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Lazily produced text fragments
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

/// Remote text service
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Whole answer in one piece
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, ChatError>;

    /// Answer as a stream of fragments
    ///
    /// Only setting up the stream may be retried; fragments are never
    /// replayed once produced.
    async fn stream(&self, model: &str, messages: &[ChatMessage])
        -> Result<TextStream, ChatError>;
}
