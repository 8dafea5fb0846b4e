//! OpenAI-compatible chat-completions client

use super::sse::text_stream;
use super::{ChatError, ChatMessage, ChatService, RetryPolicy, TextStream};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::Response;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Public OpenAI endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const COMPLETE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// HTTP chat client
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
}

impl OpenAiClient {
    /// Create a client for the public endpoint
    pub fn new(api_key: impl Into<String>) -> Result<Self, ChatError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ChatError::MissingApiKey);
        }
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    /// Target another OpenAI-compatible endpoint
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Replace the retry policy
    #[must_use]
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Chat completions URL
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn post(
        &self,
        request: &CompletionRequest<'_>,
        timeout: Option<Duration>,
    ) -> Result<Response, ChatError> {
        let mut builder = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(request);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let response = builder.send().await?;
        check_status(response).await
    }
}

async fn check_status(response: Response) -> Result<Response, ChatError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|envelope| envelope.error.message)
        .unwrap_or(body);
    debug!("chat endpoint returned {}: {}", status, message);
    Err(ChatError::from_status(status.as_u16(), message, retry_after))
}

#[async_trait]
impl ChatService for OpenAiClient {
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, ChatError> {
        let request = CompletionRequest {
            model,
            messages,
            stream: false,
        };
        debug!("chat request: model={} messages={}", model, messages.len());

        let request = &request;
        let parsed: CompletionResponse = self
            .retry
            .run(move || async move {
                let response = self.post(request, Some(COMPLETE_TIMEOUT)).await?;
                Ok(response.json::<CompletionResponse>().await?)
            })
            .await?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ChatError::InvalidResponse("no choices in response".to_string()))
    }

    async fn stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<TextStream, ChatError> {
        let request = CompletionRequest {
            model,
            messages,
            stream: true,
        };
        debug!("chat stream: model={} messages={}", model, messages.len());

        let request = &request;
        let response = self.retry.run(move || self.post(request, None)).await?;
        Ok(text_stream(response.bytes_stream()))
    }
}
