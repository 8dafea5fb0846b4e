//! Chat service errors

use std::time::Duration;
use thiserror::Error;

/// Chat service error types
#[derive(Error, Debug)]
pub enum ChatError {
    /// No API key was configured
    #[error("No API key configured")]
    MissingApiKey,

    /// Key rejected (401/403)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Too many requests (429)
    #[error("Rate limited")]
    RateLimited {
        /// Server-suggested wait
        retry_after: Option<Duration>,
    },

    /// Non-success HTTP status
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Server-provided message
        message: String,
    },

    /// Request timed out
    #[error("Request timed out")]
    Timeout,

    /// Could not reach the service, or the connection dropped
    #[error("Connection error: {0}")]
    Connection(String),

    /// Response did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Cancelled by the operator
    #[error("Interrupted")]
    Interrupted,
}

impl ChatError {
    /// Map a non-success status and its body to an error
    pub fn from_status(status: u16, message: String, retry_after: Option<Duration>) -> Self {
        match status {
            401 | 403 => Self::Authentication(message),
            429 => Self::RateLimited { retry_after },
            408 => Self::Timeout,
            _ => Self::Api { status, message },
        }
    }

    /// Whether trying again may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout | Self::Connection(_) => true,
            Self::Api { status, .. } => *status == 409 || *status >= 500,
            _ => false,
        }
    }

    /// Server-suggested wait before retrying
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else if let Some(status) = e.status() {
            Self::from_status(status.as_u16(), e.to_string(), None)
        } else {
            Self::Connection(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidResponse(e.to_string())
    }
}
