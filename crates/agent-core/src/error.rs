//! Error Types

use std::time::Duration;

use thiserror::Error;

use crate::retry::ErrorClass;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Substrings (uppercased) that mark a provider failure as a rate or usage
/// limit rather than a hard error.
const TRANSIENT_SIGNATURES: &[&str] = &[
    "429",
    "RATE LIMIT",
    "RATE_LIMIT",
    "RATELIMIT",
    "RESOURCE_EXHAUSTED",
    "QUOTA",
    "USAGE LIMIT",
    "USAGE_LIMIT",
    "TOO MANY REQUESTS",
];

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Rate or usage limit hit upstream
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Provider call exceeded the request timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Call or backoff wait aborted by the surrounding game
    #[error("Request cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Build a provider error, promoting it to `RateLimited` when the message
    /// carries a rate/usage-limit signature.
    pub fn provider(message: impl Into<String>) -> Self {
        let message = message.into();
        if has_transient_signature(&message) {
            Self::RateLimited(message)
        } else {
            Self::Provider(message)
        }
    }

    /// Classify for the retry policy. Only rate/usage limits are transient.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::RateLimited(_) => ErrorClass::Transient,
            Self::Provider(msg) | Self::ProviderUnavailable(msg) | Self::Other(msg)
                if has_transient_signature(msg) =>
            {
                ErrorClass::Transient
            }
            _ => ErrorClass::Fatal,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

fn has_transient_signature(message: &str) -> bool {
    let upper = message.to_uppercase();
    TRANSIENT_SIGNATURES.iter().any(|sig| upper.contains(sig))
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
