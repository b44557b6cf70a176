//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for agent backends (Gemini, Ollama, stub)
//! so the transport works with any of them without code changes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::{ChatSession, Transport};
//!
//! let transport = Transport::new(provider, GenerationOptions::default());
//! let reply = transport.send(&mut session, "Decision:BUY or PASS").await;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Message;

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "gemini-2.0-flash-exp", "gpt-oss:120b-cloud")
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// System instruction for providers that take it out of band
    #[serde(default)]
    pub system_prompt: Option<String>,
}

const fn default_temperature() -> f32 {
    0.7
}
const fn default_max_tokens() -> u32 {
    256
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash-exp".into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt: None,
        }
    }
}

/// Response from an LLM completion
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text
    pub content: String,

    /// Model that generated this response
    pub model: String,
}

impl Completion {
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
        }
    }
}

/// How a provider keeps conversation state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
    /// Conversation-turn style: the backend (or its adapter) retains prior
    /// turns; only the new prompt is passed to `complete`.
    ServerSide,
    /// Manual-history style: the whole session, leading SYSTEM message
    /// included, is passed to `complete` on every call.
    Resend,
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The transport works exclusively through this interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logs (e.g., "Gemini", "Ollama")
    fn name(&self) -> &str;

    /// Which messages the transport must hand to `complete`
    fn history_mode(&self) -> HistoryMode;

    /// Generate a completion. A `ServerSide` provider must only commit the
    /// exchange to its own state when it returns `Ok`.
    async fn complete(&self, messages: &[Message], options: &GenerationOptions)
        -> Result<Completion>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_options_defaults() {
        let opts = GenerationOptions::default();
        assert!((opts.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(opts.max_tokens, 256);
        assert!(opts.system_prompt.is_none());
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let opts: GenerationOptions =
            serde_json::from_str(r#"{"model": "gpt-oss:20b-cloud"}"#).unwrap();
        assert_eq!(opts.model, "gpt-oss:20b-cloud");
        assert_eq!(opts.max_tokens, 256);
    }
}
