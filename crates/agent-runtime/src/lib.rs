//! # agent-runtime
//!
//! Concrete agent providers and their configuration.
//!
//! ## Providers
//!
//! - **Gemini**: conversation-turn style; the adapter keeps the chat state and
//!   only the new prompt crosses the transport boundary
//! - **Ollama** (default feature): manual-history style; the whole session is
//!   resent on every call
//! - **Stub**: deterministic canned replies, used when a provider cannot be
//!   configured
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::config::AgentSettings;
//!
//! let settings = AgentSettings::load("agents.toml")?.with_env();
//! if let Some(provider) = settings.build_provider("Hero") {
//!     let transport = Transport::new(provider, settings.generation_options("Hero"));
//! }
//! ```

pub mod config;
pub mod gemini;
#[cfg(feature = "ollama")]
pub mod ollama;

pub use config::{AgentSettings, ConfigError, PlayerAgentConfig, ProviderKind};
pub use gemini::{GeminiConfig, GeminiProvider};
#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};

// Re-export core types for convenience
pub use agent_core::{
    AgentError, ChatSession, GenerationOptions, LlmProvider, Message, Result, Role,
    StubProvider, Transport,
};
