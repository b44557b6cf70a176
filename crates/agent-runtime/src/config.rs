//! Agent Configuration
//!
//! Which players are agent-controlled and which provider drives each one.
//!
//! ```toml
//! provider = "gemini"
//! players = ["Hero", "Rival"]
//!
//! [player.Rival]
//! provider = "ollama"
//! model = "gpt-oss:120b-cloud"
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use agent_core::{GenerationOptions, LlmProvider, StubProvider, TransportConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gemini::{GeminiConfig, GeminiProvider};
#[cfg(feature = "ollama")]
use crate::ollama::{OllamaConfig, OllamaProvider};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid agent settings: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Backend selection
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Gemini,
    #[serde(alias = "llama")]
    Ollama,
    Stub,
    /// Anything unrecognised; resolved to the stub at build time
    #[serde(other)]
    Unknown,
}

/// Per-player overrides
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlayerAgentConfig {
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub system_prompt: Option<String>,
}

/// Run-wide agent settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Provider for players without an override
    #[serde(default)]
    pub provider: ProviderKind,

    /// Names of agent-controlled players; everyone else plays by rules
    #[serde(default)]
    pub players: Vec<String>,

    /// Overrides keyed by player name
    #[serde(default, rename = "player")]
    pub per_player: HashMap<String, PlayerAgentConfig>,

    /// Canned reply for stub-driven players
    #[serde(default = "default_stub_reply")]
    pub stub_reply: String,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(skip)]
    pub gemini: GeminiConfig,

    #[cfg(feature = "ollama")]
    #[serde(skip)]
    pub ollama: OllamaConfig,
}

fn default_stub_reply() -> String {
    "PASS".into()
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            players: Vec::new(),
            per_player: HashMap::new(),
            stub_reply: default_stub_reply(),
            transport: TransportConfig::default(),
            gemini: GeminiConfig::default(),
            #[cfg(feature = "ollama")]
            ollama: OllamaConfig::default(),
        }
    }
}

impl AgentSettings {
    /// Parse settings from TOML text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let mut settings: Self = toml::from_str(text)?;
        if settings.stub_reply.is_empty() {
            settings.stub_reply = default_stub_reply();
        }
        Ok(settings)
    }

    /// Read and parse a TOML settings file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Overlay provider credentials and endpoints from the environment
    pub fn with_env(self) -> Self {
        self.with_lookup(|key| std::env::var(key).ok())
    }

    pub fn with_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        self.gemini = GeminiConfig::from_lookup(&lookup);
        #[cfg(feature = "ollama")]
        {
            self.ollama = OllamaConfig::from_lookup(&lookup);
        }
        self
    }

    /// Whether `name` is agent-controlled (case-insensitive)
    pub fn is_agent(&self, name: &str) -> bool {
        self.players.iter().any(|p| p.eq_ignore_ascii_case(name))
    }

    fn player_config(&self, name: &str) -> Option<&PlayerAgentConfig> {
        self.per_player
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Provider kind after applying the player's override
    pub fn provider_kind(&self, name: &str) -> ProviderKind {
        self.player_config(name)
            .and_then(|c| c.provider.clone())
            .unwrap_or_else(|| self.provider.clone())
    }

    /// Generation options (model, system prompt) for `name`
    pub fn generation_options(&self, name: &str) -> GenerationOptions {
        let overrides = self.player_config(name);
        let model = overrides.and_then(|c| c.model.clone()).unwrap_or_else(|| {
            match self.provider_kind(name) {
                #[cfg(feature = "ollama")]
                ProviderKind::Ollama => self.ollama.model.clone(),
                ProviderKind::Stub | ProviderKind::Unknown => "stub".into(),
                _ => self.gemini.model.clone(),
            }
        });

        GenerationOptions {
            model,
            system_prompt: overrides.and_then(|c| c.system_prompt.clone()),
            ..GenerationOptions::default()
        }
    }

    /// A fresh provider for one agent-controlled player, or `None` for
    /// rule-based players. Misconfigured agents get the stub instead of
    /// failing the game.
    pub fn build_provider(&self, name: &str) -> Option<Arc<dyn LlmProvider>> {
        if !self.is_agent(name) {
            return None;
        }

        let kind = self.provider_kind(name);
        let provider: Arc<dyn LlmProvider> = match &kind {
            ProviderKind::Gemini => {
                let mut config = self.gemini.clone();
                if let Some(key) = self.player_config(name).and_then(|c| c.api_key.clone()) {
                    config.api_key = key;
                }
                match GeminiProvider::new(config) {
                    Ok(provider) => {
                        tracing::info!(player = name, "Gemini chat created");
                        Arc::new(provider)
                    }
                    Err(e) => {
                        tracing::warn!(player = name, error = %e, "Gemini unavailable, using stub");
                        self.stub()
                    }
                }
            }
            #[cfg(feature = "ollama")]
            ProviderKind::Ollama => {
                tracing::info!(player = name, "Ollama chat created");
                Arc::new(OllamaProvider::from_config(self.ollama.clone()))
            }
            ProviderKind::Stub => self.stub(),
            _ => {
                tracing::warn!(player = name, provider = ?kind, "Unknown provider, using stub");
                self.stub()
            }
        };
        Some(provider)
    }

    fn stub(&self) -> Arc<dyn LlmProvider> {
        Arc::new(StubProvider::new(self.stub_reply.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS: &str = r#"
provider = "gemini"
players = ["Hero", "Rival", "Ghost"]

[player.Rival]
provider = "llama"
model = "gpt-oss:20b-cloud"

[player.Ghost]
provider = "carrier-pigeon"

[transport]
fallback_reply = "PASS"
request_timeout_secs = 30
"#;

    #[test]
    fn test_parse_settings() {
        let settings = AgentSettings::from_toml(SETTINGS).unwrap();
        assert!(settings.is_agent("hero"));
        assert!(!settings.is_agent("Villain"));
        assert_eq!(settings.provider_kind("Hero"), ProviderKind::Gemini);
        assert_eq!(settings.provider_kind("Rival"), ProviderKind::Ollama);
        assert_eq!(settings.provider_kind("Ghost"), ProviderKind::Unknown);
        assert_eq!(settings.generation_options("Rival").model, "gpt-oss:20b-cloud");
        assert_eq!(settings.transport.request_timeout_secs, 30);
        assert_eq!(settings.transport.retry.max_retries, 6);
        assert_eq!(settings.stub_reply, "PASS");
    }

    #[test]
    fn test_missing_key_falls_back_to_stub() {
        let settings = AgentSettings::from_toml(SETTINGS)
            .unwrap()
            .with_lookup(|_| None);

        let hero = settings.build_provider("Hero").unwrap();
        assert_eq!(hero.name(), "Stub");
        let ghost = settings.build_provider("Ghost").unwrap();
        assert_eq!(ghost.name(), "Stub");
        assert!(settings.build_provider("Villain").is_none());
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        assert!(matches!(
            AgentSettings::from_toml("players = 3"),
            Err(ConfigError::Parse(_))
        ));
    }
}
