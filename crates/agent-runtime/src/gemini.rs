//! Gemini LLM Provider
//!
//! Conversation-turn adapter over the `generateContent` REST endpoint. The
//! adapter owns the chat state the way a hosted chat session would: the
//! transport hands over only the new prompt, and the turn is committed to
//! the adapter's history only after Gemini answers.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{Completion, GenerationOptions, HistoryMode, LlmProvider},
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// System instruction used when the player config does not provide one
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You play Monopoly. Respond with ONLY the action keyword - no explanations.
Buy: BUY or PASS
Improve: IMPROVE:<property> or NO_IMPROVEMENT
Jail: USE_GOOJF, PAY_FINE or WAIT
Trade proposal: TRADE_PROPOSE:<player>:<you give>:<you get>:<cash you pay> or NO_TRADE
Trade response: TRADE_ACCEPT, TRADE_REJECT or TRADE_COUNTER:<you give>:<you get>:<cash you pay>
Separate several properties with commas; write NONE for an empty side.
Keep responses under 20 tokens.";

/// Gemini provider configuration
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    /// API key sent as `x-goog-api-key`
    pub api_key: String,

    /// Default model when the player config does not name one
    pub model: String,

    /// API root, overridable for proxies
    pub base_url: String,

    /// HTTP timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.0-flash-exp".into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            timeout_secs: 120,
        }
    }
}

impl GeminiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read `GEMINI_API_KEY` and `GEMINI_MODEL` through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            api_key: lookup("GEMINI_API_KEY").unwrap_or_default(),
            model: lookup("GEMINI_MODEL").unwrap_or(defaults.model),
            ..defaults
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn new(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            parts: vec![Part { text: text.into() }],
        }
    }

    fn text(&self) -> String {
        self.parts.iter().map(|p| p.text.as_str()).collect()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    thinking_config: ThinkingConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    contents: &'a [Content],
    generation_config: GenerationConfig,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

/// Gemini LLM provider; one instance per player
pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
    history: Mutex<Vec<Content>>,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if !config.has_api_key() {
            return Err(AgentError::Config("GEMINI_API_KEY is not set".into()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(e.to_string()))?;

        Ok(Self {
            client,
            config,
            history: Mutex::new(Vec::new()),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GeminiConfig::from_env())
    }

    /// Number of committed turns held by the adapter
    pub async fn turns(&self) -> usize {
        self.history.lock().await.len()
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        )
    }

    fn convert_messages(messages: &[Message]) -> Vec<Content> {
        messages
            .iter()
            .filter_map(|m| match m.role {
                Role::User => Some(Content::new("user", m.content.clone())),
                Role::Assistant => Some(Content::new("model", m.content.clone())),
                Role::System => None,
            })
            .collect()
    }

    fn build_request<'a>(contents: &'a [Content], options: &GenerationOptions) -> GenerateRequest<'a> {
        let system = options
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.to_string());

        GenerateRequest {
            system_instruction: Some(SystemInstruction {
                parts: vec![Part { text: system }],
            }),
            contents,
            generation_config: GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_tokens,
                thinking_config: ThinkingConfig { thinking_budget: 0 },
            },
        }
    }

    fn classify_status(status: StatusCode, body: &str) -> AgentError {
        match status {
            StatusCode::TOO_MANY_REQUESTS => AgentError::RateLimited(body.to_string()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::Auth(body.to_string()),
            StatusCode::SERVICE_UNAVAILABLE => AgentError::ProviderUnavailable(body.to_string()),
            _ => AgentError::provider(format!("HTTP {status}: {body}")),
        }
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "Gemini"
    }

    fn history_mode(&self) -> HistoryMode {
        HistoryMode::ServerSide
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let turn = Self::convert_messages(messages);
        if turn.is_empty() {
            return Err(AgentError::Provider("no prompt to send".into()));
        }

        // Held across the request so turns of one chat never interleave.
        let mut history = self.history.lock().await;
        let mut contents = history.clone();
        contents.extend(turn.iter().cloned());

        let response = self
            .client
            .post(self.endpoint(&options.model))
            .header("x-goog-api-key", &self.config.api_key)
            .json(&Self::build_request(&contents, options))
            .send()
            .await
            .map_err(|e| AgentError::provider(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Provider(format!("undecodable response: {e}")))?;

        let reply = parsed
            .candidates
            .into_iter()
            .find_map(|c| c.content)
            .map(|c| c.text().trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| AgentError::Provider("empty candidate list".into()))?;

        history.extend(turn);
        history.push(Content::new("model", reply.clone()));

        Ok(Completion::new(reply, options.model.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_key_is_config_error() {
        let result = GeminiProvider::new(GeminiConfig::default());
        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    #[test]
    fn test_config_from_lookup() {
        let env: HashMap<&str, &str> = HashMap::from([("GEMINI_API_KEY", "k-123")]);
        let config = GeminiConfig::from_lookup(|k| env.get(k).map(ToString::to_string));
        assert!(config.has_api_key());
        assert_eq!(config.model, "gemini-2.0-flash-exp");
    }

    #[test]
    fn test_system_messages_go_out_of_band() {
        let messages = vec![Message::system("rules"), Message::user("BUY or PASS")];
        let contents = GeminiProvider::convert_messages(&messages);
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].role, "user");

        let request = GeminiProvider::build_request(&contents, &GenerationOptions::default());
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "BUY or PASS");
        assert_eq!(json["generationConfig"]["thinkingConfig"]["thinkingBudget"], 0);
        assert!(json["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("TRADE_ACCEPT, TRADE_REJECT"));

        let options = GenerationOptions {
            system_prompt: Some("rules".into()),
            ..GenerationOptions::default()
        };
        let json = serde_json::to_value(GeminiProvider::build_request(&contents, &options)).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "rules");
    }

    #[test]
    fn test_status_classification() {
        assert!(GeminiProvider::classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        assert!(!GeminiProvider::classify_status(StatusCode::BAD_REQUEST, "bad").is_retryable());
        assert!(
            GeminiProvider::classify_status(StatusCode::BAD_REQUEST, "RESOURCE_EXHAUSTED")
                .is_retryable()
        );
    }

    #[tokio::test]
    async fn test_endpoint_and_empty_history() {
        let provider = GeminiProvider::new(GeminiConfig {
            api_key: "k".into(),
            ..GeminiConfig::default()
        })
        .unwrap();
        assert_eq!(provider.turns().await, 0);
        assert!(provider.endpoint("gemini-2.5-flash").ends_with("/models/gemini-2.5-flash:generateContent"));
    }
}
