//! Resilient Transport
//!
//! Sends a prompt on behalf of one player and always hands back text.
//! Only completed exchanges are recorded in the session: a failed attempt's
//! prompt is rolled back before the next retry.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::{Completion, GenerationOptions, HistoryMode, LlmProvider};
use crate::retry::{RetryDecision, RetryPolicy, Sleeper, TokioSleeper};
use crate::session::ChatSession;
use crate::sink::{LogSink, NullSink};

/// Transport configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Backoff for rate/usage limits
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Upper bound for a single provider call, in seconds
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Reply used when the provider cannot be reached
    #[serde(default = "default_fallback")]
    pub fallback_reply: String,
}

const fn default_timeout_secs() -> u64 {
    120
}

fn default_fallback() -> String {
    "PASS".into()
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            request_timeout_secs: default_timeout_secs(),
            fallback_reply: default_fallback(),
        }
    }
}

impl TransportConfig {
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Prompt/reply channel between one player and its provider
pub struct Transport {
    provider: Arc<dyn LlmProvider>,
    options: GenerationOptions,
    config: TransportConfig,
    sleeper: Arc<dyn Sleeper>,
    cancel: CancellationToken,
    sink: Arc<dyn LogSink>,
}

impl Transport {
    pub fn new(provider: Arc<dyn LlmProvider>, options: GenerationOptions) -> Self {
        Self {
            provider,
            options,
            config: TransportConfig::default(),
            sleeper: Arc::new(TokioSleeper),
            cancel: CancellationToken::new(),
            sink: Arc::new(NullSink),
        }
    }

    pub fn with_config(mut self, config: TransportConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Tie retries and in-flight calls to the surrounding game's lifetime
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn provider(&self) -> &dyn LlmProvider {
        self.provider.as_ref()
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    /// Recorded history of `session`
    pub fn history<'a>(&self, session: &'a ChatSession) -> &'a [Message] {
        session.messages()
    }

    /// Send `prompt` and return the reply, or the fallback reply once the
    /// retry budget is spent, on a fatal error, or on cancellation.
    pub async fn send(&self, session: &mut ChatSession, prompt: &str) -> String {
        let mut failures = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return self.give_up(session, &AgentError::Cancelled);
            }

            session.push(Message::user(prompt));
            let err = match self.attempt(session).await {
                Ok(completion) => {
                    tracing::debug!(
                        owner = session.owner(),
                        provider = self.provider.name(),
                        "Agent replied"
                    );
                    session.push(Message::assistant(completion.content.clone()));
                    return completion.content;
                }
                Err(err) => err,
            };

            session.rollback_prompt();
            failures += 1;

            match self.config.retry.decide(failures, err.class()) {
                RetryDecision::Wait(delay) => {
                    tracing::warn!(
                        owner = session.owner(),
                        attempt = failures,
                        delay_secs = delay.as_secs(),
                        error = %err,
                        "Transient agent failure, backing off"
                    );
                    self.sink.add(format!(
                        "{} agent call failed ({err}); retry {failures}/{} in {}s",
                        session.owner(),
                        self.config.retry.max_retries,
                        delay.as_secs()
                    ));
                    if !self.wait(delay).await {
                        return self.give_up(session, &AgentError::Cancelled);
                    }
                }
                RetryDecision::GiveUp => return self.give_up(session, &err),
            }
        }
    }

    async fn attempt(&self, session: &ChatSession) -> Result<Completion> {
        let messages = session.messages();
        let request = match self.provider.history_mode() {
            HistoryMode::Resend => messages,
            HistoryMode::ServerSide => &messages[messages.len().saturating_sub(1)..],
        };
        let options = self.options_for(session);
        let timeout = self.config.request_timeout();

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(AgentError::Cancelled),
            res = tokio::time::timeout(timeout, self.provider.complete(request, &options)) => {
                match res {
                    Ok(result) => result,
                    Err(_) => Err(AgentError::Timeout(timeout)),
                }
            }
        }
    }

    /// Options for one call. A `ServerSide` provider never sees the
    /// session's system message, so it travels as the out-of-band
    /// instruction unless one is configured.
    fn options_for(&self, session: &ChatSession) -> Cow<'_, GenerationOptions> {
        if self.options.system_prompt.is_some() {
            return Cow::Borrowed(&self.options);
        }
        Cow::Owned(GenerationOptions {
            system_prompt: Some(session.system_prompt().to_string()),
            ..self.options.clone()
        })
    }

    /// False if the wait was cut short by cancellation
    async fn wait(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            () = self.sleeper.sleep(delay) => true,
        }
    }

    fn give_up(&self, session: &ChatSession, err: &AgentError) -> String {
        tracing::warn!(
            owner = session.owner(),
            error = %err,
            fallback = %self.config.fallback_reply,
            "Agent unavailable, using fallback reply"
        );
        self.sink.add(format!(
            "{} agent unavailable ({err}); defaulting to {}",
            session.owner(),
            self.config.fallback_reply
        ));
        self.config.fallback_reply.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use crate::retry::RecordingSleeper;
    use crate::sink::MemorySink;
    use crate::stub::StubProvider;

    use async_trait::async_trait;

    fn rate_limited() -> Result<String> {
        Err(AgentError::RateLimited("429 Too Many Requests".into()))
    }

    fn transport(stub: Arc<StubProvider>, sleeper: Arc<RecordingSleeper>) -> Transport {
        Transport::new(stub, GenerationOptions::default()).with_sleeper(sleeper)
    }

    #[tokio::test]
    async fn test_success_records_one_exchange() {
        let stub = Arc::new(StubProvider::new("BUY"));
        let transport = transport(stub.clone(), Arc::new(RecordingSleeper::new()));
        let mut session = ChatSession::new("Hero", "sys");

        let reply = transport.send(&mut session, "Decision:BUY or PASS").await;

        assert_eq!(reply, "BUY");
        let roles: Vec<Role> = transport.history(&session).iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_three_rate_limits_then_success_keeps_one_pair() {
        let stub = Arc::new(StubProvider::scripted(
            "PASS",
            [rate_limited(), rate_limited(), rate_limited(), Ok("BUY".into())],
        ));
        let sleeper = Arc::new(RecordingSleeper::new());
        let sink = Arc::new(MemorySink::new());
        let transport = transport(stub.clone(), sleeper.clone()).with_sink(sink.clone());
        let mut session = ChatSession::new("Hero", "sys");

        let reply = transport.send(&mut session, "Decision:BUY or PASS").await;

        assert_eq!(reply, "BUY");
        assert_eq!(stub.calls(), 4);
        assert_eq!(session.len(), 3);
        assert_eq!(session.exchanges(), 1);
        let users = session.messages().iter().filter(|m| m.role == Role::User).count();
        assert_eq!(users, 1);
        assert_eq!(
            sleeper.waits(),
            vec![
                Duration::from_secs(120),
                Duration::from_secs(240),
                Duration::from_secs(480)
            ]
        );
        assert_eq!(sink.lines().len(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fall_back_to_pass() {
        let stub = Arc::new(StubProvider::scripted("BUY", (0..7).map(|_| rate_limited())));
        let sleeper = Arc::new(RecordingSleeper::new());
        let transport = transport(stub.clone(), sleeper.clone());
        let mut session = ChatSession::new("Hero", "sys");

        let reply = transport.send(&mut session, "Decision:BUY or PASS").await;

        assert_eq!(reply, "PASS");
        assert_eq!(stub.calls(), 7);
        assert_eq!(sleeper.waits().len(), 6);
        assert_eq!(session.len(), 1);
    }

    #[tokio::test]
    async fn test_fatal_error_does_not_retry() {
        let stub = Arc::new(StubProvider::scripted(
            "BUY",
            [Err(AgentError::Auth("bad key".into()))],
        ));
        let sleeper = Arc::new(RecordingSleeper::new());
        let sink = Arc::new(MemorySink::new());
        let transport = transport(stub.clone(), sleeper.clone()).with_sink(sink.clone());
        let mut session = ChatSession::new("Hero", "sys");

        assert_eq!(transport.send(&mut session, "prompt").await, "PASS");
        assert_eq!(stub.calls(), 1);
        assert!(sleeper.waits().is_empty());
        assert!(sink.contains("defaulting to PASS"));
    }

    #[tokio::test]
    async fn test_history_modes_send_different_slices() {
        let resend = Arc::new(StubProvider::new("PASS"));
        let server = Arc::new(StubProvider::new("PASS").with_history_mode(HistoryMode::ServerSide));
        let sleeper = Arc::new(RecordingSleeper::new());
        let mut a = ChatSession::new("A", "sys");
        let mut b = ChatSession::new("B", "sys");

        for _ in 0..2 {
            transport(resend.clone(), sleeper.clone()).send(&mut a, "p").await;
            transport(server.clone(), sleeper.clone()).send(&mut b, "p").await;
        }

        assert_eq!(resend.received_lengths(), vec![2, 4]);
        assert_eq!(server.received_lengths(), vec![1, 1]);
        assert_eq!(a.len(), b.len());
    }

    #[tokio::test]
    async fn test_session_system_prompt_reaches_provider() {
        let stub = Arc::new(StubProvider::new("PASS").with_history_mode(HistoryMode::ServerSide));
        let sleeper = Arc::new(RecordingSleeper::new());
        let mut session = ChatSession::new("Hero", "Respond with BUY or PASS");

        transport(stub.clone(), sleeper.clone()).send(&mut session, "p").await;

        let options = GenerationOptions {
            system_prompt: Some("You are Hero.".into()),
            ..GenerationOptions::default()
        };
        Transport::new(stub.clone(), options)
            .with_sleeper(sleeper)
            .send(&mut session, "p")
            .await;

        assert_eq!(
            stub.system_prompts(),
            vec![
                Some("Respond with BUY or PASS".to_string()),
                Some("You are Hero.".to_string())
            ]
        );
    }

    struct CancellingSleeper(CancellationToken);

    #[async_trait]
    impl Sleeper for CancellingSleeper {
        async fn sleep(&self, _duration: Duration) {
            self.0.cancel();
            std::future::pending::<()>().await;
        }
    }

    #[tokio::test]
    async fn test_cancelled_backoff_returns_fallback() {
        let token = CancellationToken::new();
        let stub = Arc::new(StubProvider::scripted("BUY", [rate_limited()]));
        let transport = Transport::new(stub.clone(), GenerationOptions::default())
            .with_sleeper(Arc::new(CancellingSleeper(token.clone())))
            .with_cancellation(token);
        let mut session = ChatSession::new("Hero", "sys");

        assert_eq!(transport.send(&mut session, "prompt").await, "PASS");
        assert_eq!(stub.calls(), 1);
        assert_eq!(session.len(), 1);
    }
}
