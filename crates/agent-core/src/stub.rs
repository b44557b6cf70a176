//! Stub Provider
//!
//! Deterministic provider for testing and offline games. Returns a canned
//! decision, optionally preceded by a scripted queue of replies and errors.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::{Completion, GenerationOptions, HistoryMode, LlmProvider};

/// Canned-reply provider
pub struct StubProvider {
    default_reply: String,
    script: Mutex<VecDeque<Result<String>>>,
    mode: HistoryMode,
    calls: AtomicUsize,
    received: Mutex<Vec<usize>>,
    system_prompts: Mutex<Vec<Option<String>>>,
}

impl StubProvider {
    /// Always answers `default_reply`
    pub fn new(default_reply: impl Into<String>) -> Self {
        Self {
            default_reply: default_reply.into(),
            script: Mutex::new(VecDeque::new()),
            mode: HistoryMode::Resend,
            calls: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
            system_prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answers from `script` in order, then falls back to `default_reply`
    pub fn scripted(
        default_reply: impl Into<String>,
        script: impl IntoIterator<Item = Result<String>>,
    ) -> Self {
        let stub = Self::new(default_reply);
        stub.lock_script().extend(script);
        stub
    }

    /// Convenience for scripts made only of successful replies
    pub fn replies<I, S>(default_reply: impl Into<String>, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::scripted(default_reply, replies.into_iter().map(|r| Ok(r.into())))
    }

    pub fn with_history_mode(mut self, mode: HistoryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Queue another scripted reply or error
    pub fn push(&self, reply: Result<String>) {
        self.lock_script().push_back(reply);
    }

    /// Number of `complete` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// How many messages each call received, in call order
    pub fn received_lengths(&self) -> Vec<usize> {
        self.received
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Out-of-band system instruction each call received, in call order
    pub fn system_prompts(&self) -> Vec<Option<String>> {
        self.system_prompts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String>>> {
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for StubProvider {
    fn default() -> Self {
        Self::new("PASS")
    }
}

#[async_trait]
impl LlmProvider for StubProvider {
    fn name(&self) -> &str {
        "Stub"
    }

    fn history_mode(&self) -> HistoryMode {
        self.mode
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.received
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(messages.len());
        self.system_prompts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(options.system_prompt.clone());

        if messages.is_empty() {
            return Err(AgentError::Provider("empty request".into()));
        }

        let next = self.lock_script().pop_front();
        let content = match next {
            Some(reply) => reply?,
            None => self.default_reply.clone(),
        };
        Ok(Completion::new(content, options.model.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_plays_script_then_default() {
        let stub = StubProvider::scripted(
            "BUY",
            [Err(AgentError::RateLimited("429".into())), Ok("PASS".into())],
        );
        let messages = [Message::user("Decision:BUY or PASS")];
        let opts = GenerationOptions::default();

        assert!(stub.complete(&messages, &opts).await.is_err());
        assert_eq!(stub.complete(&messages, &opts).await.unwrap().content, "PASS");
        assert_eq!(stub.complete(&messages, &opts).await.unwrap().content, "BUY");
        assert_eq!(stub.calls(), 3);
        assert_eq!(stub.received_lengths(), vec![1, 1, 1]);
    }
}
