//! # agent-core
//!
//! Provider-agnostic plumbing for agent-controlled game players.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Transport                             │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────────────┐  │
//! │  │ ChatSession │  │ RetryPolicy │  │   LlmProvider        │  │
//! │  │  (history)  │──│  + Sleeper  │──│   (Strategy)         │  │
//! │  └─────────────┘  └─────────────┘  └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait hides whether a backend keeps conversation state
//! server-side or needs the whole history resent on every call. The
//! `Transport` always returns *some* text: transient failures are retried with
//! exponential backoff, anything else degrades to a safe default reply.

pub mod error;
pub mod message;
pub mod provider;
pub mod retry;
pub mod session;
pub mod sink;
pub mod stub;
pub mod transport;

pub use error::{AgentError, Result};
pub use message::{Message, Role};
pub use provider::{Completion, GenerationOptions, HistoryMode, LlmProvider};
pub use retry::{ErrorClass, RecordingSleeper, RetryDecision, RetryPolicy, Sleeper, TokioSleeper};
pub use session::{ChatSession, SessionId};
pub use sink::{LogSink, MemorySink, NullSink};
pub use stub::StubProvider;
pub use transport::{Transport, TransportConfig};
