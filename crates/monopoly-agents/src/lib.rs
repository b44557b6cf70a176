//! # monopoly-agents
//!
//! Agent-controlled Monopoly players: every decision is put to a language
//! model as a compact prompt and the free-form reply is decoded into a game
//! action. Agents may negotiate trades with each other under a bounded
//! counter-offer protocol; an agreed trade is applied atomically.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌───────────────┐   ┌──────────────┐
//! │   context   │──▶│ AgentSeat   │──▶│    parser     │──▶│ Negotiator   │
//! │ (snapshot)  │   │ (Transport) │   │  (Decision)   │   │ (counters)   │
//! └─────────────┘   └─────────────┘   └───────────────┘   └──────┬───────┘
//!                                                                │ accepted
//!                                                         ┌──────▼───────┐
//!                                                         │ trade        │
//!                                                         │ (atomic)     │
//!                                                         └──────────────┘
//! ```
//!
//! The game loop owns [`GameState`]; agents only ever read it while they
//! think, and the trade executor is the single place a negotiation changes
//! it.

pub mod agent;
pub mod context;
pub mod error;
pub mod log;
pub mod model;
pub mod negotiation;
pub mod parser;
pub mod setup;
pub mod trade;
pub mod turn;

pub use agent::{AgentSeat, AgentTable, TurnPlan};
pub use error::{LogError, TradeRejection};
pub use log::{GameLog, LogWriter, WriterStats};
pub use model::{Board, GameState, Player, PlayerId, Property, PropertyId};
pub use negotiation::{NegotiationOutcome, NegotiationState, NegotiationStatus, Negotiator, TradeProposal};
pub use parser::{BatchedStrategy, Decision, JailChoice, ProposalDraft, TradeTerms};
pub use setup::{load_settings, seat_agents};
pub use trade::TradeReceipt;
pub use turn::{make_a_move, MoveEngine, MoveResult, TurnSettings};

/// System prompt for every agent session unless a player overrides it
pub const AGENT_SYSTEM_PROMPT: &str = "You play Monopoly. Respond with ONLY the action keyword - no explanations.
Buy: BUY or PASS
Improve: IMPROVE:<property> or NO_IMPROVEMENT
Jail: USE_GOOJF, PAY_FINE or WAIT
Trade proposal: TRADE_PROPOSE:<player>:<you give>:<you get>:<cash you pay> or NO_TRADE
Trade response: TRADE_ACCEPT, TRADE_REJECT or TRADE_COUNTER:<you give>:<you get>:<cash you pay>
Separate several properties with commas; write NONE for an empty side.
Keep responses under 20 tokens.";
