//! Negotiation Engine
//!
//! Bounded counter-offer protocol between two agent seats. The responder
//! may accept, reject, or counter; a counter swaps the roles and becomes
//! the new proposal. With `max_counters` counters allowed a negotiation
//! makes at most `max_counters + 1` transport calls.

mod proposal;

pub use proposal::TradeProposal;

use agent_core::LogSink;
use serde::{Deserialize, Serialize};

use crate::agent::AgentSeat;
use crate::model::{GameState, PlayerId};
use crate::parser::{self, Decision};

/// Default number of counter-offers per negotiation
pub const DEFAULT_MAX_COUNTERS: u32 = 3;

/// Where a negotiation ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NegotiationStatus {
    Accepted,
    Rejected,
    Exhausted,
}

impl std::fmt::Display for NegotiationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accepted => write!(f, "ACCEPTED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Exhausted => write!(f, "EXHAUSTED"),
        }
    }
}

/// Live negotiation between two players
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NegotiationState {
    pub current_proposal: TradeProposal,
    pub current_proposer: PlayerId,
    pub current_responder: PlayerId,
    pub counter_count: u32,
    pub max_counters: u32,
}

impl NegotiationState {
    pub fn new(proposal: TradeProposal, max_counters: u32) -> Self {
        Self {
            current_proposer: proposal.proposer,
            current_responder: proposal.target,
            current_proposal: proposal,
            counter_count: 0,
            max_counters,
        }
    }

    pub fn counters_left(&self) -> u32 {
        self.max_counters.saturating_sub(self.counter_count)
    }

    /// Replace the proposal with the responder's counter and swap roles
    fn countered(&mut self, counter: TradeProposal) {
        std::mem::swap(&mut self.current_proposer, &mut self.current_responder);
        self.current_proposal = counter;
        self.counter_count += 1;
    }
}

/// Result of [`Negotiator::negotiate`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NegotiationOutcome {
    pub status: NegotiationStatus,

    /// Last proposal on the table; the agreed one when accepted
    pub proposal: TradeProposal,

    /// Proposer of `proposal`
    pub proposer: PlayerId,

    /// Player who accepted or turned down `proposal`
    pub responder: PlayerId,

    pub transport_calls: usize,
    pub counters: u32,
}

impl NegotiationOutcome {
    pub fn success(&self) -> bool {
        self.status == NegotiationStatus::Accepted
    }

    fn finish(state: NegotiationState, status: NegotiationStatus, transport_calls: usize) -> Self {
        Self {
            status,
            proposer: state.current_proposer,
            responder: state.current_responder,
            proposal: state.current_proposal,
            transport_calls,
            counters: state.counter_count,
        }
    }
}

/// Runs negotiations with a fixed counter budget
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Negotiator {
    max_counters: u32,
}

impl Default for Negotiator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_COUNTERS)
    }
}

impl Negotiator {
    pub fn new(max_counters: u32) -> Self {
        Self { max_counters }
    }

    pub fn max_counters(&self) -> u32 {
        self.max_counters
    }

    /// Negotiate `proposal` from `proposer` to `responder`. Never mutates
    /// the game state; an accepted outcome still has to be executed.
    pub async fn negotiate(
        &self,
        proposer: &mut AgentSeat,
        responder: &mut AgentSeat,
        proposal: TradeProposal,
        state: &GameState,
        log: &dyn LogSink,
    ) -> NegotiationOutcome {
        let mut negotiation = NegotiationState::new(proposal, self.max_counters);

        if let Err(reason) = check_parties(proposer, responder, &negotiation.current_proposal, state) {
            tracing::warn!(reason = %reason, "Negotiation refused");
            log.add(format!("Negotiation refused: {reason}"));
            return NegotiationOutcome::finish(negotiation, NegotiationStatus::Rejected, 0);
        }

        log.add(format!(
            "Negotiation opened: {}",
            negotiation.current_proposal.summary(state)
        ));

        let (mut from, mut to): (&mut AgentSeat, &mut AgentSeat) = (proposer, responder);
        let mut calls = 0;

        loop {
            let prompt = negotiation
                .current_proposal
                .offer_prompt(state, negotiation.counters_left());
            let reply = to.ask(state, &prompt).await;
            calls += 1;

            let decision = parser::parse_negotiation_response(&reply);
            log.add(format!("{} responds: {decision}", to.name()));

            let status = match decision {
                Decision::TradeAccept => NegotiationStatus::Accepted,
                Decision::TradeReject | Decision::Unclear => NegotiationStatus::Rejected,
                Decision::TradeCounter(_) if negotiation.counters_left() == 0 => NegotiationStatus::Exhausted,
                Decision::TradeCounter(terms) => {
                    let counter = negotiation.current_proposal.counter(terms);
                    if let Some(name) = counter.overlap() {
                        log.add(format!("{} countered with {name} on both sides, treated as rejection", to.name()));
                        NegotiationStatus::Rejected
                    } else {
                        log.add(format!(
                            "Counter {}/{}: {}",
                            negotiation.counter_count + 1,
                            negotiation.max_counters,
                            counter.summary(state)
                        ));
                        negotiation.countered(counter);
                        std::mem::swap(&mut from, &mut to);
                        continue;
                    }
                }
                _ => NegotiationStatus::Rejected,
            };

            tracing::info!(
                proposer = %from.name(),
                responder = %to.name(),
                status = %status,
                counters = negotiation.counter_count,
                calls,
                "Negotiation finished"
            );
            log.add(format!(
                "Negotiation {status} after {} counter(s): {}",
                negotiation.counter_count,
                negotiation.current_proposal.summary(state)
            ));
            return NegotiationOutcome::finish(negotiation, status, calls);
        }
    }
}

/// Distinct, solvent, agent-controlled parties matching the seats, and no
/// property on both sides
fn check_parties(
    proposer: &AgentSeat,
    responder: &AgentSeat,
    proposal: &TradeProposal,
    state: &GameState,
) -> Result<(), String> {
    if proposal.proposer != proposer.player() || proposal.target != responder.player() {
        return Err("seats do not match the proposal".into());
    }
    if proposer.player() == responder.player() {
        return Err(format!("{} cannot trade with themselves", proposer.name()));
    }
    for seat in [proposer, responder] {
        let Some(player) = state.player(seat.player()) else {
            return Err(format!("unknown player {}", seat.player()));
        };
        if player.is_bankrupt {
            return Err(format!("{} is bankrupt", player.name));
        }
        if !player.agent_controlled {
            return Err(format!("{} is not agent-controlled", player.name));
        }
    }
    if let Some(name) = proposal.overlap() {
        return Err(format!("{name} is offered on both sides"));
    }
    Ok(())
}
