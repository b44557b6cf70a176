//! Agent Turns
//!
//! Hook into the game loop. Before an agent-controlled player moves, one
//! batched prompt plans the turn: a trade is negotiated and executed, then
//! the planned builds are applied. Dice, movement, rent and everything else
//! stay with the [`MoveEngine`].

use agent_core::LogSink;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agent::{AgentSeat, AgentTable};
use crate::model::{GameState, PlayerId, Property, PropertyId};
use crate::negotiation::{DEFAULT_MAX_COUNTERS, Negotiator, TradeProposal};
use crate::parser;
use crate::trade;

/// What the game loop should do with the player after their move
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveResult {
    Continue,
    Bankrupt,
}

/// Rule-engine side of a move. Agent-controlled players get their seat so
/// landing, jail and rent decisions can be asked of the agent.
#[async_trait]
pub trait MoveEngine: Send {
    async fn make_a_move(
        &mut self,
        state: &mut GameState,
        player: PlayerId,
        agent: Option<&mut AgentSeat>,
        log: &dyn LogSink,
    ) -> MoveResult;
}

/// Per-turn limits
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnSettings {
    /// Counter-offers allowed per negotiation
    #[serde(default = "default_max_counters")]
    pub max_counters: u32,

    /// Builds allowed per turn
    #[serde(default = "default_max_improvements")]
    pub max_improvements: usize,

    /// Cash a player never spends on building
    #[serde(default)]
    pub unspendable_cash: i64,
}

fn default_max_counters() -> u32 {
    DEFAULT_MAX_COUNTERS
}

fn default_max_improvements() -> usize {
    5
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            max_counters: default_max_counters(),
            max_improvements: default_max_improvements(),
            unspendable_cash: 0,
        }
    }
}

/// Play one turn for `player`
pub async fn make_a_move(
    table: &mut AgentTable,
    player: PlayerId,
    state: &mut GameState,
    engine: &mut dyn MoveEngine,
    settings: &TurnSettings,
    log: &dyn LogSink,
) -> MoveResult {
    let is_agent = state
        .player(player)
        .is_some_and(|p| p.agent_controlled && !p.is_bankrupt);
    if !is_agent || !table.contains(player) {
        return engine.make_a_move(state, player, None, log).await;
    }

    let plan = match table.get_mut(player) {
        Some(seat) => seat.plan_turn(state, log).await,
        None => Default::default(),
    };

    if let Some(proposal) = plan.proposal {
        trade_with(table, proposal, state, settings, log).await;
    }
    if !plan.improvements.is_empty() {
        if let Some(seat) = table.get(player) {
            apply_improvements(seat, &plan.improvements, state, settings, log);
        }
    }

    engine.make_a_move(state, player, table.get_mut(player), log).await
}

/// Negotiate `proposal` and execute it if both sides agree
async fn trade_with(
    table: &mut AgentTable,
    proposal: TradeProposal,
    state: &mut GameState,
    settings: &TurnSettings,
    log: &dyn LogSink,
) {
    let target_is_agent = state
        .player(proposal.target)
        .is_some_and(|p| p.agent_controlled);
    let Some((from, to)) = table
        .pair_mut(proposal.proposer, proposal.target)
        .filter(|_| target_is_agent)
    else {
        log.add(format!(
            "Trade skipped: {} is not an agent",
            state.name_of(proposal.target)
        ));
        return;
    };

    let outcome = Negotiator::new(settings.max_counters)
        .negotiate(from, to, proposal, state, log)
        .await;
    if !outcome.success() {
        return;
    }

    match trade::execute(outcome.proposer, outcome.responder, &outcome.proposal, state) {
        Ok(receipt) => log.add(format!(
            "Trade completed: {} ({} for {} properties)",
            outcome.proposal.summary(state),
            receipt.given.len(),
            receipt.received.len()
        )),
        Err(reason) => {
            tracing::warn!(reason = %reason, "Agreed trade rejected");
            log.add(format!("Trade rejected: {reason}"));
        }
    }
}

/// Build on each planned name in order, stopping at the first name that is
/// not buildable or would break the reserve
fn apply_improvements(
    seat: &AgentSeat,
    names: &[String],
    state: &mut GameState,
    settings: &TurnSettings,
    log: &dyn LogSink,
) -> usize {
    let mut built = 0;
    for name in names.iter().take(settings.max_improvements) {
        let Some(id) = planned_target(state, seat.player(), name) else {
            log.add(format!("{} cannot build on {name} now", seat.name()));
            break;
        };
        if !seat.build(state, id, settings, log) {
            break;
        }
        built += 1;
    }
    built
}

fn planned_target(state: &GameState, player: PlayerId, name: &str) -> Option<PropertyId> {
    let candidates = state.improvable(player);
    let props: Vec<&Property> = candidates
        .iter()
        .filter_map(|id| state.board.property(*id))
        .collect();
    parser::parse_improve(&format!("IMPROVE:{name}"), &props).map(|p| p.id)
}
