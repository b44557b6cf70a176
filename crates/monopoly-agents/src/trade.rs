//! Trade Executor
//!
//! Applies an agreed proposal in two phases. Validation resolves every name
//! and checks every precondition without touching state; mutation only
//! starts once all of them hold, so a rejected trade leaves cash and
//! ownership exactly as they were.

use crate::error::TradeRejection;
use crate::model::{GameState, Player, PlayerId, PropertyId};
use crate::negotiation::TradeProposal;

/// What changed hands
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TradeReceipt {
    pub proposer: PlayerId,
    pub responder: PlayerId,

    /// Moved proposer -> responder
    pub given: Vec<PropertyId>,

    /// Moved responder -> proposer
    pub received: Vec<PropertyId>,

    /// Positive: proposer paid responder
    pub cash: i64,
}

/// Validate `proposal` and apply it to `state`, or explain why not
pub fn execute(
    proposer: PlayerId,
    responder: PlayerId,
    proposal: &TradeProposal,
    state: &mut GameState,
) -> Result<TradeReceipt, TradeRejection> {
    let receipt = validate(proposer, responder, proposal, state)?;
    apply(&receipt, state);

    tracing::info!(
        proposer = %state.name_of(proposer),
        responder = %state.name_of(responder),
        given = receipt.given.len(),
        received = receipt.received.len(),
        cash = receipt.cash,
        "Trade executed"
    );
    Ok(receipt)
}

fn validate(
    proposer: PlayerId,
    responder: PlayerId,
    proposal: &TradeProposal,
    state: &GameState,
) -> Result<TradeReceipt, TradeRejection> {
    if proposal.proposer != proposer || proposal.target != responder {
        return Err(TradeRejection::PartyMismatch);
    }
    if proposer == responder {
        return Err(TradeRejection::SameParty);
    }

    let from = state.player(proposer).ok_or(TradeRejection::UnknownPlayer(proposer))?;
    let to = state.player(responder).ok_or(TradeRejection::UnknownPlayer(responder))?;
    for player in [from, to] {
        if player.is_bankrupt {
            return Err(TradeRejection::Bankrupt(player.name.clone()));
        }
    }

    if let Some(name) = proposal.overlap() {
        return Err(TradeRejection::Overlap(name));
    }
    if proposal.is_empty() {
        return Err(TradeRejection::EmptyTrade);
    }

    let given = resolve(from, &proposal.give, state)?;
    let received = resolve(to, &proposal.receive, state)?;

    let (payer, amount) = if proposal.cash >= 0 {
        (from, proposal.cash)
    } else {
        (to, proposal.cash.saturating_neg())
    };
    if payer.money < amount {
        return Err(TradeRejection::InsufficientCash {
            payer: payer.name.clone(),
            amount,
            available: payer.money,
        });
    }

    Ok(TradeReceipt {
        proposer,
        responder,
        given,
        received,
        cash: proposal.cash,
    })
}

/// Every name must hit a distinct property owned by `owner`
fn resolve(owner: &Player, names: &[String], state: &GameState) -> Result<Vec<PropertyId>, TradeRejection> {
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        let id = owner
            .find_owned(&state.board, name)
            .ok_or_else(|| TradeRejection::NotOwned {
                owner: owner.name.clone(),
                property: name.clone(),
            })?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn apply(receipt: &TradeReceipt, state: &mut GameState) {
    for id in &receipt.given {
        state.transfer_property(*id, Some(receipt.proposer), receipt.responder);
    }
    for id in &receipt.received {
        state.transfer_property(*id, Some(receipt.responder), receipt.proposer);
    }

    if let Some(p) = state.player_mut(receipt.proposer) {
        p.money -= receipt.cash;
    }
    if let Some(p) = state.player_mut(receipt.responder) {
        p.money += receipt.cash;
    }

    state.refresh_trade_lists();
}
