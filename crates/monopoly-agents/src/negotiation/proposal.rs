use serde::{Deserialize, Serialize};

use crate::model::{GameState, PlayerId};
use crate::parser::{ProposalDraft, TradeTerms};

/// A concrete offer between two players. Property names are kept as the
/// agents wrote them and resolved only when the trade executes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeProposal {
    pub proposer: PlayerId,
    pub target: PlayerId,

    /// Proposer hands these to the target
    pub give: Vec<String>,

    /// Target hands these to the proposer
    pub receive: Vec<String>,

    /// Positive: proposer pays target. Negative: target pays proposer.
    pub cash: i64,
}

impl TradeProposal {
    pub fn new(proposer: PlayerId, target: PlayerId, terms: TradeTerms) -> Self {
        Self {
            proposer,
            target,
            give: terms.give,
            receive: terms.receive,
            cash: terms.cash,
        }
    }

    /// Bind a parsed draft to real players. `None` when the target is
    /// unknown or is the proposer.
    pub fn from_draft(proposer: PlayerId, draft: ProposalDraft, state: &GameState) -> Option<Self> {
        let target = state.player_by_name(&draft.target)?.id;
        (target != proposer).then(|| Self::new(proposer, target, draft.terms))
    }

    /// Terms as the proposer would write them
    pub fn terms(&self) -> TradeTerms {
        TradeTerms {
            give: self.give.clone(),
            receive: self.receive.clone(),
            cash: self.cash,
        }
    }

    /// The responder's counter, written from the responder's side
    pub fn counter(&self, terms: TradeTerms) -> Self {
        Self::new(self.target, self.proposer, terms)
    }

    /// A name offered on both sides
    pub fn overlap(&self) -> Option<String> {
        self.terms().overlap().map(ToString::to_string)
    }

    pub fn is_empty(&self) -> bool {
        self.give.is_empty() && self.receive.is_empty() && self.cash == 0
    }

    /// `Alice gives [H1 Park Place] + $200 for Bob's [H2 Boardwalk]`
    pub fn summary(&self, state: &GameState) -> String {
        let mut text = format!("{} gives [{}]", state.name_of(self.proposer), self.give.join(", "));
        if self.cash > 0 {
            text.push_str(&format!(" + ${}", self.cash));
        }
        text.push_str(&format!(" for {}'s [{}]", state.name_of(self.target), self.receive.join(", ")));
        if self.cash < 0 {
            text.push_str(&format!(" + ${}", self.cash.unsigned_abs()));
        }
        text
    }

    /// Offer, counters left and reply grammar, as the target sees it
    pub fn offer_prompt(&self, state: &GameState, counters_left: u32) -> String {
        let decision = if counters_left > 0 {
            "Decision:TRADE_ACCEPT or TRADE_REJECT or TRADE_COUNTER:<you give>:<you get>:<cash you pay, negative to receive>"
        } else {
            "Decision:TRADE_ACCEPT or TRADE_REJECT"
        };
        format!(
            "{}\nCounters left:{counters_left}\n{decision}",
            self.describe_offer(state)
        )
    }

    /// What the target gets and gives
    pub fn describe_offer(&self, state: &GameState) -> String {
        let mut get = self.give.clone();
        let mut pay = self.receive.clone();
        match self.cash {
            c if c > 0 => get.push(format!("${c}")),
            c if c < 0 => pay.push(format!("${}", c.unsigned_abs())),
            _ => {}
        }
        let list = |items: &[String]| {
            if items.is_empty() {
                "nothing".to_string()
            } else {
                items.join(",")
            }
        };

        format!(
            "Trade offer from {}:\nYou get:{}\nYou give:{}",
            state.name_of(self.proposer),
            list(&get),
            list(&pay),
        )
    }
}
