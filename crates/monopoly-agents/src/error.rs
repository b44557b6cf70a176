//! Error Types for Monopoly Agents

use thiserror::Error;

use crate::model::PlayerId;

/// Why an agreed trade was not applied. State is untouched in every case.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TradeRejection {
    #[error("Proposal parties do not match the negotiating players")]
    PartyMismatch,

    #[error("A player cannot trade with themselves")]
    SameParty,

    #[error("Unknown player {0}")]
    UnknownPlayer(PlayerId),

    #[error("{0} is bankrupt")]
    Bankrupt(String),

    #[error("{0} is offered on both sides")]
    Overlap(String),

    #[error("Nothing changes hands")]
    EmptyTrade,

    #[error("{owner} does not own {property}")]
    NotOwned { owner: String, property: String },

    #[error("{payer} cannot cover ${amount} (has ${available})")]
    InsufficientCash {
        payer: String,
        amount: i64,
        available: i64,
    },
}

/// Failures of the game-log writer task
#[derive(Error, Debug)]
pub enum LogError {
    #[error("Log file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Log writer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
