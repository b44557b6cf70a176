use serde::{Deserialize, Serialize};

use super::board::{Board, Improvement, PropertyId};
use super::player::{Player, PlayerId};

/// Board plus players for one game. Owned by the game loop; everything in
/// this crate borrows it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameState {
    pub board: Board,
    pub players: Vec<Player>,
}

impl GameState {
    pub fn new(board: Board) -> Self {
        Self {
            board,
            players: Vec::new(),
        }
    }

    /// Seat a player; `agent_controlled` is fixed for the whole game
    pub fn add_player(&mut self, name: impl Into<String>, money: i64, agent_controlled: bool) -> PlayerId {
        let id = PlayerId(self.players.len());
        self.players.push(Player::new(id, name, money, agent_controlled));
        id
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id.0)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id.0)
    }

    /// Case-insensitive lookup, as agents spell names however they like
    pub fn player_by_name(&self, name: &str) -> Option<&Player> {
        let name = name.trim();
        self.players
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn name_of(&self, id: PlayerId) -> &str {
        self.player(id).map_or("?", |p| p.name.as_str())
    }

    /// Everyone still in the game except `id`
    pub fn opponents(&self, id: PlayerId) -> impl Iterator<Item = &Player> {
        self.players
            .iter()
            .filter(move |p| p.id != id && !p.is_bankrupt)
    }

    /// Hand an unowned property to `owner` without payment (game setup)
    pub fn assign_property(&mut self, owner: PlayerId, property: PropertyId) {
        self.transfer_property(property, None, owner);
        self.refresh_trade_lists();
    }

    /// Move ownership of `property` from `from` (or the bank) to `to` and
    /// recompute the group's multiplier. Trade caches are left stale.
    pub(crate) fn transfer_property(&mut self, property: PropertyId, from: Option<PlayerId>, to: PlayerId) {
        if let Some(p) = self.board.property_mut(property) {
            p.owner = Some(to);
        }
        if let Some(seller) = from.and_then(|id| self.players.get_mut(id.0)) {
            seller.owned.retain(|id| *id != property);
        }
        if let Some(buyer) = self.players.get_mut(to.0) {
            buyer.owned.push(property);
        }
        self.board.recalculate_monopoly_multipliers(property);
    }

    /// Buy the unowned `property` at list price. False if it is taken or
    /// the player cannot afford it.
    pub fn purchase(&mut self, buyer: PlayerId, property: PropertyId) -> bool {
        let Some(cost) = self
            .board
            .property(property)
            .filter(|p| p.owner.is_none())
            .map(|p| p.cost)
        else {
            return false;
        };
        match self.player_mut(buyer) {
            Some(player) if player.money >= cost => player.money -= cost,
            _ => return false,
        }
        self.transfer_property(property, None, buyer);
        self.refresh_trade_lists();
        true
    }

    /// Build on `property` and charge its owner `cost_house`
    pub fn improve(&mut self, owner: PlayerId, property: PropertyId) -> Option<(Improvement, i64)> {
        let cost = self
            .board
            .property(property)
            .filter(|p| p.owner == Some(owner))?
            .cost_house;
        let improvement = self.board.build(property)?;
        if let Some(player) = self.player_mut(owner) {
            player.money -= cost;
        }
        self.refresh_trade_lists();
        Some((improvement, cost))
    }

    /// Candidates for the next build by `owner`
    pub fn improvable(&self, owner: PlayerId) -> Vec<PropertyId> {
        self.player(owner)
            .map(|p| self.board.improvable(&p.owned))
            .unwrap_or_default()
    }

    /// Every player re-derives their trade caches
    pub fn refresh_trade_lists(&mut self) {
        let board = &self.board;
        for player in &mut self.players {
            player.update_lists_of_properties_to_trade(board);
        }
    }
}
