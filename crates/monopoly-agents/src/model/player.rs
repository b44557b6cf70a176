use serde::{Deserialize, Serialize};

use super::board::{Board, PropertyId};

/// Index into [`super::GameState::players`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub usize);

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A seat at the table
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub money: i64,

    /// Cell index on the board
    pub position: usize,

    /// Properties in acquisition order
    pub owned: Vec<PropertyId>,

    pub is_bankrupt: bool,

    /// Decisions come from an agent rather than fixed rules.
    /// Fixed at construction.
    pub agent_controlled: bool,

    /// Own properties this player is willing to trade away
    pub tradeable: Vec<PropertyId>,

    /// Opponents' properties in groups this player has a stake in
    pub wanted: Vec<PropertyId>,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, money: i64, agent_controlled: bool) -> Self {
        Self {
            id,
            name: name.into(),
            money,
            position: 0,
            owned: Vec::new(),
            is_bankrupt: false,
            agent_controlled,
            tradeable: Vec::new(),
            wanted: Vec::new(),
        }
    }

    /// Cash plus the face value of property and buildings; mortgaged
    /// property counts for half
    pub fn net_worth(&self, board: &Board) -> i64 {
        let holdings: i64 = self
            .owned
            .iter()
            .filter_map(|id| board.property(*id))
            .map(|p| {
                let land = if p.mortgaged { p.cost / 2 } else { p.cost };
                let buildings = i64::from(p.houses) + if p.hotel { 5 } else { 0 };
                land + buildings * p.cost_house
            })
            .sum();
        self.money + holdings
    }

    /// Houses across all owned properties
    pub fn houses(&self, board: &Board) -> u32 {
        self.owned
            .iter()
            .filter_map(|id| board.property(*id))
            .map(|p| u32::from(p.houses))
            .sum()
    }

    pub fn hotels(&self, board: &Board) -> u32 {
        let count = self
            .owned
            .iter()
            .filter_map(|id| board.property(*id))
            .filter(|p| p.hotel)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    pub fn owns(&self, id: PropertyId) -> bool {
        self.owned.contains(&id)
    }

    /// Resolve a property name as an agent wrote it.
    ///
    /// Case-insensitive; an exact name wins, otherwise the first owned
    /// property whose name contains `needle`.
    pub fn find_owned(&self, board: &Board, needle: &str) -> Option<PropertyId> {
        let needle = needle.trim().to_uppercase();
        if needle.is_empty() {
            return None;
        }
        let mut partial = None;
        for property in self.owned.iter().filter_map(|id| board.property(*id)) {
            let name = property.name.to_uppercase();
            if name == needle {
                return Some(property.id);
            }
            if partial.is_none() && name.contains(&needle) {
                partial = Some(property.id);
            }
        }
        partial
    }

    /// Rebuild the `tradeable` and `wanted` caches.
    ///
    /// Tradeable: own unimproved properties outside a completed group.
    /// Wanted: properties held by someone else in a group where this player
    /// owns at least one member.
    pub fn update_lists_of_properties_to_trade(&mut self, board: &Board) {
        self.tradeable = self
            .owned
            .iter()
            .filter_map(|id| board.property(*id))
            .filter(|p| !p.is_improved() && p.monopoly_multiplier == 1)
            .map(|p| p.id)
            .collect();

        let mut groups: Vec<&str> = self
            .owned
            .iter()
            .filter_map(|id| board.property(*id))
            .map(|p| p.group.as_str())
            .collect();
        groups.sort_unstable();
        groups.dedup();

        self.wanted = groups
            .into_iter()
            .flat_map(|g| board.group(g).iter())
            .filter_map(|id| board.property(*id))
            .filter(|p| p.owner.is_some_and(|o| o != self.id))
            .map(|p| p.id)
            .collect();
    }
}

impl std::fmt::Display for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
