use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::player::PlayerId;
use super::{RAILROADS, UTILITIES};

/// Index into [`Board::properties`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyId(pub usize);

/// A purchasable cell
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,

    /// Display name, prefixed with its cell code (e.g. "H2 Boardwalk")
    pub name: String,

    /// Colour group (or [`RAILROADS`] / [`UTILITIES`])
    pub group: String,

    /// Purchase price
    pub cost: i64,

    /// Base rent, unimproved
    pub rent: i64,

    /// Price of one house; a hotel costs the same
    pub cost_house: i64,

    pub owner: Option<PlayerId>,

    /// Houses built, 0-4; reset to 0 when a hotel goes up
    pub houses: u8,

    pub hotel: bool,

    pub mortgaged: bool,

    /// 2 when one player owns the whole group, else 1
    pub monopoly_multiplier: u8,
}

impl Property {
    pub fn is_improved(&self) -> bool {
        self.houses > 0 || self.hotel
    }

    /// Level the next build would reach: `house1`..`house4`, then `hotel`
    pub fn next_level(&self) -> String {
        if self.houses == 4 {
            "hotel".into()
        } else {
            format!("house{}", self.houses + 1)
        }
    }
}

impl std::fmt::Display for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// One square on the board
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cell {
    pub name: String,
    pub property: Option<PropertyId>,
}

/// Result of a single build
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Improvement {
    /// House number `n` went up
    House(u8),
    Hotel,
}

/// Board topology and the shared house/hotel bank
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Board {
    pub cells: Vec<Cell>,
    pub properties: Vec<Property>,

    /// Group name to its properties in board order; sorted by name
    pub groups: BTreeMap<String, Vec<PropertyId>>,

    pub available_houses: u32,
    pub available_hotels: u32,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Self {
            cells: Vec::new(),
            properties: Vec::new(),
            groups: BTreeMap::new(),
            available_houses: 32,
            available_hotels: 12,
        }
    }

    /// Append a non-purchasable cell; returns its position
    pub fn push_cell(&mut self, name: impl Into<String>) -> usize {
        self.cells.push(Cell {
            name: name.into(),
            property: None,
        });
        self.cells.len() - 1
    }

    /// Append a purchasable cell
    pub fn push_property(
        &mut self,
        name: impl Into<String>,
        group: impl Into<String>,
        cost: i64,
        rent: i64,
        cost_house: i64,
    ) -> PropertyId {
        let id = PropertyId(self.properties.len());
        let name = name.into();
        let group = group.into();

        self.groups.entry(group.clone()).or_default().push(id);
        self.cells.push(Cell {
            name: name.clone(),
            property: Some(id),
        });
        self.properties.push(Property {
            id,
            name,
            group,
            cost,
            rent,
            cost_house,
            owner: None,
            houses: 0,
            hotel: false,
            mortgaged: false,
            monopoly_multiplier: 1,
        });
        id
    }

    pub fn property(&self, id: PropertyId) -> Option<&Property> {
        self.properties.get(id.0)
    }

    pub fn property_mut(&mut self, id: PropertyId) -> Option<&mut Property> {
        self.properties.get_mut(id.0)
    }

    /// Name of a property, or an empty string for a stale id
    pub fn name_of(&self, id: PropertyId) -> &str {
        self.property(id).map_or("", |p| p.name.as_str())
    }

    /// Property on the cell at `position`, if any
    pub fn property_at(&self, position: usize) -> Option<PropertyId> {
        self.cells.get(position).and_then(|c| c.property)
    }

    pub fn cell_name(&self, position: usize) -> &str {
        self.cells.get(position).map_or("?", |c| c.name.as_str())
    }

    /// Members of `group` in board order
    pub fn group(&self, group: &str) -> &[PropertyId] {
        self.groups.get(group).map_or(&[], Vec::as_slice)
    }

    /// Re-derive the monopoly multiplier of every property in `id`'s group
    pub fn recalculate_monopoly_multipliers(&mut self, id: PropertyId) {
        let Some(group) = self.property(id).map(|p| p.group.clone()) else {
            return;
        };
        let members = self.group(&group).to_vec();

        let first_owner = members
            .first()
            .and_then(|m| self.property(*m))
            .and_then(|p| p.owner);
        let monopoly = first_owner.is_some()
            && members
                .iter()
                .all(|m| self.property(*m).is_some_and(|p| p.owner == first_owner));

        for member in members {
            if let Some(p) = self.property_mut(member) {
                p.monopoly_multiplier = if monopoly { 2 } else { 1 };
            }
        }
    }

    /// Properties from `owned` that may take one more build right now.
    ///
    /// A property qualifies when its owner holds the whole colour group, it
    /// has no hotel and no mortgage, no group member is mortgaged or lags
    /// behind it in houses (even building), and the bank still has a house
    /// (or a hotel, at four houses).
    pub fn improvable(&self, owned: &[PropertyId]) -> Vec<PropertyId> {
        owned
            .iter()
            .filter_map(|id| self.property(*id))
            .filter(|p| {
                !p.hotel
                    && !p.mortgaged
                    && p.monopoly_multiplier == 2
                    && p.group != RAILROADS
                    && p.group != UTILITIES
            })
            .filter(|p| {
                self.group(&p.group).iter().filter_map(|m| self.property(*m)).all(|other| {
                    !other.mortgaged && (other.hotel || other.houses >= p.houses)
                })
            })
            .filter(|p| {
                if p.houses == 4 {
                    self.available_hotels > 0
                } else {
                    self.available_houses > 0
                }
            })
            .map(|p| p.id)
            .collect()
    }

    /// Put up the next house (or the hotel) on `id` and update the bank.
    /// Cash is the caller's business.
    pub fn build(&mut self, id: PropertyId) -> Option<Improvement> {
        let houses_left = self.available_houses;
        let hotels_left = self.available_hotels;
        let property = self.properties.get_mut(id.0)?;
        if property.hotel {
            return None;
        }

        if property.houses == 4 {
            if hotels_left == 0 {
                return None;
            }
            property.houses = 0;
            property.hotel = true;
            self.available_houses += 4;
            self.available_hotels -= 1;
            Some(Improvement::Hotel)
        } else {
            if houses_left == 0 {
                return None;
            }
            property.houses += 1;
            let built = property.houses;
            self.available_houses -= 1;
            Some(Improvement::House(built))
        }
    }
}
