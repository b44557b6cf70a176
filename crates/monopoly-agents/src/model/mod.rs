//! Domain Models
//!
//! The slice of the Monopoly board the agent subsystem reads and mutates:
//! properties, colour groups, owners, improvements and player cash. Rent,
//! dice and movement live behind [`crate::turn::MoveEngine`].

mod board;
mod game;
mod player;

pub use board::{Board, Cell, Improvement, Property, PropertyId};
pub use game::GameState;
pub use player::{Player, PlayerId};

/// Groups that can never hold houses
pub const RAILROADS: &str = "Railroads";
pub const UTILITIES: &str = "Utilities";

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A short board: two colour groups, one railroad, and the jail cell.
    ///
    /// | cell | property          | group      |
    /// |------|-------------------|------------|
    /// | 0    | Go                |            |
    /// | 1    | A1 Mediterranean  | Brown      |
    /// | 2    | A2 Baltic         | Brown      |
    /// | 3    | R1 Reading RR     | Railroads  |
    /// | 4    | Jail              |            |
    /// | 5    | H1 Park Place     | Dark Blue  |
    /// | 6    | H2 Boardwalk      | Dark Blue  |
    pub fn board() -> Board {
        let mut board = Board::new();
        board.push_cell("Go");
        board.push_property("A1 Mediterranean", "Brown", 60, 2, 50);
        board.push_property("A2 Baltic", "Brown", 60, 4, 50);
        board.push_property("R1 Reading RR", RAILROADS, 200, 25, 0);
        board.push_cell("Jail");
        board.push_property("H1 Park Place", "Dark Blue", 350, 35, 200);
        board.push_property("H2 Boardwalk", "Dark Blue", 400, 50, 200);
        board
    }

    pub fn brown(board: &Board) -> (PropertyId, PropertyId) {
        let ids = board.group("Brown");
        (ids[0], ids[1])
    }

    pub fn dark_blue(board: &Board) -> (PropertyId, PropertyId) {
        let ids = board.group("Dark Blue");
        (ids[0], ids[1])
    }

    /// Alice (agent), Bob (agent), Carol (rules); $1500 each.
    ///
    /// Alice owns Park Place, Bob owns Boardwalk and Mediterranean.
    pub fn game() -> GameState {
        let mut state = GameState::new(board());
        let alice = state.add_player("Alice", 1500, true);
        let bob = state.add_player("Bob", 1500, true);
        state.add_player("Carol", 1500, false);

        let (park_place, boardwalk) = dark_blue(&state.board);
        let (mediterranean, _) = brown(&state.board);
        state.assign_property(alice, park_place);
        state.assign_property(bob, boardwalk);
        state.assign_property(bob, mediterranean);
        state
    }
}
