//! Context Builder
//!
//! Compact snapshot of opponents and board prepended to every prompt.
//!
//! ```text
//! Players:
//! Bob:$1500,2props(A1 Mediterranean,H2 Boardwalk),at Go
//!
//! Board:
//! Brown:A1 Mediterranean:Bob|A2 Baltic:None
//! Dark Blue:H1 Park Place:Alice:2H|H2 Boardwalk:Bob:M
//! ```

use std::fmt::Write;

use crate::model::{GameState, PlayerId, Property};

/// Opponent property names listed before the `(N total)` marker
const LISTED_PROPERTIES: usize = 5;

/// Snapshot as seen by `player`. Identical state yields identical text.
pub fn build(player: PlayerId, state: &GameState) -> String {
    let mut lines: Vec<String> = Vec::new();
    let board = &state.board;

    let mut opponents = state.opponents(player).peekable();
    if opponents.peek().is_some() {
        lines.push("Players:".into());
    }
    for p in opponents {
        let total = format!("({} total)", p.owned.len());
        let mut props: Vec<&str> = p
            .owned
            .iter()
            .take(LISTED_PROPERTIES)
            .map(|id| board.name_of(*id))
            .collect();
        if p.owned.len() > LISTED_PROPERTIES {
            props.push(&total);
        }

        let houses = p.houses(board);
        let hotels = p.hotels(board);
        let improvements = if houses > 0 || hotels > 0 {
            format!(",{houses}H,{hotels}hotels")
        } else {
            String::new()
        };

        lines.push(format!(
            "{}:${},{}props({}){},at {}",
            p.name,
            p.money,
            p.owned.len(),
            props.join(","),
            improvements,
            board.cell_name(p.position)
        ));
    }

    lines.push("\nBoard:".into());
    for (group, members) in &board.groups {
        let details: Vec<String> = members
            .iter()
            .filter_map(|id| board.property(*id))
            .map(|p| format!("{}:{}", p.name, status(p, state)))
            .collect();
        lines.push(format!("{group}:{}", details.join("|")));
    }

    lines.join("\n")
}

/// `owner[:HOTEL|:nH][:M]`
fn status(property: &Property, state: &GameState) -> String {
    let mut status = property
        .owner
        .map_or_else(|| "None".to_string(), |o| state.name_of(o).to_string());
    if property.hotel {
        status.push_str(":HOTEL");
    } else if property.houses > 0 {
        let _ = write!(status, ":{}H", property.houses);
    }
    if property.mortgaged {
        status.push_str(":M");
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures;

    #[test]
    fn test_snapshot_format() {
        let mut state = fixtures::game();
        let (park_place, boardwalk) = fixtures::dark_blue(&state.board);
        state.board.property_mut(park_place).unwrap().houses = 2;
        state.board.property_mut(boardwalk).unwrap().mortgaged = true;
        state.players[1].position = 4;

        let text = build(PlayerId(0), &state);
        let expected = "Players:\n\
            Bob:$1500,2props(H2 Boardwalk,A1 Mediterranean),at Jail\n\
            Carol:$1500,0props(),at Go\n\
            \n\
            Board:\n\
            Brown:A1 Mediterranean:Bob|A2 Baltic:None\n\
            Dark Blue:H1 Park Place:Alice:2H|H2 Boardwalk:Bob:M\n\
            Railroads:R1 Reading RR:None";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_improvements_and_truncation() {
        let mut state = fixtures::game();
        let carol = PlayerId(2);
        let ids: Vec<_> = state.board.properties.iter().map(|p| p.id).collect();
        for id in &ids {
            state.board.property_mut(*id).unwrap().owner = None;
        }
        for p in &mut state.players {
            p.owned.clear();
        }
        for id in ids {
            state.assign_property(carol, id);
        }
        let (_, boardwalk) = fixtures::dark_blue(&state.board);
        state.board.property_mut(boardwalk).unwrap().hotel = true;

        let text = build(PlayerId(0), &state);
        assert!(text.contains(
            "Carol:$1500,5props(A1 Mediterranean,A2 Baltic,R1 Reading RR,H1 Park Place,H2 Boardwalk),0H,1hotels,at Go"
        ));
        assert!(text.contains("H2 Boardwalk:Carol:HOTEL"));

        state.board.push_property("Z1 Extra", "Zeta", 100, 10, 50);
        let extra = state.board.group("Zeta")[0];
        state.assign_property(carol, extra);
        let text = build(PlayerId(0), &state);
        assert!(text.contains("6props(A1 Mediterranean,A2 Baltic,R1 Reading RR,H1 Park Place,H2 Boardwalk,(6 total))"));
    }

    #[test]
    fn test_snapshot_is_deterministic() {
        let state = fixtures::game();
        assert_eq!(build(PlayerId(1), &state), build(PlayerId(1), &state));
        assert!(!build(PlayerId(1), &state).contains("Bob:$"));
    }
}
