//! Agent Seats
//!
//! An [`AgentSeat`] binds one agent-controlled player to its chat session
//! and transport. Every prompt carries the full context snapshot, every
//! reply goes through the parser, and every outcome is written to the game
//! log.

use std::path::{Path, PathBuf};

use agent_core::{ChatSession, LogSink, Transport};

use crate::context;
use crate::model::{GameState, Improvement, Player, PlayerId, Property, PropertyId};
use crate::negotiation::TradeProposal;
use crate::parser::{self, JailChoice};
use crate::turn::TurnSettings;
use crate::AGENT_SYSTEM_PROMPT;

/// Decoded batched-strategy answer, bound to real players
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TurnPlan {
    pub proposal: Option<TradeProposal>,

    /// Property names to build on, in the order the agent listed them
    pub improvements: Vec<String>,
}

/// One agent-controlled player
pub struct AgentSeat {
    player: PlayerId,
    session: ChatSession,
    transport: Transport,
}

impl AgentSeat {
    /// The session is seeded with the transport's system prompt, or the
    /// default agent prompt when none is configured
    pub fn new(player: PlayerId, name: impl Into<String>, transport: Transport) -> Self {
        let system = transport
            .options()
            .system_prompt
            .clone()
            .unwrap_or_else(|| AGENT_SYSTEM_PROMPT.to_string());
        Self {
            player,
            session: ChatSession::new(name, system),
            transport,
        }
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    pub fn name(&self) -> &str {
        self.session.owner()
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Send `prompt` behind the context snapshot; always returns text
    pub async fn ask(&mut self, state: &GameState, prompt: &str) -> String {
        let message = format!("{}\n\n{prompt}", context::build(self.player, state));
        self.transport.send(&mut self.session, &message).await
    }

    /// Write the chat history to `game_<n>_<name>_chat_history.txt` in `dir`
    pub async fn save_transcript(&self, dir: &Path, game: u64) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("game_{game}_{}_chat_history.txt", self.name()));
        tokio::fs::write(&path, self.session.transcript()).await?;
        Ok(path)
    }

    fn me<'s>(&self, state: &'s GameState) -> Option<&'s Player> {
        state.player(self.player)
    }

    /// `You:$1500,net$1850,pos Go`
    fn status_line(&self, state: &GameState) -> String {
        self.me(state).map_or_else(String::new, |p| {
            format!(
                "You:${},net${},pos {}",
                p.money,
                p.net_worth(&state.board),
                state.board.cell_name(p.position)
            )
        })
    }

    /// Ask whether to buy the unowned `property`
    pub async fn decide_purchase(&mut self, state: &GameState, property: PropertyId, log: &dyn LogSink) -> bool {
        let (Some(me), Some(prop)) = (self.me(state), state.board.property(property)) else {
            return false;
        };

        let members = state.board.group(&prop.group);
        let owned_in_group = members.iter().filter(|id| me.owns(**id)).count();
        let same_group: Vec<String> = members
            .iter()
            .filter(|id| **id != property)
            .filter_map(|id| state.board.property(*id))
            .map(|p| {
                let owner = p.owner.map_or("None", |o| state.name_of(o));
                let level = if p.hotel {
                    ":HOTEL".to_string()
                } else if p.houses > 0 {
                    format!(":{}H", p.houses)
                } else {
                    String::new()
                };
                format!("{}:{owner}{level}", p.name)
            })
            .collect();

        let prompt = format!(
            "{},{}props,{}={}/{}\nProperty:{},cost${},rent${},after${}\nSame group:{}\nDecision:BUY or PASS",
            self.status_line(state),
            me.owned.len(),
            prop.group,
            owned_in_group,
            members.len(),
            prop.name,
            prop.cost,
            prop.rent,
            me.money - prop.cost,
            if same_group.is_empty() {
                "None".to_string()
            } else {
                same_group.join("|")
            }
        );
        let name = prop.name.clone();

        let reply = self.ask(state, &prompt).await;
        let buy = parser::parse_buy(&reply);
        log.add(format!(
            "{} (agent) on {name}: {}",
            self.name(),
            if buy { "BUY" } else { "PASS" }
        ));
        buy
    }

    /// Landed on `property`: buy it if unowned, the agent wants it, and the
    /// cash is there
    pub async fn handle_landing(&mut self, state: &mut GameState, property: PropertyId, log: &dyn LogSink) -> bool {
        let Some(cost) = state
            .board
            .property(property)
            .filter(|p| p.owner.is_none())
            .map(|p| p.cost)
        else {
            return false;
        };

        let wants = self.decide_purchase(state, property, log).await;
        let name = state.board.name_of(property).to_string();
        if wants && state.purchase(self.player, property) {
            log.add(format!("{} (agent) bought {name} for ${cost}", self.name()));
            true
        } else {
            log.add(format!("{} (agent) passed on {name}", self.name()));
            false
        }
    }

    /// Ask which of `candidates` to build on next
    pub async fn choose_improvement(
        &mut self,
        state: &GameState,
        candidates: &[PropertyId],
        log: &dyn LogSink,
    ) -> Option<PropertyId> {
        let props: Vec<&Property> = candidates
            .iter()
            .filter_map(|id| state.board.property(*id))
            .collect();
        if props.is_empty() {
            return None;
        }

        let options: Vec<String> = props
            .iter()
            .map(|p| format!("{}:${},{}", p.name, p.cost_house, p.next_level()))
            .collect();
        let prompt = format!(
            "{}\nCan improve:{}\nDecision:IMPROVE:<name> or NO_IMPROVEMENT",
            self.status_line(state),
            options.join("|")
        );

        let reply = self.ask(state, &prompt).await;
        let choice = parser::parse_improve(&parser::clean(&reply), &props).map(|p| p.id);
        log.add(format!(
            "{} (agent) improvement choice: {}",
            self.name(),
            choice.map_or("NO_IMPROVEMENT", |id| state.board.name_of(id))
        ));
        choice
    }

    /// Build one step at a time while the agent keeps choosing and the
    /// cash reserve holds. Returns the number of builds.
    pub async fn improve_properties(
        &mut self,
        state: &mut GameState,
        settings: &TurnSettings,
        log: &dyn LogSink,
    ) -> usize {
        let mut built = 0;
        while built < settings.max_improvements {
            let candidates = state.improvable(self.player);
            if candidates.is_empty() {
                break;
            }
            let Some(choice) = self.choose_improvement(state, &candidates, log).await else {
                break;
            };
            if !self.build(state, choice, settings, log) {
                break;
            }
            built += 1;
        }
        built
    }

    /// Build on `property` unless that would dip below the reserve
    pub(crate) fn build(
        &self,
        state: &mut GameState,
        property: PropertyId,
        settings: &TurnSettings,
        log: &dyn LogSink,
    ) -> bool {
        let (Some(me), Some(prop)) = (self.me(state), state.board.property(property)) else {
            return false;
        };
        if me.money - prop.cost_house < settings.unspendable_cash {
            log.add(format!(
                "{} (agent) keeps ${} in reserve, not building on {}",
                self.name(),
                settings.unspendable_cash,
                prop.name
            ));
            return false;
        }

        match state.improve(self.player, property) {
            Some((Improvement::House(n), cost)) => {
                log.add(format!(
                    "{} (agent) built house #{n} on {} for ${cost}",
                    self.name(),
                    state.board.name_of(property)
                ));
                true
            }
            Some((Improvement::Hotel, cost)) => {
                log.add(format!(
                    "{} (agent) built hotel on {} for ${cost}",
                    self.name(),
                    state.board.name_of(property)
                ));
                true
            }
            None => false,
        }
    }

    /// Ask how to leave jail. A card is only used if the player has one.
    pub async fn decide_jail(&mut self, state: &GameState, has_card: bool, log: &dyn LogSink) -> JailChoice {
        let prompt = format!(
            "{},in jail,card:{}\nDecision:USE_GOOJF or PAY_FINE or WAIT",
            self.status_line(state),
            if has_card { "yes" } else { "no" }
        );

        let reply = self.ask(state, &prompt).await;
        let choice = match parser::parse_jail(&reply) {
            JailChoice::UseCard if !has_card => JailChoice::Wait,
            choice => choice,
        };
        log.add(format!("{} (agent) jail decision: {choice}", self.name()));
        choice
    }

    /// `Tradeable:...` and `Wanted:...` lines from the player's caches
    fn trade_lines(&self, state: &GameState) -> String {
        let Some(me) = self.me(state) else {
            return String::new();
        };
        let names = |ids: &[PropertyId], with_owner: bool| -> String {
            let items: Vec<String> = ids
                .iter()
                .filter_map(|id| state.board.property(*id))
                .map(|p| match (with_owner, p.owner) {
                    (true, Some(owner)) => format!("{}({})", p.name, state.name_of(owner)),
                    _ => p.name.clone(),
                })
                .collect();
            if items.is_empty() {
                "None".into()
            } else {
                items.join("|")
            }
        };
        format!(
            "Tradeable:{}\nWanted:{}",
            names(&me.tradeable, false),
            names(&me.wanted, true)
        )
    }

    /// Ask for a trade proposal. `None` on `NO_TRADE` or anything that
    /// does not name a real opponent.
    pub async fn propose_trade(&mut self, state: &GameState, log: &dyn LogSink) -> Option<TradeProposal> {
        let prompt = format!(
            "{}\n{}\nDecision:TRADE_PROPOSE:<player>:<you give>:<you get>:<cash you pay> or NO_TRADE",
            self.status_line(state),
            self.trade_lines(state)
        );

        let reply = self.ask(state, &prompt).await;
        let proposal = parser::parse_trade_proposal(&reply)
            .and_then(|draft| TradeProposal::from_draft(self.player, draft, state));
        match &proposal {
            Some(p) => log.add(format!("{} (agent) proposes: {}", self.name(), p.summary(state))),
            None => log.add(format!("{} (agent) proposes no trade", self.name())),
        }
        proposal
    }

    /// Plain accept/reject on an offer, no counters
    pub async fn respond_to_offer(&mut self, state: &GameState, proposal: &TradeProposal, log: &dyn LogSink) -> bool {
        let prompt = format!("{}\nDecision:ACCEPT or REJECT", proposal.describe_offer(state));

        let reply = self.ask(state, &prompt).await;
        let accepted = parser::parse_trade_decision(&reply);
        log.add(format!(
            "{} (agent) {} offer: {}",
            self.name(),
            if accepted { "accepted" } else { "rejected" },
            proposal.summary(state)
        ));
        accepted
    }

    /// One prompt for the whole turn: section A trade, section B builds
    pub async fn plan_turn(&mut self, state: &GameState, log: &dyn LogSink) -> TurnPlan {
        let improvable: Vec<String> = state
            .improvable(self.player)
            .iter()
            .filter_map(|id| state.board.property(*id))
            .map(|p| format!("{}:${},{}", p.name, p.cost_house, p.next_level()))
            .collect();
        let prompt = format!(
            "{}\n{}\nCan improve:{}\nAnswer both parts:\n\
             A) TRADE_PROPOSE:<player>:<you give>:<you get>:<cash you pay> or NO_TRADE\n\
             B) IMPROVE:<name>, IMPROVE:<name> or NO_IMPROVEMENT",
            self.status_line(state),
            self.trade_lines(state),
            if improvable.is_empty() {
                "None".to_string()
            } else {
                improvable.join("|")
            }
        );

        let reply = self.ask(state, &prompt).await;
        let strategy = parser::parse_batched_strategy(&reply);
        let plan = TurnPlan {
            proposal: strategy
                .trade_proposal
                .and_then(|draft| TradeProposal::from_draft(self.player, draft, state)),
            improvements: strategy.improvements,
        };
        log.add(format!(
            "{} (agent) plan: trade={} improvements=[{}]",
            self.name(),
            plan.proposal.as_ref().map_or_else(|| "NO_TRADE".to_string(), |p| p.summary(state)),
            plan.improvements.join(", ")
        ));
        plan
    }
}

/// All seats of one game
#[derive(Default)]
pub struct AgentTable {
    seats: Vec<AgentSeat>,
}

impl AgentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a seat, replacing any seat for the same player
    pub fn insert(&mut self, seat: AgentSeat) {
        self.seats.retain(|s| s.player != seat.player);
        self.seats.push(seat);
    }

    pub fn get(&self, player: PlayerId) -> Option<&AgentSeat> {
        self.seats.iter().find(|s| s.player == player)
    }

    pub fn get_mut(&mut self, player: PlayerId) -> Option<&mut AgentSeat> {
        self.seats.iter_mut().find(|s| s.player == player)
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.get(player).is_some()
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentSeat> {
        self.seats.iter()
    }

    /// Two distinct seats borrowed at once, in the order asked
    pub fn pair_mut(&mut self, a: PlayerId, b: PlayerId) -> Option<(&mut AgentSeat, &mut AgentSeat)> {
        let i = self.seats.iter().position(|s| s.player == a)?;
        let j = self.seats.iter().position(|s| s.player == b)?;
        if i == j {
            return None;
        }
        if i < j {
            let (left, right) = self.seats.split_at_mut(j);
            Some((&mut left[i], &mut right[0]))
        } else {
            let (left, right) = self.seats.split_at_mut(i);
            Some((&mut right[0], &mut left[j]))
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use agent_core::{GenerationOptions, StubProvider, Transport};

    use super::*;

    /// Seat answering from `replies`, then `PASS`
    pub fn seat(state: &GameState, name: &str, replies: &[&str]) -> (AgentSeat, Arc<StubProvider>) {
        let stub = Arc::new(StubProvider::replies("PASS", replies.iter().copied()));
        let player = state.player_by_name(name).map_or(PlayerId(usize::MAX), |p| p.id);
        let transport = Transport::new(stub.clone(), GenerationOptions::default());
        (AgentSeat::new(player, name, transport), stub)
    }
}

#[cfg(test)]
mod tests {
    use agent_core::MemorySink;

    use super::testing::seat;
    use super::*;
    use crate::model::fixtures;

    #[tokio::test]
    async fn test_ask_prepends_context() {
        let state = fixtures::game();
        let (mut alice, stub) = seat(&state, "Alice", &["BUY"]);

        assert_eq!(alice.ask(&state, "Decision:BUY or PASS").await, "BUY");
        let prompt = &alice.session().messages()[1].content;
        assert!(prompt.starts_with("Players:\nBob:$1500"));
        assert!(prompt.ends_with("\n\nDecision:BUY or PASS"));
        assert_eq!(alice.session().system_prompt(), AGENT_SYSTEM_PROMPT);
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn test_handle_landing_buys() {
        let mut state = fixtures::game();
        let log = MemorySink::new();
        let (_, baltic) = fixtures::brown(&state.board);
        let (mut alice, _) = seat(&state, "Alice", &["I'll BUY it"]);

        assert!(alice.handle_landing(&mut state, baltic, &log).await);
        assert_eq!(state.player(PlayerId(0)).unwrap().money, 1440);
        assert!(log.contains("Alice (agent) bought A2 Baltic for $60"));

        let prompt = &alice.session().messages()[1].content;
        assert!(prompt.contains("You:$1500,net$1850,pos Go,1props,Brown=0/2"));
        assert!(prompt.contains("Property:A2 Baltic,cost$60,rent$4,after$1440"));
        assert!(prompt.contains("Same group:A1 Mediterranean:Bob"));
    }

    #[tokio::test]
    async fn test_handle_landing_passes_when_told() {
        let mut state = fixtures::game();
        let log = MemorySink::new();
        let (_, baltic) = fixtures::brown(&state.board);
        let (mut alice, _) = seat(&state, "Alice", &["DON'T BUY"]);

        assert!(!alice.handle_landing(&mut state, baltic, &log).await);
        assert_eq!(state.player(PlayerId(0)).unwrap().money, 1500);
        assert!(log.contains("passed on A2 Baltic"));
    }

    #[tokio::test]
    async fn test_improve_properties_stops_at_reserve() {
        let mut state = fixtures::game();
        let log = MemorySink::new();
        let (mediterranean, baltic) = fixtures::brown(&state.board);
        let bob = PlayerId(1);
        state.assign_property(bob, baltic);
        state.players[1].money = 200;

        let (mut seat, stub) = seat(
            &state,
            "Bob",
            &["IMPROVE: MEDITERRANEAN", "Decision: IMPROVE:A2 Baltic", "IMPROVE:Mediterranean"],
        );
        let settings = TurnSettings {
            unspendable_cash: 75,
            ..TurnSettings::default()
        };

        let built = seat.improve_properties(&mut state, &settings, &log).await;
        assert_eq!(built, 2);
        assert_eq!(stub.calls(), 3);
        assert_eq!(state.player(bob).unwrap().money, 100);
        assert_eq!(state.board.property(mediterranean).unwrap().houses, 1);
        assert_eq!(state.board.property(baltic).unwrap().houses, 1);
        assert!(log.contains("built house #1 on A1 Mediterranean for $50"));
        assert!(log.contains("keeps $75 in reserve"));
    }

    #[tokio::test]
    async fn test_improve_properties_is_bounded() {
        let mut state = fixtures::game();
        let log = MemorySink::new();
        let (_, baltic) = fixtures::brown(&state.board);
        state.assign_property(PlayerId(1), baltic);

        let (mut seat, stub) = seat(&state, "Bob", &[]);
        for _ in 0..5 {
            stub.push(Ok("IMPROVE:A1".into()));
            stub.push(Ok("IMPROVE:A2".into()));
        }

        let built = seat.improve_properties(&mut state, &TurnSettings::default(), &log).await;
        assert_eq!(built, 5);
        assert_eq!(stub.calls(), 5);
    }

    #[tokio::test]
    async fn test_decide_jail_without_card_waits() {
        let state = fixtures::game();
        let log = MemorySink::new();
        let (mut alice, _) = seat(&state, "Alice", &["USE_GOOJF", "USE_GOOJF"]);

        assert_eq!(alice.decide_jail(&state, false, &log).await, JailChoice::Wait);
        assert_eq!(alice.decide_jail(&state, true, &log).await, JailChoice::UseCard);
    }

    #[tokio::test]
    async fn test_propose_trade() {
        let state = fixtures::game();
        let log = MemorySink::new();
        let (mut alice, _) = seat(&state, "Alice", &["TRADE_PROPOSE:BOB:PARK PLACE:BOARDWALK:200", "NO_TRADE"]);

        let proposal = alice.propose_trade(&state, &log).await.unwrap();
        assert_eq!(proposal.target, PlayerId(1));
        assert_eq!(proposal.give, vec!["PARK PLACE"]);
        let prompt = &alice.session().messages()[1].content;
        assert!(prompt.contains("Tradeable:H1 Park Place\nWanted:H2 Boardwalk(Bob)"));

        assert!(alice.propose_trade(&state, &log).await.is_none());
        assert!(log.contains("Alice (agent) proposes no trade"));
    }

    #[tokio::test]
    async fn test_respond_to_offer() {
        let state = fixtures::game();
        let log = MemorySink::new();
        let (mut bob, _) = seat(&state, "Bob", &["ACCEPT", "hmm"]);
        let offer = TradeProposal::from_draft(
            PlayerId(0),
            parser::parse_trade_proposal("TRADE_PROPOSE:BOB:PARK PLACE:BOARDWALK:200").unwrap(),
            &state,
        )
        .unwrap();

        assert!(bob.respond_to_offer(&state, &offer, &log).await);
        assert!(!bob.respond_to_offer(&state, &offer, &log).await);
    }

    #[tokio::test]
    async fn test_plan_turn() {
        let state = fixtures::game();
        let log = MemorySink::new();
        let (mut alice, _) = seat(
            &state,
            "Alice",
            &["A) TRADE_PROPOSE:Bob:Park Place:Boardwalk:200\nB) NO_IMPROVEMENT"],
        );

        let plan = alice.plan_turn(&state, &log).await;
        assert_eq!(plan.proposal.unwrap().target, PlayerId(1));
        assert!(plan.improvements.is_empty());
        assert!(log.contains("Alice (agent) plan: trade=Alice gives [PARK PLACE] + $200"));
    }

    #[tokio::test]
    async fn test_save_transcript() {
        let state = fixtures::game();
        let dir = tempfile::tempdir().unwrap();
        let (mut alice, _) = seat(&state, "Alice", &["PASS"]);
        alice.ask(&state, "Decision:BUY or PASS").await;

        let path = alice.save_transcript(dir.path(), 3).await.unwrap();
        assert!(path.ends_with("game_3_Alice_chat_history.txt"));
        let text = tokio::fs::read_to_string(path).await.unwrap();
        assert!(text.contains("ASSISTANT: PASS"));
    }

    #[test]
    fn test_pair_mut() {
        let state = fixtures::game();
        let mut table = AgentTable::new();
        table.insert(seat(&state, "Alice", &[]).0);
        table.insert(seat(&state, "Bob", &[]).0);

        let (b, a) = table.pair_mut(PlayerId(1), PlayerId(0)).unwrap();
        assert_eq!(b.name(), "Bob");
        assert_eq!(a.name(), "Alice");
        assert!(table.pair_mut(PlayerId(0), PlayerId(0)).is_none());
        assert!(table.pair_mut(PlayerId(0), PlayerId(2)).is_none());

        table.insert(seat(&state, "Alice", &[]).0);
        assert_eq!(table.len(), 2);
    }
}
