//! Game Setup
//!
//! Reads the run settings and gives every agent-controlled player a seat
//! with a fresh provider, transport and session.

use std::path::Path;
use std::sync::Arc;

use agent_core::{LlmProvider, LogSink, StubProvider, Transport};
use agent_runtime::AgentSettings;
use anyhow::Context;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::agent::{AgentSeat, AgentTable};
use crate::log::GameLog;
use crate::model::GameState;
use crate::turn::TurnSettings;
use crate::AGENT_SYSTEM_PROMPT;

#[derive(Debug, Default, Deserialize)]
struct TurnSection {
    #[serde(default)]
    turn: TurnSettings,
}

/// Agent and turn settings from one TOML file, with provider credentials
/// taken from the environment
///
/// ```toml
/// provider = "ollama"
/// players = ["Alice", "Bob"]
///
/// [turn]
/// max_counters = 2
/// unspendable_cash = 200
/// ```
pub fn load_settings(path: impl AsRef<Path>) -> anyhow::Result<(AgentSettings, TurnSettings)> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;
    let (agents, turn) = parse_settings(&text)?;
    Ok((agents.with_env(), turn))
}

fn parse_settings(text: &str) -> anyhow::Result<(AgentSettings, TurnSettings)> {
    let agents = AgentSettings::from_toml(text)?;
    let section: TurnSection = toml::from_str(text).context("Invalid [turn] settings")?;
    Ok((agents, section.turn))
}

/// Mark the players named in `settings` as agent-controlled and seat them.
/// Players not named play by rules.
pub fn seat_agents(
    state: &mut GameState,
    settings: &AgentSettings,
    log: &GameLog,
    cancel: &CancellationToken,
) -> AgentTable {
    let mut table = AgentTable::new();
    let sink: Arc<dyn LogSink> = Arc::new(log.clone());

    for player in &mut state.players {
        player.agent_controlled = settings.is_agent(&player.name);
        if !player.agent_controlled {
            continue;
        }

        let provider: Arc<dyn LlmProvider> = settings
            .build_provider(&player.name)
            .unwrap_or_else(|| Arc::new(StubProvider::new(settings.stub_reply.clone())));
        let mut options = settings.generation_options(&player.name);
        options.system_prompt.get_or_insert_with(|| AGENT_SYSTEM_PROMPT.to_string());

        let transport = Transport::new(provider, options)
            .with_config(settings.transport.clone())
            .with_cancellation(cancel.clone())
            .with_sink(sink.clone());

        tracing::info!(
            player = %player.name,
            provider = ?settings.provider_kind(&player.name),
            "Agent seated"
        );
        table.insert(AgentSeat::new(player.id, player.name.clone(), transport));
    }

    state.refresh_trade_lists();
    table
}
