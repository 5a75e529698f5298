//! Orchestrator Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::AppConfig;

/// Configuration for the orchestrator and the agents it spawns
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Board positions
    pub table_size: usize,
    /// Distinct items; the deck starts as `0..deck_size`
    pub deck_size: usize,
    /// Items per claim
    pub set_size: usize,
    /// Agents that may be spawned; also the claim queue capacity
    pub max_agents: usize,
    /// Round length; a legal claim restarts it (ms)
    pub turn_timeout_ms: u64,
    /// Countdown events carry `warn` below this (ms)
    pub turn_timeout_warning_ms: u64,
    /// Countdown tick and upper bound on claim validation latency (ms)
    pub tick_ms: u64,
    /// Freeze after a legal claim (ms)
    pub point_freeze_ms: u64,
    /// Freeze after an illegal claim (ms)
    pub penalty_freeze_ms: u64,
    /// Delay per placed or removed item (ms)
    pub table_delay_ms: u64,
    /// Pause between autonomous presses (ms)
    pub autonomous_think_ms: u64,
    /// Publish every combination on the board each tick
    pub hints: bool,
    /// Seed for shuffles and autonomous input; entropy when unset
    pub seed: Option<u64>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            table_size: 12,
            deck_size: 81,
            set_size: 3,
            max_agents: 2,
            turn_timeout_ms: 60_000,
            turn_timeout_warning_ms: 5_000,
            tick_ms: 50,
            point_freeze_ms: 1_000,
            penalty_freeze_ms: 3_000,
            table_delay_ms: 0,
            autonomous_think_ms: 5,
            hints: false,
            seed: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn turn_timeout(&self) -> Duration {
        Duration::from_millis(self.turn_timeout_ms)
    }

    pub fn turn_timeout_warning(&self) -> Duration {
        Duration::from_millis(self.turn_timeout_warning_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn point_freeze(&self) -> Duration {
        Duration::from_millis(self.point_freeze_ms)
    }

    pub fn penalty_freeze(&self) -> Duration {
        Duration::from_millis(self.penalty_freeze_ms)
    }

    pub fn table_delay(&self) -> Duration {
        Duration::from_millis(self.table_delay_ms)
    }

    pub fn autonomous_think(&self) -> Duration {
        Duration::from_millis(self.autonomous_think_ms)
    }
}

impl From<&AppConfig> for OrchestratorConfig {
    fn from(app: &AppConfig) -> Self {
        Self {
            table_size: app.game.table_size(),
            deck_size: app.game.deck_size(),
            set_size: app.game.set_size(),
            max_agents: app.players.total(),
            turn_timeout_ms: app.timing.turn_timeout_ms,
            turn_timeout_warning_ms: app.timing.turn_timeout_warning_ms,
            tick_ms: app.timing.tick_ms,
            point_freeze_ms: app.timing.point_freeze_ms,
            penalty_freeze_ms: app.timing.penalty_freeze_ms,
            table_delay_ms: app.timing.table_delay_ms,
            autonomous_think_ms: app.timing.autonomous_think_ms,
            hints: app.game.hints,
            seed: app.game.seed,
        }
    }
}
