//! Orchestrator Commands: control messages from the orchestrator to agents

use serde::{Deserialize, Serialize};

use crate::domain::Position;

/// Commands sent from the orchestrator to individual agents
///
/// Verdicts travel on their own single-slot channel; commands never carry a
/// claim outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentCommand {
    /// Another agent's legal claim removed these positions; drop them from the selection
    Discard(Vec<Position>),
    /// Round reshuffle: clear the selection, drop queued input, return to playing
    Reset,
}
