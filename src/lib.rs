pub mod agents;
pub mod board;
pub mod cli;
pub mod config;
pub mod coordination;
pub mod display;
pub mod domain;
pub mod error;
pub mod oracle;
pub mod orchestrator;

pub use agents::{ActionSender, Agent, AgentContext, AutonomousInput, Selection, ToggleOutcome};
pub use board::{Board, BoardSnapshot, PlayGate};
pub use config::AppConfig;
pub use coordination::{install_signal_handlers, Termination, TerminationReason};
pub use display::{
    ChannelDisplay, DisplayEvent, DisplaySink, FanoutDisplay, JsonLinesDisplay, NullDisplay,
    TracingDisplay,
};
pub use domain::{AgentId, AgentKind, AgentState, Item, Position, Verdict};
pub use error::{BoardError, GameError, Result};
pub use oracle::{PredicateOracle, SetCardOracle, ValidityOracle};
pub use orchestrator::{
    AgentCommand, AgentView, ClaimStats, GameOutcome, Orchestrator, OrchestratorConfig,
    PendingClaims,
};
