//! Orchestrator
//!
//! Single task that drives the round lifecycle: it deals the board, runs the
//! countdown, validates claims from the shared `PendingClaims` queue one at a
//! time, reshuffles between rounds and joins every agent on shutdown.

pub mod command;
pub mod config;
pub mod orchestrator;
pub mod queue;

pub use command::AgentCommand;
pub use config::OrchestratorConfig;
pub use orchestrator::{AgentView, GameOutcome, Orchestrator};
pub use queue::{ClaimQueue, ClaimStats, PendingClaims};
