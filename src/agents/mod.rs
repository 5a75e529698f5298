//! Agents: one task per participant
//!
//! An agent owns its selection and state machine, consumes toggle actions from
//! a human [`ActionSender`] or an [`AutonomousInput`] generator, and talks to
//! the orchestrator only through the claim queue and its private channels.

pub mod autonomous;
pub mod context;
pub mod input;
pub mod player;
pub mod selection;

pub use autonomous::AutonomousInput;
pub use context::{AgentContext, AgentSettings};
pub use input::{forward_lines, forward_stdin, parse_press, ActionSender};
pub use player::{Agent, ToggleOutcome};
pub use selection::Selection;
