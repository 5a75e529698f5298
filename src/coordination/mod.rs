//! Coordination primitives shared by the orchestrator and agents
//!
//! - Termination tokens for cooperative cancellation of every wait site

pub mod shutdown;

pub use shutdown::{install_signal_handlers, Termination, TerminationReason};
