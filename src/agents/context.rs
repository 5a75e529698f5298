//! AgentContext: the agent's interface to the orchestrator
//!
//! Bundles the shared board, the claim queue and the agent's private channels,
//! providing a clean API for agents to submit claims, report state, and
//! receive verdicts and commands.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::board::Board;
use crate::coordination::Termination;
use crate::display::{DisplayEvent, DisplaySink};
use crate::domain::{AgentId, AgentKind, AgentState, Verdict};
use crate::error::Result;
use crate::orchestrator::{AgentCommand, PendingClaims};

/// Per-agent tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentSettings {
    pub set_size: usize,
    pub point_freeze: Duration,
    pub penalty_freeze: Duration,
}

/// Context given to each agent when spawned; not Clone (owns its receivers)
pub struct AgentContext {
    pub id: AgentId,
    pub kind: AgentKind,
    pub settings: AgentSettings,
    board: Arc<Board>,
    claims: Arc<PendingClaims>,
    display: Arc<dyn DisplaySink>,
    commands: mpsc::UnboundedReceiver<AgentCommand>,
    verdicts: mpsc::Receiver<Verdict>,
    termination: Termination,
    score: Arc<AtomicU32>,
    state: watch::Sender<AgentState>,
}

impl AgentContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: AgentId,
        kind: AgentKind,
        settings: AgentSettings,
        board: Arc<Board>,
        claims: Arc<PendingClaims>,
        display: Arc<dyn DisplaySink>,
        commands: mpsc::UnboundedReceiver<AgentCommand>,
        verdicts: mpsc::Receiver<Verdict>,
        termination: Termination,
        score: Arc<AtomicU32>,
        state: watch::Sender<AgentState>,
    ) -> Self {
        Self {
            id,
            kind,
            settings,
            board,
            claims,
            display,
            commands,
            verdicts,
            termination,
            score,
            state,
        }
    }

    pub fn board(&self) -> &Arc<Board> {
        &self.board
    }

    pub fn termination(&self) -> &Termination {
        &self.termination
    }

    /// Queue this agent's claim for validation
    pub fn submit_claim(&self) -> Result<()> {
        self.claims.submit(self.id)
    }

    pub fn publish(&self, event: DisplayEvent) {
        self.display.publish(event);
    }

    /// Legal claims credited so far
    pub fn score(&self) -> u32 {
        self.score.load(Ordering::SeqCst)
    }

    /// Make the current state visible to observers
    pub fn report_state(&self, state: AgentState) {
        self.state.send_replace(state);
    }

    /// Async wait for the next verdict (use in select! branches)
    pub async fn recv_verdict(&mut self) -> Option<Verdict> {
        self.verdicts.recv().await
    }

    /// Async wait for the next command (use in select! branches)
    pub async fn recv_command(&mut self) -> Option<AgentCommand> {
        self.commands.recv().await
    }
}

impl std::fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentContext")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("settings", &self.settings)
            .finish()
    }
}
