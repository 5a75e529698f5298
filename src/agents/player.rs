//! Agent: one participant's state machine and main loop
//!
//! Each agent runs as its own task. It waits for the play gate, applies
//! orchestrator commands and toggle actions, and when its selection fills it
//! submits a claim and suspends until the orchestrator's verdict arrives.
//! Every wait races the agent's termination token.

use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::autonomous::AutonomousInput;
use super::context::AgentContext;
use super::selection::Selection;
use crate::coordination::{Termination, TerminationReason};
use crate::display::DisplayEvent;
use crate::domain::{AgentState, Position, Verdict};
use crate::error::{BoardError, GameError, Result};
use crate::orchestrator::AgentCommand;

/// Freeze countdown granularity
const FREEZE_STEP: Duration = Duration::from_secs(1);

/// What a single toggle action did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Marker placed, selection still short of a claim
    Added,
    /// Marker removed
    Removed,
    /// Marker placed and the full selection submitted as a claim
    Claimed,
    /// Gate closed, wrong state, full selection, or empty position
    Rejected,
}

pub struct Agent {
    ctx: AgentContext,
    selection: Selection,
    state: AgentState,
    actions: mpsc::Receiver<Position>,
    generator: Option<AutonomousInput>,
}

impl Agent {
    pub fn new(ctx: AgentContext, actions: mpsc::Receiver<Position>) -> Self {
        let selection = Selection::new(ctx.settings.set_size);
        ctx.report_state(AgentState::Playing);
        Self {
            ctx,
            selection,
            state: AgentState::Playing,
            actions,
            generator: None,
        }
    }

    /// Attach a companion input generator, spawned and joined by [`Agent::run`]
    pub fn with_generator(mut self, generator: AutonomousInput) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Main agent loop: returns once termination is requested
    pub async fn run(mut self) -> Result<()> {
        let id = self.ctx.id;
        info!(agent = %id, kind = ?self.ctx.kind, "agent starting");

        let generator = self.generator.take().map(|g| {
            let stop = g.termination().clone();
            (tokio::spawn(g.run()), stop)
        });

        let result = self.play().await;
        if let Err(e) = &result {
            error!(agent = %id, error = %e, "agent loop aborted");
        }

        if let Some((task, stop)) = generator {
            stop.request(TerminationReason::GameOver);
            if let Err(e) = task.await {
                warn!(agent = %id, error = %e, "autonomous input task failed");
            }
        }

        info!(agent = %id, score = self.ctx.score(), "agent terminated");
        result
    }

    async fn play(&mut self) -> Result<()> {
        let termination = self.ctx.termination().clone();
        let mut actions_open = true;

        loop {
            if !self.ctx.board().is_open() {
                tokio::select! {
                    biased;
                    _ = termination.cancelled() => return Ok(()),
                    _ = self.ctx.board().await_open() => {}
                }
            }

            tokio::select! {
                biased;
                _ = termination.cancelled() => return Ok(()),
                command = self.ctx.recv_command() => match command {
                    Some(command) => self.apply_command(command)?,
                    None => {
                        return Err(GameError::ChannelClosed(format!(
                            "{} command channel",
                            self.ctx.id
                        )))
                    }
                },
                action = self.actions.recv(), if actions_open => match action {
                    Some(position) => {
                        if self.toggle(position).await? == ToggleOutcome::Claimed
                            && !self.resolve_claim(&termination).await?
                        {
                            return Ok(());
                        }
                    }
                    None => {
                        debug!(agent = %self.ctx.id, "action source closed");
                        actions_open = false;
                    }
                },
            }
        }
    }

    /// Apply one toggle action to the selection and the board
    pub async fn toggle(&mut self, position: Position) -> Result<ToggleOutcome> {
        let id = self.ctx.id;
        if !self.state.accepts_actions() {
            return Ok(ToggleOutcome::Rejected);
        }

        if self.selection.contains(position) {
            match self.ctx.board().unmark(id, position).await {
                Ok(_) => {}
                Err(BoardError::GateClosed) => return Ok(ToggleOutcome::Rejected),
                Err(e) => return Err(e.into()),
            }
            self.selection.remove(position);
            debug!(agent = %id, %position, size = self.selection.len(), "marker removed");

            if self.state == AgentState::PostPenalty && self.selection.is_empty() {
                self.transition(AgentState::Playing)?;
                info!(agent = %id, "penalty markers cleared, back in play");
            }
            return Ok(ToggleOutcome::Removed);
        }

        if self.state == AgentState::PostPenalty {
            debug!(agent = %id, %position, "only removals accepted after a penalty");
            return Ok(ToggleOutcome::Rejected);
        }
        if self.selection.is_full() {
            return Ok(ToggleOutcome::Rejected);
        }

        match self.ctx.board().mark(id, position).await {
            Ok(_) => {}
            Err(BoardError::GateClosed) => return Ok(ToggleOutcome::Rejected),
            Err(e @ (BoardError::EmptyPosition { .. } | BoardError::OutOfRange { .. })) => {
                debug!(agent = %id, error = %e, "toggle rejected");
                return Ok(ToggleOutcome::Rejected);
            }
            Err(e) => return Err(e.into()),
        }
        self.selection.insert(position);
        debug!(agent = %id, %position, size = self.selection.len(), "marker placed");

        if !self.selection.is_full() {
            return Ok(ToggleOutcome::Added);
        }

        self.transition(AgentState::AwaitingVerdict)?;
        self.ctx.submit_claim()?;
        info!(agent = %id, selection = ?self.selection.positions(), "claim submitted");
        Ok(ToggleOutcome::Claimed)
    }

    /// Wait for the verdict on the submitted claim and apply it
    ///
    /// Returns false if termination interrupted the wait or a freeze.
    async fn resolve_claim(&mut self, termination: &Termination) -> Result<bool> {
        let verdict = tokio::select! {
            biased;
            _ = termination.cancelled() => return Ok(false),
            verdict = self.ctx.recv_verdict() => verdict.ok_or_else(|| {
                GameError::ChannelClosed(format!("{} verdict channel", self.ctx.id))
            })?,
        };

        // Input queued while the claim was pending is stale
        self.discard_queued_actions();
        self.apply_verdict(verdict, termination).await
    }

    async fn apply_verdict(&mut self, verdict: Verdict, termination: &Termination) -> Result<bool> {
        let id = self.ctx.id;
        self.transition(verdict.next_state())?;
        info!(agent = %id, %verdict, "verdict received");

        let freeze = match verdict {
            Verdict::Legal => {
                // The orchestrator already removed the claimed positions' markers
                self.selection.clear();
                self.ctx.settings.point_freeze
            }
            Verdict::Illegal => self.ctx.settings.penalty_freeze,
            Verdict::Incomplete => Duration::ZERO,
        };
        Ok(self.freeze(freeze, termination).await)
    }

    /// Publish a countdown and sleep through `total`, ignoring input meanwhile
    ///
    /// Returns false if terminated first.
    async fn freeze(&mut self, total: Duration, termination: &Termination) -> bool {
        let mut remaining = total;
        while !remaining.is_zero() {
            self.ctx.publish(DisplayEvent::Freeze {
                agent: self.ctx.id,
                remaining_ms: remaining.as_millis() as u64,
            });
            let step = remaining.min(FREEZE_STEP);
            tokio::select! {
                biased;
                _ = termination.cancelled() => return false,
                _ = tokio::time::sleep(step) => {}
            }
            remaining -= step;
        }

        if !total.is_zero() {
            self.discard_queued_actions();
            self.ctx.publish(DisplayEvent::Freeze {
                agent: self.ctx.id,
                remaining_ms: 0,
            });
        }
        true
    }

    fn apply_command(&mut self, command: AgentCommand) -> Result<()> {
        let id = self.ctx.id;
        match command {
            AgentCommand::Discard(positions) => {
                let dropped = self.selection.discard(&positions);
                debug!(agent = %id, ?positions, dropped, "positions discarded");
                if self.state == AgentState::PostPenalty && self.selection.is_empty() {
                    self.transition(AgentState::Playing)?;
                }
            }
            AgentCommand::Reset => {
                self.selection.clear();
                self.discard_queued_actions();
                self.transition(AgentState::Playing)?;
                debug!(agent = %id, "reset for new round");
            }
        }
        Ok(())
    }

    fn discard_queued_actions(&mut self) {
        let mut discarded = 0usize;
        while self.actions.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!(agent = %self.ctx.id, discarded, "stale actions discarded");
        }
    }

    fn transition(&mut self, next: AgentState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            let reason = format!(
                "{} cannot move from {} to {}",
                self.ctx.id, self.state, next
            );
            error!(agent = %self.ctx.id, %reason, "illegal state transition");
            return Err(GameError::InvariantViolation(reason));
        }
        self.state = next;
        self.ctx.report_state(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::context::AgentSettings;
    use crate::board::Board;
    use crate::display::NullDisplay;
    use crate::domain::{AgentId, AgentKind, Item};
    use crate::orchestrator::PendingClaims;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;
    use tokio::sync::watch;

    struct Harness {
        board: Arc<Board>,
        claims: Arc<PendingClaims>,
        commands: mpsc::UnboundedSender<AgentCommand>,
        verdicts: mpsc::Sender<Verdict>,
        actions: mpsc::Sender<Position>,
        state: watch::Receiver<AgentState>,
        termination: Termination,
    }

    /// Agent 0 on a 4-position board holding items 0..4, gate open
    async fn agent() -> (Agent, Harness) {
        let board = Arc::new(Board::new(4, 8, Arc::new(NullDisplay)));
        for i in 0..4 {
            board.place(Item(i), Position(i)).await.unwrap();
        }
        board.open_gate().await;

        let claims = Arc::new(PendingClaims::new(2));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (verdict_tx, verdict_rx) = mpsc::channel(1);
        let (action_tx, action_rx) = mpsc::channel(3);
        let (state_tx, state_rx) = watch::channel(AgentState::Playing);
        let termination = Termination::new();

        let ctx = AgentContext::new(
            AgentId(0),
            AgentKind::Human,
            AgentSettings {
                set_size: 3,
                point_freeze: Duration::ZERO,
                penalty_freeze: Duration::ZERO,
            },
            board.clone(),
            claims.clone(),
            Arc::new(NullDisplay),
            cmd_rx,
            verdict_rx,
            termination.clone(),
            Arc::new(AtomicU32::new(0)),
            state_tx,
        );

        let harness = Harness {
            board,
            claims,
            commands: cmd_tx,
            verdicts: verdict_tx,
            actions: action_tx,
            state: state_rx,
            termination,
        };
        (Agent::new(ctx, action_rx), harness)
    }

    #[tokio::test]
    async fn test_full_selection_submits_claim() {
        let (mut agent, h) = agent().await;
        assert_eq!(
            agent.toggle(Position(0)).await.unwrap(),
            ToggleOutcome::Added
        );
        assert_eq!(
            agent.toggle(Position(1)).await.unwrap(),
            ToggleOutcome::Added
        );
        assert!(h.claims.is_empty());

        assert_eq!(
            agent.toggle(Position(2)).await.unwrap(),
            ToggleOutcome::Claimed
        );
        assert_eq!(agent.state(), AgentState::AwaitingVerdict);
        assert_eq!(*h.state.borrow(), AgentState::AwaitingVerdict);
        assert_eq!(h.claims.drain_all(), vec![AgentId(0)]);
        assert_eq!(
            h.board.markers_of(AgentId(0)),
            vec![Position(0), Position(1), Position(2)]
        );

        // No input is applied while the claim is pending
        assert_eq!(
            agent.toggle(Position(0)).await.unwrap(),
            ToggleOutcome::Rejected
        );
    }

    #[tokio::test]
    async fn test_toggle_twice_removes_marker() {
        let (mut agent, h) = agent().await;
        agent.toggle(Position(3)).await.unwrap();
        assert_eq!(
            agent.toggle(Position(3)).await.unwrap(),
            ToggleOutcome::Removed
        );
        assert!(agent.selection().is_empty());
        assert!(h.board.markers_of(AgentId(0)).is_empty());
    }

    #[tokio::test]
    async fn test_gate_closed_mid_selection_rejects_toggle() {
        let (mut agent, h) = agent().await;
        agent.toggle(Position(0)).await.unwrap();
        agent.toggle(Position(1)).await.unwrap();

        h.board.close_gate().await;
        assert_eq!(
            agent.toggle(Position(2)).await.unwrap(),
            ToggleOutcome::Rejected
        );
        assert_eq!(agent.selection().len(), 2);
        assert_eq!(agent.state(), AgentState::Playing);
        assert!(h.claims.is_empty());
    }

    #[tokio::test]
    async fn test_illegal_verdict_allows_only_removals() {
        let (mut agent, h) = agent().await;
        for p in [0, 1, 3] {
            agent.toggle(Position(p)).await.unwrap();
        }
        let termination = h.termination.clone();
        h.verdicts.send(Verdict::Illegal).await.unwrap();
        assert!(agent.resolve_claim(&termination).await.unwrap());
        assert_eq!(agent.state(), AgentState::PostPenalty);

        // Board untouched, new markers refused
        assert_eq!(
            agent.toggle(Position(2)).await.unwrap(),
            ToggleOutcome::Rejected
        );
        assert_eq!(h.board.count_items().await, 4);

        for p in [0, 1] {
            assert_eq!(
                agent.toggle(Position(p)).await.unwrap(),
                ToggleOutcome::Removed
            );
            assert_eq!(agent.state(), AgentState::PostPenalty);
        }
        assert_eq!(
            agent.toggle(Position(3)).await.unwrap(),
            ToggleOutcome::Removed
        );
        assert_eq!(agent.state(), AgentState::Playing);
        assert_eq!(
            agent.toggle(Position(2)).await.unwrap(),
            ToggleOutcome::Added
        );
    }

    #[tokio::test]
    async fn test_legal_verdict_clears_selection() {
        let (mut agent, h) = agent().await;
        for p in [0, 1, 2] {
            agent.toggle(Position(p)).await.unwrap();
        }
        h.verdicts.send(Verdict::Legal).await.unwrap();
        assert!(agent.resolve_claim(&h.termination).await.unwrap());
        assert_eq!(agent.state(), AgentState::Playing);
        assert!(agent.selection().is_empty());
    }

    #[tokio::test]
    async fn test_incomplete_verdict_has_no_side_effect() {
        let (mut agent, h) = agent().await;
        for p in [0, 1, 2] {
            agent.toggle(Position(p)).await.unwrap();
        }
        h.verdicts.send(Verdict::Incomplete).await.unwrap();
        assert!(agent.resolve_claim(&h.termination).await.unwrap());
        assert_eq!(agent.state(), AgentState::Playing);
        assert_eq!(agent.selection().len(), 3);
    }

    #[tokio::test]
    async fn test_actions_during_verdict_wait_are_discarded() {
        let (mut agent, h) = agent().await;
        for p in [0, 1, 2] {
            agent.toggle(Position(p)).await.unwrap();
        }
        h.actions.send(Position(3)).await.unwrap();
        h.actions.send(Position(0)).await.unwrap();
        h.verdicts.send(Verdict::Legal).await.unwrap();

        agent.resolve_claim(&h.termination).await.unwrap();
        assert!(agent.actions.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_commands_discard_and_reset() {
        let (mut agent, _h) = agent().await;
        for p in [0, 1] {
            agent.toggle(Position(p)).await.unwrap();
        }
        agent
            .apply_command(AgentCommand::Discard(vec![Position(1), Position(2)]))
            .unwrap();
        assert_eq!(agent.selection().positions(), &[Position(0)]);

        agent.apply_command(AgentCommand::Reset).unwrap();
        assert!(agent.selection().is_empty());
        assert_eq!(agent.state(), AgentState::Playing);
    }

    #[tokio::test]
    async fn test_selection_never_exceeds_set_size() {
        let (mut agent, h) = agent().await;
        for p in [0, 1, 2] {
            agent.toggle(Position(p)).await.unwrap();
        }
        h.verdicts.send(Verdict::Incomplete).await.unwrap();
        agent.resolve_claim(&h.termination).await.unwrap();

        // Still full after a stale claim: further additions are refused
        assert_eq!(
            agent.toggle(Position(3)).await.unwrap(),
            ToggleOutcome::Rejected
        );
        assert_eq!(agent.selection().len(), 3);
        assert_eq!(h.board.markers_of(AgentId(0)).len(), 3);
    }

    #[tokio::test]
    async fn test_run_exits_on_termination_while_awaiting_verdict() {
        let (agent, h) = agent().await;
        let task = tokio::spawn(agent.run());

        for p in [0, 1, 2] {
            h.actions.send(Position(p)).await.unwrap();
        }
        let mut state = h.state.clone();
        state
            .wait_for(|s| *s == AgentState::AwaitingVerdict)
            .await
            .unwrap();

        h.termination.request(TerminationReason::External);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("agent should stop")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_exits_on_termination_while_gate_closed() {
        let (agent, h) = agent().await;
        h.board.close_gate().await;
        let task = tokio::spawn(agent.run());

        tokio::time::sleep(Duration::from_millis(10)).await;
        h.termination.request(TerminationReason::External);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("agent should stop")
            .unwrap()
            .unwrap();
    }
}
