//! Orchestrator: drives rounds and is the single authority on claims
//!
//! The Orchestrator owns the deck, the round clock and the only writer path to
//! board occupancy. Agents reach it through `PendingClaims`; it reaches each
//! agent through that agent's command and verdict channels.
//! The main `run()` loop:
//!   - Checks the deck still holds a combination, else the game is over
//!   - Deals the board and counts the round down, validating claims each tick
//!   - Reshuffles the board back into the deck when the clock runs out
//!   - Announces winners and joins every agent on the way out

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use super::command::AgentCommand;
use super::config::OrchestratorConfig;
use super::queue::{ClaimStats, PendingClaims};
use crate::agents::{ActionSender, Agent, AgentContext, AgentSettings, AutonomousInput};
use crate::board::Board;
use crate::coordination::{Termination, TerminationReason};
use crate::display::{DisplayEvent, DisplaySink};
use crate::domain::{AgentId, AgentKind, AgentState, Item, Position, Verdict};
use crate::error::{GameError, Result};
use crate::oracle::ValidityOracle;

/// Round timer; only the orchestrator reads or resets it
#[derive(Debug)]
struct RoundClock {
    timeout: Duration,
    deadline: Instant,
}

impl RoundClock {
    fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: Instant::now() + timeout,
        }
    }

    fn reset(&mut self) {
        self.deadline = Instant::now() + self.timeout;
    }

    fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    fn expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// Orchestrator's side of one spawned agent
struct AgentHandle {
    id: AgentId,
    kind: AgentKind,
    commands: mpsc::UnboundedSender<AgentCommand>,
    verdicts: mpsc::Sender<Verdict>,
    termination: Termination,
    score: Arc<AtomicU32>,
    state: watch::Receiver<AgentState>,
    actions: Option<ActionSender>,
    task: Option<JoinHandle<Result<()>>>,
}

/// Read-only view of an agent for front-ends and tests
#[derive(Debug, Clone)]
pub struct AgentView {
    pub id: AgentId,
    pub kind: AgentKind,
    score: Arc<AtomicU32>,
    state: watch::Receiver<AgentState>,
}

impl AgentView {
    pub fn score(&self) -> u32 {
        self.score.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> AgentState {
        *self.state.borrow()
    }

    /// Resolve once the agent reports `target`
    pub async fn wait_for_state(&mut self, target: AgentState) -> Result<()> {
        self.state
            .wait_for(|state| *state == target)
            .await
            .map(|_| ())
            .map_err(|_| GameError::ChannelClosed(format!("{} state", self.id)))
    }
}

/// How a game ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameOutcome {
    /// Final score per agent, in creation order
    pub scores: Vec<(AgentId, u32)>,
    /// Agents holding the maximum score; empty unless the game ended on its own
    pub winners: Vec<AgentId>,
    pub rounds: u32,
    #[serde(serialize_with = "serialize_reason")]
    pub reason: TerminationReason,
    #[serde(skip)]
    pub claims: ClaimStats,
}

fn serialize_reason<S: serde::Serializer>(
    reason: &TerminationReason,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(reason)
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    board: Arc<Board>,
    oracle: Arc<dyn ValidityOracle>,
    display: Arc<dyn DisplaySink>,
    claims: Arc<PendingClaims>,
    termination: Termination,
    deck: Vec<Item>,
    rng: StdRng,
    clock: RoundClock,
    agents: Vec<AgentHandle>,
    rounds: u32,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        oracle: Arc<dyn ValidityOracle>,
        display: Arc<dyn DisplaySink>,
        termination: Termination,
    ) -> Self {
        let board = Arc::new(
            Board::new(config.table_size, config.deck_size, display.clone())
                .with_table_delay(config.table_delay()),
        );
        let claims = Arc::new(PendingClaims::new(config.max_agents));
        let deck = (0..config.deck_size).map(Item).collect();
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let clock = RoundClock::new(config.turn_timeout());

        Self {
            config,
            board,
            oracle,
            display,
            claims,
            termination,
            deck,
            rng,
            clock,
            agents: Vec::new(),
            rounds: 0,
        }
    }

    /// Shared board reference (for front-ends)
    pub fn board(&self) -> Arc<Board> {
        self.board.clone()
    }

    pub fn termination(&self) -> &Termination {
        &self.termination
    }

    /// Items not on the board
    pub fn deck(&self) -> &[Item] {
        &self.deck
    }

    /// Spawn an agent task and register it; ids follow creation order
    pub fn spawn_agent(&mut self, kind: AgentKind) -> Result<AgentId> {
        if self.agents.len() >= self.config.max_agents {
            return Err(GameError::InvalidConfig(format!(
                "cannot spawn more than {} agents",
                self.config.max_agents
            )));
        }

        let id = AgentId(self.agents.len());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (verdict_tx, verdict_rx) = mpsc::channel(1);
        let (action_tx, action_rx) = mpsc::channel(self.config.set_size.max(1));
        let (state_tx, state_rx) = watch::channel(AgentState::Playing);
        let score = Arc::new(AtomicU32::new(0));
        let termination = self.termination.child();

        let ctx = AgentContext::new(
            id,
            kind,
            AgentSettings {
                set_size: self.config.set_size,
                point_freeze: self.config.point_freeze(),
                penalty_freeze: self.config.penalty_freeze(),
            },
            self.board.clone(),
            self.claims.clone(),
            self.display.clone(),
            cmd_rx,
            verdict_rx,
            termination.clone(),
            score.clone(),
            state_tx,
        );
        let mut agent = Agent::new(ctx, action_rx);

        let actions = match kind {
            AgentKind::Human => Some(ActionSender::new(id, self.board.clone(), action_tx)),
            AgentKind::Autonomous => {
                let rng = match self.config.seed {
                    Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(id.index() as u64 + 1)),
                    None => StdRng::from_entropy(),
                };
                agent = agent.with_generator(AutonomousInput::new(
                    id,
                    self.board.clone(),
                    action_tx,
                    rng,
                    self.config.autonomous_think(),
                    termination.child(),
                ));
                None
            }
        };

        let task = tokio::spawn(agent.run());
        info!(agent = %id, ?kind, "agent registered with orchestrator");

        self.agents.push(AgentHandle {
            id,
            kind,
            commands: cmd_tx,
            verdicts: verdict_tx,
            termination,
            score,
            state: state_rx,
            actions,
            task: Some(task),
        });
        Ok(id)
    }

    /// Spawn `humans` human agents, then `autonomous` autonomous ones
    ///
    /// Returns the human agents' press handlers in creation order.
    pub fn spawn_players(&mut self, humans: usize, autonomous: usize) -> Result<Vec<ActionSender>> {
        let mut senders = Vec::with_capacity(humans);
        for _ in 0..humans {
            let id = self.spawn_agent(AgentKind::Human)?;
            senders.extend(self.action_sender(id));
        }
        for _ in 0..autonomous {
            self.spawn_agent(AgentKind::Autonomous)?;
        }
        Ok(senders)
    }

    /// Press handler for a human agent
    pub fn action_sender(&self, agent: AgentId) -> Option<ActionSender> {
        self.agents.get(agent.index())?.actions.clone()
    }

    pub fn agent_views(&self) -> Vec<AgentView> {
        self.agents
            .iter()
            .map(|h| AgentView {
                id: h.id,
                kind: h.kind,
                score: h.score.clone(),
                state: h.state.clone(),
            })
            .collect()
    }

    /// Main orchestrator loop: plays rounds until the game ends or is terminated
    pub async fn run(mut self) -> Result<GameOutcome> {
        info!(
            agents = self.agents.len(),
            table = self.config.table_size,
            deck = self.deck.len(),
            "orchestrator starting main loop"
        );

        let played = self.play_rounds().await;
        if let Err(e) = &played {
            error!(error = %e, "round loop aborted");
        }

        let natural_end = matches!(played, Ok(true));
        let winners = if natural_end {
            self.announce_winners()
        } else {
            Vec::new()
        };

        let joined = self.shutdown_agents().await;
        played?;
        joined?;

        let reason = if natural_end {
            TerminationReason::GameOver
        } else {
            self.termination
                .reason()
                .unwrap_or(TerminationReason::External)
        };
        let outcome = GameOutcome {
            scores: self
                .agents
                .iter()
                .map(|h| (h.id, h.score.load(Ordering::SeqCst)))
                .collect(),
            winners,
            rounds: self.rounds,
            reason,
            claims: self.claims.stats(),
        };
        info!(
            rounds = outcome.rounds,
            %reason,
            claims = %outcome.claims,
            "orchestrator: main loop exited"
        );
        Ok(outcome)
    }

    /// Returns true when the deck ran out of combinations, false on termination
    async fn play_rounds(&mut self) -> Result<bool> {
        loop {
            if self.termination.is_requested() {
                return Ok(false);
            }
            if self.oracle.find_combinations(&self.deck, 1).is_empty() {
                info!(
                    deck = self.deck.len(),
                    rounds = self.rounds,
                    "no combination left in deck"
                );
                return Ok(true);
            }

            self.rounds += 1;
            info!(
                round = self.rounds,
                deck = self.deck.len(),
                "round starting"
            );
            self.deal().await?;
            self.countdown().await?;
            if self.termination.is_requested() {
                return Ok(false);
            }
            self.reshuffle().await?;
        }
    }

    /// Fill every empty position from the shuffled deck, then open play
    async fn deal(&mut self) -> Result<()> {
        self.deck.shuffle(&mut self.rng);
        let mut empty = self.board.empty_positions().await;
        empty.shuffle(&mut self.rng);

        self.board.close_gate().await;
        self.fill(&empty).await?;
        self.board.open_gate().await;

        self.clock.reset();
        self.board.wake();
        Ok(())
    }

    /// Place deck items onto `positions` until either runs out
    async fn fill(&mut self, positions: &[Position]) -> Result<usize> {
        let mut placed = 0;
        for &position in positions {
            let Some(item) = self.deck.pop() else {
                break;
            };
            self.board.place(item, position).await?;
            placed += 1;
        }
        debug!(placed, deck = self.deck.len(), "dealt items");
        Ok(placed)
    }

    async fn countdown(&mut self) -> Result<()> {
        let tick = self.config.tick();

        while !self.termination.is_requested() && !self.clock.expired() {
            tokio::select! {
                _ = tokio::time::sleep(tick) => {}
                _ = self.claims.notified() => {}
                _ = self.termination.cancelled() => break,
            }

            if self.config.hints {
                self.publish_hints().await;
            }
            self.resolve_pending().await?;
            self.publish_countdown();
        }

        self.publish_countdown();
        Ok(())
    }

    fn publish_countdown(&self) {
        let remaining = self.clock.remaining();
        let warn = remaining <= self.config.turn_timeout_warning();
        trace!(
            remaining_ms = remaining.as_millis() as u64,
            warn,
            "countdown"
        );
        self.display.publish(DisplayEvent::Countdown {
            remaining_ms: remaining.as_millis() as u64,
            warn,
        });
    }

    async fn publish_hints(&self) {
        let items = self.board.items().await;
        for combination in self.oracle.find_combinations(&items, usize::MAX) {
            let mut positions = Vec::with_capacity(combination.len());
            for item in combination {
                if let Some(position) = self.board.position_of(item).await {
                    positions.push(position);
                }
            }
            self.display.publish(DisplayEvent::Hint { positions });
        }
    }

    /// Validate every queued claim, oldest first
    async fn resolve_pending(&mut self) -> Result<()> {
        for agent in self.claims.drain_all() {
            self.resolve_claim(agent).await?;
        }
        Ok(())
    }

    async fn resolve_claim(&mut self, agent: AgentId) -> Result<Verdict> {
        if agent.index() >= self.agents.len() {
            error!(%agent, "claim from an unregistered agent");
            return Err(GameError::UnknownAgent(agent));
        }

        // The board's marker table is the authoritative copy of the claimant's selection
        let positions = self.board.markers_of(agent);
        let verdict = if positions.len() != self.config.set_size {
            Verdict::Incomplete
        } else {
            let mut items = Vec::with_capacity(positions.len());
            for &position in &positions {
                if let Some(item) = self.board.item_at(position).await {
                    items.push(item);
                }
            }

            if items.len() != self.config.set_size {
                Verdict::Incomplete
            } else if self.oracle.is_valid(&items) {
                self.apply_legal(agent, &positions).await?;
                Verdict::Legal
            } else {
                Verdict::Illegal
            }
        };

        info!(%agent, %verdict, ?positions, "claim resolved");
        self.deliver(agent, verdict)?;
        Ok(verdict)
    }

    /// Remove a legal combination and refill its positions
    async fn apply_legal(&mut self, agent: AgentId, positions: &[Position]) -> Result<()> {
        let was_open = self.board.close_gate().await;

        let holders = self.board.clear_markers_at(positions).await;
        for (holder, lost) in holders {
            if holder != agent {
                self.command(holder, AgentCommand::Discard(lost));
            }
        }

        for &position in positions {
            if let Some(item) = self.board.clear(position).await? {
                debug!(%item, %position, "item leaves play");
            }
        }

        let mut freed = positions.to_vec();
        freed.shuffle(&mut self.rng);
        self.fill(&freed).await?;

        if was_open {
            self.board.open_gate().await;
        }
        self.board.wake();
        self.clock.reset();

        if let Some(handle) = self.agents.get(agent.index()) {
            let score = handle.score.fetch_add(1, Ordering::SeqCst) + 1;
            self.display
                .publish(DisplayEvent::ScoreUpdated { agent, score });
        }
        Ok(())
    }

    /// Hand a verdict to its claimant's single-slot channel
    fn deliver(&self, agent: AgentId, verdict: Verdict) -> Result<()> {
        let handle = self
            .agents
            .get(agent.index())
            .ok_or(GameError::UnknownAgent(agent))?;

        match handle.verdicts.try_send(verdict) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                let reason = format!("{agent} already holds an undelivered verdict");
                error!(%agent, %reason, "verdict handoff invariant violated");
                Err(GameError::InvariantViolation(reason))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(%agent, %verdict, "agent gone, verdict dropped");
                Ok(())
            }
        }
    }

    fn command(&self, agent: AgentId, command: AgentCommand) {
        let Some(handle) = self.agents.get(agent.index()) else {
            warn!(%agent, "command for an unregistered agent");
            return;
        };
        if handle.commands.send(command).is_err() {
            warn!(%agent, "agent command channel closed");
        }
    }

    /// Return every board item to the deck and reset all agents
    async fn reshuffle(&mut self) -> Result<()> {
        self.board.close_gate().await;
        self.resolve_pending().await?;

        let mut occupied = self.board.occupied_positions().await;
        occupied.shuffle(&mut self.rng);
        for position in occupied {
            if let Some(item) = self.board.clear(position).await? {
                self.deck.push(item);
            }
        }
        self.board.clear_all_markers().await;

        for handle in &self.agents {
            self.command(handle.id, AgentCommand::Reset);
        }

        if !self.board.is_consistent().await {
            let reason = "board mapping tables disagree after reshuffle".to_string();
            error!(%reason);
            return Err(GameError::InvariantViolation(reason));
        }
        info!(
            round = self.rounds,
            deck = self.deck.len(),
            "round over, board returned to deck"
        );
        Ok(())
    }

    /// Publish every agent holding the maximum score
    fn announce_winners(&self) -> Vec<AgentId> {
        let scores: Vec<(AgentId, u32)> = self
            .agents
            .iter()
            .map(|h| (h.id, h.score.load(Ordering::SeqCst)))
            .collect();
        let Some(max) = scores.iter().map(|&(_, score)| score).max() else {
            return Vec::new();
        };
        let winners: Vec<AgentId> = scores
            .iter()
            .filter(|&&(_, score)| score == max)
            .map(|&(id, _)| id)
            .collect();

        info!(?winners, score = max, "winners announced");
        self.display.publish(DisplayEvent::Winners {
            agents: winners.clone(),
        });
        winners
    }

    /// Terminate agents in reverse creation order, joining each
    async fn shutdown_agents(&mut self) -> Result<()> {
        let mut first_error = None;

        for handle in self.agents.iter_mut().rev() {
            handle.termination.request(TerminationReason::GameOver);
            let Some(task) = handle.task.take() else {
                continue;
            };
            match task.await {
                Ok(Ok(())) => debug!(agent = %handle.id, "agent joined"),
                Ok(Err(e)) => {
                    error!(agent = %handle.id, error = %e, "agent exited with error");
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    error!(agent = %handle.id, error = %e, "agent task panicked");
                    first_error.get_or_insert(GameError::Join(e));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
