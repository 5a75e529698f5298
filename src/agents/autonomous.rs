//! Autonomous input: random presses for computer-controlled agents
//!
//! The generator is a background task owned by its agent: the agent spawns it,
//! stops it through its termination token and joins it before exiting. It reads
//! the board only through gate-consistent snapshots and blocks on the action
//! queue, so it never holds more than a selection's worth of presses.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::board::Board;
use crate::coordination::Termination;
use crate::domain::{AgentId, Position};

/// Idle pause when the board has nothing to press
const EMPTY_BOARD_BACKOFF: Duration = Duration::from_millis(10);

pub struct AutonomousInput {
    agent: AgentId,
    board: Arc<Board>,
    tx: mpsc::Sender<Position>,
    rng: StdRng,
    think: Duration,
    termination: Termination,
}

impl AutonomousInput {
    pub fn new(
        agent: AgentId,
        board: Arc<Board>,
        tx: mpsc::Sender<Position>,
        rng: StdRng,
        think: Duration,
        termination: Termination,
    ) -> Self {
        Self {
            agent,
            board,
            tx,
            rng,
            think,
            termination,
        }
    }

    /// Token that stops this generator
    pub fn termination(&self) -> &Termination {
        &self.termination
    }

    /// Pick a random occupied position, or `None` while the gate is closed or the board is empty
    async fn choose(&mut self) -> Option<Position> {
        let snapshot = self.board.snapshot().await?;
        snapshot.occupied_positions().choose(&mut self.rng).copied()
    }

    /// Sleep for `duration`; false if termination fired first
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.termination.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    pub async fn run(mut self) {
        debug!(agent = %self.agent, "autonomous input starting");
        let termination = self.termination.clone();

        loop {
            tokio::select! {
                biased;
                _ = termination.cancelled() => break,
                _ = self.board.await_open() => {}
            }

            let Some(position) = self.choose().await else {
                if !self.pause(EMPTY_BOARD_BACKOFF).await {
                    break;
                }
                continue;
            };

            let sent = tokio::select! {
                biased;
                _ = termination.cancelled() => break,
                sent = self.tx.send(position) => sent,
            };
            if sent.is_err() {
                // Agent dropped its queue
                break;
            }
            trace!(agent = %self.agent, %position, "autonomous press");

            if !self.think.is_zero() && !self.pause(self.think).await {
                break;
            }
        }

        debug!(agent = %self.agent, "autonomous input stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::TerminationReason;
    use crate::display::NullDisplay;
    use crate::domain::Item;
    use rand::SeedableRng;

    #[tokio::test]
    async fn test_presses_only_occupied_positions() {
        let board = Arc::new(Board::new(6, 10, Arc::new(NullDisplay)));
        board.place(Item(0), Position(1)).await.unwrap();
        board.place(Item(1), Position(4)).await.unwrap();
        board.open_gate().await;

        let (tx, mut rx) = mpsc::channel(3);
        let termination = Termination::new();
        let generator = AutonomousInput::new(
            AgentId(0),
            board,
            tx,
            StdRng::seed_from_u64(11),
            Duration::ZERO,
            termination.clone(),
        );
        let task = tokio::spawn(generator.run());

        for _ in 0..20 {
            let position = rx.recv().await.unwrap();
            assert!(position == Position(1) || position == Position(4));
        }

        termination.request(TerminationReason::GameOver);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_stops_while_blocked_on_full_queue() {
        let board = Arc::new(Board::new(3, 3, Arc::new(NullDisplay)));
        board.place(Item(2), Position(0)).await.unwrap();
        board.open_gate().await;

        let (tx, mut rx) = mpsc::channel(1);
        let termination = Termination::new();
        let task = tokio::spawn(
            AutonomousInput::new(
                AgentId(3),
                board,
                tx,
                StdRng::seed_from_u64(1),
                Duration::ZERO,
                termination.clone(),
            )
            .run(),
        );

        // Nobody drains: the generator fills the queue and blocks
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(rx.try_recv().ok(), Some(Position(0)));
        tokio::time::sleep(Duration::from_millis(20)).await;

        termination.request(TerminationReason::GameOver);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("generator should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_waits_for_gate() {
        let board = Arc::new(Board::new(3, 3, Arc::new(NullDisplay)));
        board.place(Item(0), Position(2)).await.unwrap();

        let (tx, mut rx) = mpsc::channel(3);
        let termination = Termination::new();
        let task = tokio::spawn(
            AutonomousInput::new(
                AgentId(0),
                board.clone(),
                tx,
                StdRng::seed_from_u64(5),
                Duration::from_millis(1),
                termination.clone(),
            )
            .run(),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());

        board.open_gate().await;
        assert_eq!(rx.recv().await, Some(Position(2)));

        termination.request(TerminationReason::GameOver);
        task.await.unwrap();
    }
}
