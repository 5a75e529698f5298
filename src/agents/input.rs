//! Human input: key presses routed into an agent's action queue

use std::collections::HashMap;
use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, trace, warn};

use crate::board::Board;
use crate::coordination::Termination;
use crate::domain::{AgentId, Position};
use crate::error::Result;

/// Press handler for one human agent
///
/// Like a key listener, it never blocks: presses are dropped while the gate is
/// closed or while the agent still has a full selection's worth queued.
#[derive(Debug, Clone)]
pub struct ActionSender {
    agent: AgentId,
    board: Arc<Board>,
    tx: mpsc::Sender<Position>,
}

impl ActionSender {
    pub fn new(agent: AgentId, board: Arc<Board>, tx: mpsc::Sender<Position>) -> Self {
        Self { agent, board, tx }
    }

    pub fn agent(&self) -> AgentId {
        self.agent
    }

    /// Queue a toggle of `position`; returns whether it was accepted
    pub fn press(&self, position: Position) -> bool {
        if !self.board.is_open() {
            trace!(agent = %self.agent, %position, "gate closed, press dropped");
            return false;
        }

        match self.tx.try_send(position) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(agent = %self.agent, %position, "action queue full, press dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!(agent = %self.agent, %position, "agent no longer accepts input");
                false
            }
        }
    }
}

/// Parse an `<agent> <position>` input line
pub fn parse_press(line: &str) -> Option<(AgentId, Position)> {
    let mut parts = line.split_whitespace();
    let agent = parts.next()?.parse().ok()?;
    let position = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((AgentId(agent), Position(position)))
}

/// Route `<agent> <position>` lines from `reader` to the matching senders
///
/// Blocking; returns when the reader is exhausted or termination is requested.
pub fn forward_lines<R: BufRead>(
    reader: R,
    senders: Vec<ActionSender>,
    termination: &Termination,
) -> Result<()> {
    let routes: HashMap<AgentId, ActionSender> =
        senders.into_iter().map(|s| (s.agent(), s)).collect();

    for line in reader.lines() {
        if termination.is_requested() {
            break;
        }
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match parse_press(&line) {
            Some((agent, position)) => match routes.get(&agent) {
                Some(sender) => {
                    sender.press(position);
                }
                None => warn!(%agent, "input for an agent without human control"),
            },
            None => warn!(line = %line.trim(), "expected `<agent> <position>`"),
        }
    }
    info!("input closed");
    Ok(())
}

/// Forward the process's standard input on a dedicated thread
///
/// Reading a terminal blocks, so the reader lives outside the runtime and never
/// holds up its shutdown.
pub fn forward_stdin(
    senders: Vec<ActionSender>,
    termination: Termination,
) -> std::io::Result<std::thread::JoinHandle<Result<()>>> {
    std::thread::Builder::new()
        .name("setrace-input".to_string())
        .spawn(move || forward_lines(std::io::stdin().lock(), senders, &termination))
}
