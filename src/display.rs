//! Display sink: one-way notifications from the game core to a front-end
//!
//! The core never consumes anything back from the display. Sinks must be cheap
//! and non-blocking: the board publishes while holding its rewrite lock.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::domain::{AgentId, Item, Position};

/// Everything a front-end may want to render
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DisplayEvent {
    ItemPlaced { item: Item, position: Position },
    ItemRemoved { position: Position },
    MarkerPlaced { agent: AgentId, position: Position },
    MarkerRemoved { agent: AgentId, position: Position },
    /// Every marker on the board was dropped (round reshuffle)
    AllMarkersCleared,
    ScoreUpdated { agent: AgentId, score: u32 },
    Countdown { remaining_ms: u64, warn: bool },
    /// `remaining_ms == 0` ends the freeze
    Freeze { agent: AgentId, remaining_ms: u64 },
    Hint { positions: Vec<Position> },
    Winners { agents: Vec<AgentId> },
}

#[cfg_attr(test, mockall::automock)]
pub trait DisplaySink: Send + Sync {
    fn publish(&self, event: DisplayEvent);
}

/// Drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl DisplaySink for NullDisplay {
    fn publish(&self, _event: DisplayEvent) {}
}

/// Renders events as structured log lines
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDisplay;

impl DisplaySink for TracingDisplay {
    fn publish(&self, event: DisplayEvent) {
        match event {
            DisplayEvent::ItemPlaced { item, position } => {
                debug!(%item, %position, "item placed")
            }
            DisplayEvent::ItemRemoved { position } => debug!(%position, "item removed"),
            DisplayEvent::MarkerPlaced { agent, position } => {
                trace!(%agent, %position, "marker placed")
            }
            DisplayEvent::MarkerRemoved { agent, position } => {
                trace!(%agent, %position, "marker removed")
            }
            DisplayEvent::AllMarkersCleared => debug!("all markers cleared"),
            DisplayEvent::ScoreUpdated { agent, score } => info!(%agent, score, "score updated"),
            DisplayEvent::Countdown { remaining_ms, warn } => {
                trace!(remaining_ms, warn, "countdown")
            }
            DisplayEvent::Freeze {
                agent,
                remaining_ms,
            } => debug!(%agent, remaining_ms, "freeze"),
            DisplayEvent::Hint { positions } => info!(?positions, "hint: set on board"),
            DisplayEvent::Winners { agents } => info!(?agents, "winners announced"),
        }
    }
}

/// Writes one JSON object per event to the wrapped writer
pub struct JsonLinesDisplay<W: Write + Send> {
    out: Mutex<W>,
}

impl JsonLinesDisplay<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesDisplay<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    fn write_event(&self, event: &DisplayEvent) -> crate::error::Result<()> {
        let line = serde_json::to_string(event)?;
        // A writer half-way through a line is still usable for the next one
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> DisplaySink for JsonLinesDisplay<W> {
    fn publish(&self, event: DisplayEvent) {
        if let Err(e) = self.write_event(&event) {
            warn!(error = %e, "failed to write display event");
        }
    }
}

/// Forwards events into an unbounded channel for a front-end task
#[derive(Debug, Clone)]
pub struct ChannelDisplay {
    tx: mpsc::UnboundedSender<DisplayEvent>,
}

impl ChannelDisplay {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DisplayEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl DisplaySink for ChannelDisplay {
    fn publish(&self, event: DisplayEvent) {
        // Receiver gone means nobody is watching anymore
        let _ = self.tx.send(event);
    }
}

/// Publishes every event to each inner sink in order
#[derive(Clone, Default)]
pub struct FanoutDisplay {
    sinks: Vec<Arc<dyn DisplaySink>>,
}

impl FanoutDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn DisplaySink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl DisplaySink for FanoutDisplay {
    fn publish(&self, event: DisplayEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.publish(event.clone());
            }
            last.publish(event);
        }
    }
}
