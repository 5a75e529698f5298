//! Board: positions, items, markers and the play gate
//!
//! The board is the only owner of the position/item bijection. Occupancy sits
//! behind one `RwLock`: agents take the read side to toggle markers (so any
//! number of them proceed in parallel), while the orchestrator takes the write
//! side for every placement, removal and gate transition. Because the gate
//! only changes under the write side, a marker toggle that observed an open
//! gate completes before any bulk rewrite starts.

use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use super::gate::PlayGate;
use crate::display::{DisplayEvent, DisplaySink};
use crate::domain::{AgentId, Item, Position};
use crate::error::BoardError;

/// Optional-typed mapping tables, inverse of each other
#[derive(Debug)]
struct Table {
    item_at: Vec<Option<Item>>,
    position_of: Vec<Option<Position>>,
}

impl Table {
    fn new(table_size: usize, deck_size: usize) -> Self {
        Self {
            item_at: vec![None; table_size],
            position_of: vec![None; deck_size],
        }
    }

    fn check_position(&self, position: Position) -> Result<(), BoardError> {
        if position.index() < self.item_at.len() {
            Ok(())
        } else {
            Err(BoardError::OutOfRange {
                what: "position",
                index: position.index(),
                limit: self.item_at.len(),
            })
        }
    }

    fn check_item(&self, item: Item) -> Result<(), BoardError> {
        if item.index() < self.position_of.len() {
            Ok(())
        } else {
            Err(BoardError::OutOfRange {
                what: "item",
                index: item.index(),
                limit: self.position_of.len(),
            })
        }
    }

    fn is_consistent(&self) -> bool {
        let forward = self.item_at.iter().enumerate().all(|(p, slot)| match slot {
            Some(item) => self.position_of.get(item.index()) == Some(&Some(Position(p))),
            None => true,
        });
        let backward = self.position_of.iter().enumerate().all(|(i, slot)| match slot {
            Some(pos) => self.item_at.get(pos.index()) == Some(&Some(Item(i))),
            None => true,
        });
        forward && backward
    }
}

/// Point-in-time copy of occupancy, taken while the gate was open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardSnapshot {
    pub slots: Vec<Option<Item>>,
}

impl BoardSnapshot {
    pub fn occupied_positions(&self) -> Vec<Position> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(p, slot)| slot.map(|_| Position(p)))
            .collect()
    }

    pub fn items(&self) -> Vec<Item> {
        self.slots.iter().flatten().copied().collect()
    }
}

pub struct Board {
    table: RwLock<Table>,
    markers: DashMap<Position, BTreeSet<AgentId>>,
    gate: PlayGate,
    display: Arc<dyn DisplaySink>,
    table_delay: Duration,
    table_size: usize,
    deck_size: usize,
}

impl Board {
    /// Empty board with a closed gate
    pub fn new(table_size: usize, deck_size: usize, display: Arc<dyn DisplaySink>) -> Self {
        Self {
            table: RwLock::new(Table::new(table_size, deck_size)),
            markers: DashMap::new(),
            gate: PlayGate::new(false),
            display,
            table_delay: Duration::ZERO,
            table_size,
            deck_size,
        }
    }

    /// Delay applied before each card placement or removal
    pub fn with_table_delay(mut self, delay: Duration) -> Self {
        self.table_delay = delay;
        self
    }

    pub fn table_size(&self) -> usize {
        self.table_size
    }

    pub fn deck_size(&self) -> usize {
        self.deck_size
    }

    async fn table_pause(&self) {
        if !self.table_delay.is_zero() {
            tokio::time::sleep(self.table_delay).await;
        }
    }

    // === Occupancy ===

    /// Put `item` on `position`
    pub async fn place(&self, item: Item, position: Position) -> Result<(), BoardError> {
        self.table_pause().await;
        let mut table = self.table.write().await;
        table.check_position(position)?;
        table.check_item(item)?;

        if let Some(existing) = table.item_at[position.index()] {
            return Err(BoardError::OccupiedPosition {
                position,
                item: existing,
            });
        }
        if let Some(elsewhere) = table.position_of[item.index()] {
            return Err(BoardError::ItemInPlay {
                item,
                position: elsewhere,
            });
        }

        table.item_at[position.index()] = Some(item);
        table.position_of[item.index()] = Some(position);
        self.display.publish(DisplayEvent::ItemPlaced { item, position });
        Ok(())
    }

    /// Take the item off `position`, dropping any markers left on it
    ///
    /// Returns the removed item so the caller can return it to the deck.
    pub async fn clear(&self, position: Position) -> Result<Option<Item>, BoardError> {
        let mut table = self.table.write().await;
        table.check_position(position)?;

        let Some(item) = table.item_at[position.index()] else {
            return Ok(None);
        };
        drop(table);

        self.table_pause().await;
        let mut table = self.table.write().await;
        // Only the orchestrator clears, so the slot cannot have changed meanwhile
        if table.item_at[position.index()] != Some(item) {
            return Ok(None);
        }

        if let Some((_, holders)) = self.markers.remove(&position) {
            debug!(%position, stale = holders.len(), "dropping markers on cleared position");
            for agent in holders {
                self.display
                    .publish(DisplayEvent::MarkerRemoved { agent, position });
            }
        }

        table.item_at[position.index()] = None;
        table.position_of[item.index()] = None;
        self.display.publish(DisplayEvent::ItemRemoved { position });
        Ok(Some(item))
    }

    pub async fn item_at(&self, position: Position) -> Option<Item> {
        let table = self.table.read().await;
        table.item_at.get(position.index()).copied().flatten()
    }

    pub async fn position_of(&self, item: Item) -> Option<Position> {
        let table = self.table.read().await;
        table.position_of.get(item.index()).copied().flatten()
    }

    pub async fn occupied_positions(&self) -> Vec<Position> {
        let table = self.table.read().await;
        table
            .item_at
            .iter()
            .enumerate()
            .filter_map(|(p, slot)| slot.map(|_| Position(p)))
            .collect()
    }

    pub async fn empty_positions(&self) -> Vec<Position> {
        let table = self.table.read().await;
        table
            .item_at
            .iter()
            .enumerate()
            .filter_map(|(p, slot)| slot.is_none().then_some(Position(p)))
            .collect()
    }

    /// Items on the board, in position order
    pub async fn items(&self) -> Vec<Item> {
        let table = self.table.read().await;
        table.item_at.iter().flatten().copied().collect()
    }

    pub async fn count_items(&self) -> usize {
        let table = self.table.read().await;
        table.item_at.iter().filter(|slot| slot.is_some()).count()
    }

    /// Occupancy as agents may see it; `None` while the gate is closed
    pub async fn snapshot(&self) -> Option<BoardSnapshot> {
        let table = self.table.read().await;
        self.gate.is_open().then(|| BoardSnapshot {
            slots: table.item_at.clone(),
        })
    }

    /// Do both mapping tables agree?
    pub async fn is_consistent(&self) -> bool {
        self.table.read().await.is_consistent()
    }

    // === Markers ===

    /// Place `agent`'s marker on `position`; `Ok(false)` if it was already there
    pub async fn mark(&self, agent: AgentId, position: Position) -> Result<bool, BoardError> {
        let table = self.table.read().await;
        table.check_position(position)?;
        if !self.gate.is_open() {
            return Err(BoardError::GateClosed);
        }
        if table.item_at[position.index()].is_none() {
            return Err(BoardError::EmptyPosition { position });
        }

        let inserted = self.markers.entry(position).or_default().insert(agent);
        if inserted {
            self.display
                .publish(DisplayEvent::MarkerPlaced { agent, position });
        }
        Ok(inserted)
    }

    /// Remove `agent`'s marker from `position`; a stale unmark is `Ok(false)`
    pub async fn unmark(&self, agent: AgentId, position: Position) -> Result<bool, BoardError> {
        let _table = self.table.read().await;
        if !self.gate.is_open() {
            return Err(BoardError::GateClosed);
        }

        let removed = match self.markers.get_mut(&position) {
            Some(mut holders) => holders.remove(&agent),
            None => false,
        };
        self.markers.remove_if(&position, |_, holders| holders.is_empty());

        if removed {
            self.display
                .publish(DisplayEvent::MarkerRemoved { agent, position });
        }
        Ok(removed)
    }

    pub fn has_marker(&self, agent: AgentId, position: Position) -> bool {
        self.markers
            .get(&position)
            .map(|holders| holders.contains(&agent))
            .unwrap_or(false)
    }

    /// Positions carrying `agent`'s marker, in position order
    pub fn markers_of(&self, agent: AgentId) -> Vec<Position> {
        let mut positions: Vec<Position> = self
            .markers
            .iter()
            .filter(|entry| entry.value().contains(&agent))
            .map(|entry| *entry.key())
            .collect();
        positions.sort_unstable();
        positions
    }

    pub fn markers_at(&self, position: Position) -> Vec<AgentId> {
        self.markers
            .get(&position)
            .map(|holders| holders.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Drop every marker on `positions`, reporting who lost which positions
    pub async fn clear_markers_at(
        &self,
        positions: &[Position],
    ) -> BTreeMap<AgentId, Vec<Position>> {
        let _table = self.table.write().await;
        let mut lost: BTreeMap<AgentId, Vec<Position>> = BTreeMap::new();

        for &position in positions {
            if let Some((_, holders)) = self.markers.remove(&position) {
                for agent in holders {
                    self.display
                        .publish(DisplayEvent::MarkerRemoved { agent, position });
                    lost.entry(agent).or_default().push(position);
                }
            }
        }
        lost
    }

    pub async fn clear_all_markers(&self) {
        let _table = self.table.write().await;
        self.markers.clear();
        self.display.publish(DisplayEvent::AllMarkersCleared);
    }

    // === Gate ===

    /// Close the gate; returns whether it was open
    ///
    /// Waits for every in-flight marker toggle to finish first.
    pub async fn close_gate(&self) -> bool {
        let _table = self.table.write().await;
        self.gate.close()
    }

    /// Open the gate; returns whether it was already open
    pub async fn open_gate(&self) -> bool {
        let _table = self.table.write().await;
        self.gate.open()
    }

    pub fn is_open(&self) -> bool {
        self.gate.is_open()
    }

    /// Nudge every agent suspended on the gate to re-check it
    pub fn wake(&self) {
        self.gate.wake();
    }

    pub async fn await_open(&self) {
        self.gate.await_open().await;
    }
}

impl std::fmt::Debug for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Board")
            .field("table_size", &self.table_size)
            .field("deck_size", &self.deck_size)
            .field("open", &self.gate.is_open())
            .field("marked_positions", &self.markers.len())
            .finish()
    }
}
