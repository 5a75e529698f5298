//! Selection: an agent's ordered, bounded set of marked positions

use crate::domain::Position;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    positions: Vec<Position>,
    capacity: usize,
}

impl Selection {
    pub fn new(capacity: usize) -> Self {
        Self {
            positions: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn contains(&self, position: Position) -> bool {
        self.positions.contains(&position)
    }

    /// Append `position`; false if already selected or full
    pub fn insert(&mut self, position: Position) -> bool {
        if self.is_full() || self.contains(position) {
            return false;
        }
        self.positions.push(position);
        true
    }

    pub fn remove(&mut self, position: Position) -> bool {
        let before = self.positions.len();
        self.positions.retain(|&p| p != position);
        self.positions.len() != before
    }

    /// Drop every position in `positions`; returns how many were held
    pub fn discard(&mut self, positions: &[Position]) -> usize {
        let before = self.positions.len();
        self.positions.retain(|p| !positions.contains(p));
        before - self.positions.len()
    }

    pub fn clear(&mut self) {
        self.positions.clear();
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.positions.len() >= self.capacity
    }

    /// Positions in the order they were selected
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_respects_capacity() {
        let mut selection = Selection::new(3);
        assert!(selection.insert(Position(4)));
        assert!(selection.insert(Position(1)));
        assert!(!selection.insert(Position(4)));
        assert!(selection.insert(Position(9)));
        assert!(selection.is_full());
        assert!(!selection.insert(Position(0)));
        assert_eq!(selection.len(), 3);
        assert_eq!(
            selection.positions(),
            &[Position(4), Position(1), Position(9)]
        );
    }

    #[test]
    fn test_remove_and_discard() {
        let mut selection = Selection::new(3);
        for p in [0, 1, 2] {
            selection.insert(Position(p));
        }
        assert!(selection.remove(Position(1)));
        assert!(!selection.remove(Position(1)));
        assert_eq!(selection.discard(&[Position(2), Position(7)]), 1);
        assert_eq!(selection.positions(), &[Position(0)]);

        selection.clear();
        assert!(selection.is_empty());
    }
}
