//! Shared board state: position/item bijection, markers, and the play gate

pub mod board;
pub mod gate;

pub use board::{Board, BoardSnapshot};
pub use gate::PlayGate;
