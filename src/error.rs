use thiserror::Error;

use crate::domain::{AgentId, Item, Position};

/// Main error type for the game engine
#[derive(Error, Debug)]
pub enum GameError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Board contract violations
    #[error("Board error: {0}")]
    Board(#[from] BoardError),

    // Coordination errors
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Unknown agent: {0}")]
    UnknownAgent(AgentId),

    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for GameError
pub type Result<T> = std::result::Result<T, GameError>;

/// Caller-contract violations rejected at the board boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("Position {position} already holds item {item}")]
    OccupiedPosition { position: Position, item: Item },

    #[error("Position {position} holds no item")]
    EmptyPosition { position: Position },

    #[error("Item {item} is already on the board at {position}")]
    ItemInPlay { item: Item, position: Position },

    #[error("{what} {index} out of range (limit {limit})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        limit: usize,
    },

    #[error("Play gate is closed")]
    GateClosed,
}
