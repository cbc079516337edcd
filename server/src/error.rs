//! Error types for the grid server.

use shared::PlayerNumber;
use thiserror::Error;

/// Errors that stop the server from starting or running.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or accepting on the listening socket failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Why a toggle request was refused.
///
/// Rejections never leave the requester's session: they become a negative
/// `toggleResponse` carrying the cell's current owner.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ToggleRejection {
    #[error("index {index} is outside the grid of {len} cells")]
    InvalidIndex { index: i64, len: usize },

    #[error("client is not registered on this connection")]
    NotRegistered,

    #[error("cell is owned by player {owner}")]
    OwnedByOther { owner: PlayerNumber },
}
