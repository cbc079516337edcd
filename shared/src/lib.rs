//! Wire protocol shared by the grid server and its clients.
//!
//! Every message travels as one JSON object in a WebSocket text frame. The
//! `type` field selects the variant and all field names are camelCase, so
//! browser clients can consume the packets without a translation layer.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier a client picks for itself when it registers.
pub type ClientId = String;

/// Sequential number the server hands out on registration, starting at 1.
pub type PlayerNumber = u32;

/// Owner of a single cell, `None` while the cell is unowned.
pub type Owner = Option<PlayerNumber>;

pub const DEFAULT_MAX_WIDTH: usize = 10;
pub const DEFAULT_MAX_CHECKBOXES: usize = 100;
pub const DEFAULT_START_LEVEL: usize = 1;
pub const SEASON_END_MESSAGE: &str = "Season complete! Every level has been cleared.";

/// Dimensions used to lay out the current level.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct GridConfig {
    pub rows: usize,
    pub cols: usize,
}

impl GridConfig {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Number of slots the layout can display.
    pub fn capacity(&self) -> usize {
        self.rows * self.cols
    }
}

/// Full game state as sent to clients.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub checkboxes: Vec<Owner>,
    pub grid_config: GridConfig,
    pub last_won: Option<u64>,
    pub current_level: usize,
}

impl GameSnapshot {
    pub fn owned_count(&self) -> usize {
        self.checkboxes.iter().filter(|cell| cell.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.checkboxes.iter().all(Option::is_some)
    }
}

/// Messages sent from a client to the server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientPacket {
    Register {
        client_id: ClientId,
    },
    /// `index` is signed and saturating so that any integer index reaches
    /// the server as a rejected toggle instead of an undecodable message.
    ToggleCheckbox {
        client_id: ClientId,
        #[serde(deserialize_with = "saturating_index")]
        index: i64,
    },
}

/// Reads any JSON integer into an `i64`, clamping values outside its range.
fn saturating_index<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    struct IndexVisitor;

    impl<'de> Visitor<'de> for IndexVisitor {
        type Value = i64;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("an integer cell index")
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<i64, E> {
            Ok(value)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<i64, E> {
            Ok(i64::try_from(value).unwrap_or(i64::MAX))
        }

        // Integers too long for u64 arrive as floats
        fn visit_f64<E: de::Error>(self, value: f64) -> Result<i64, E> {
            if value.is_finite() && value.fract() == 0.0 {
                Ok(value as i64)
            } else {
                Err(E::invalid_value(de::Unexpected::Float(value), &self))
            }
        }
    }

    deserializer.deserialize_any(IndexVisitor)
}

impl ClientPacket {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Messages sent from the server to clients.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerPacket {
    /// Snapshot of the grid. `player_number` is only present in the reply to
    /// a registration.
    GameStateUpdate {
        game_state: GameSnapshot,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player_number: Option<PlayerNumber>,
    },
    /// Acknowledgement of a toggle, addressed to the requester only.
    ToggleResponse {
        index: i64,
        success: bool,
        current_state: Owner,
    },
    PlayerCountUpdate {
        count: usize,
    },
    GameWon {
        timestamp: u64,
    },
    SeasonEnd {
        message: String,
    },
}

impl ServerPacket {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
