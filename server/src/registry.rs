//! Player registry: which client identifiers are playing, under which number,
//! and through which connection.

use crate::client_manager::ConnectionId;
use log::info;
use shared::{ClientId, PlayerNumber};
use std::collections::HashMap;

/// Result of a registration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// First registration of this client; a fresh number was issued.
    New(PlayerNumber),
    /// The client was already registered. `previous` is the connection the
    /// registration was bound to before, if it differs from the new one.
    Existing {
        player_number: PlayerNumber,
        previous: Option<ConnectionId>,
    },
}

impl Registration {
    pub fn player_number(&self) -> PlayerNumber {
        match *self {
            Registration::New(number) => number,
            Registration::Existing { player_number, .. } => player_number,
        }
    }
}

#[derive(Debug, Clone)]
struct Player {
    number: PlayerNumber,
    connection: ConnectionId,
}

/// Explicit ClientId -> PlayerNumber table with a monotonically increasing
/// counter. Numbers are never handed out twice while the process runs.
#[derive(Debug)]
pub struct PlayerRegistry {
    players: HashMap<ClientId, Player>,
    next_player_number: PlayerNumber,
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
            next_player_number: 1,
        }
    }

    /// Registers `client_id` on `connection`, or re-binds an existing
    /// registration to it without issuing a new number.
    pub fn register(&mut self, client_id: &str, connection: ConnectionId) -> Registration {
        if let Some(player) = self.players.get_mut(client_id) {
            let previous = (player.connection != connection).then_some(player.connection);
            player.connection = connection;
            return Registration::Existing {
                player_number: player.number,
                previous,
            };
        }

        let number = self.next_player_number;
        self.next_player_number += 1;
        self.players.insert(
            client_id.to_string(),
            Player {
                number,
                connection,
            },
        );

        info!("Registered {} as player {}", client_id, number);
        Registration::New(number)
    }

    pub fn lookup(&self, client_id: &str) -> Option<PlayerNumber> {
        self.players.get(client_id).map(|player| player.number)
    }

    /// Number of `client_id`, but only when its registration is bound to
    /// `connection`.
    pub fn player_on(&self, client_id: &str, connection: ConnectionId) -> Option<PlayerNumber> {
        self.players
            .get(client_id)
            .filter(|player| player.connection == connection)
            .map(|player| player.number)
    }

    /// Removes the registration bound to `connection`, if any.
    pub fn remove_connection(
        &mut self,
        connection: ConnectionId,
    ) -> Option<(ClientId, PlayerNumber)> {
        let client_id = self
            .players
            .iter()
            .find(|(_, player)| player.connection == connection)
            .map(|(id, _)| id.clone())?;

        let player = self.players.remove(&client_id)?;
        info!("Unregistered {} (player {})", client_id, player.number);
        Some((client_id, player.number))
    }

    /// True if `number` has been issued at some point.
    pub fn was_issued(&self, number: PlayerNumber) -> bool {
        number >= 1 && number < self.next_player_number
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
