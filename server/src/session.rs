//! Session coordinator: the only place game state and registrations change.
//!
//! The coordinator owns the grid, the player registry and the connection
//! registry as one aggregate. The network event loop feeds it connection,
//! packet and disconnect events one at a time, and each event is handled to
//! completion, outbound packets included, before the next one starts.

use crate::client_manager::{ClientManager, ConnectionId};
use crate::error::ToggleRejection;
use crate::game::{GameConfig, GameState, LevelCompletion};
use crate::registry::{PlayerRegistry, Registration};
use crate::utils::unix_timestamp;
use log::{debug, info, warn};
use shared::{ClientPacket, Owner, ServerPacket, SEASON_END_MESSAGE};
use std::net::SocketAddr;
use tokio::sync::mpsc;

pub struct Coordinator {
    game: GameState,
    players: PlayerRegistry,
    clients: ClientManager,
    clock: fn() -> u64,
}

impl Coordinator {
    pub fn new(config: GameConfig, max_clients: usize) -> Self {
        Self {
            game: GameState::new(config),
            players: PlayerRegistry::new(),
            clients: ClientManager::new(max_clients),
            clock: unix_timestamp,
        }
    }

    /// Replaces the wall clock used to stamp level wins.
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }

    /// Starts tracking a connection. Returns false when the server is full;
    /// the sender is dropped in that case, which closes the connection.
    pub fn connect(
        &mut self,
        connection: ConnectionId,
        addr: SocketAddr,
        sender: mpsc::Sender<ServerPacket>,
    ) -> bool {
        self.clients.add_connection(connection, addr, sender)
    }

    pub fn handle_packet(&mut self, connection: ConnectionId, packet: ClientPacket) {
        match packet {
            ClientPacket::Register { client_id } => self.register(connection, &client_id),
            ClientPacket::ToggleCheckbox { client_id, index } => {
                self.toggle(connection, &client_id, index)
            }
        }
    }

    /// Implicit unregistration on transport close.
    pub fn disconnect(&mut self, connection: ConnectionId) {
        if self.clients.remove_connection(connection).is_none() {
            return;
        }

        if self.players.remove_connection(connection).is_some() {
            self.broadcast_player_count();
        }
    }

    fn register(&mut self, connection: ConnectionId, client_id: &str) {
        if client_id.is_empty() {
            warn!("Connection {} sent a registration without a client id", connection);
            return;
        }

        match self.clients.client_id(connection) {
            Some(bound) if bound != client_id => {
                warn!(
                    "Connection {} is registered as {} and cannot re-register as {}",
                    connection, bound, client_id
                );
                return;
            }
            _ => {}
        }

        if !self.clients.bind_client(connection, client_id) {
            debug!("Registration from unknown connection {}", connection);
            return;
        }

        let registration = self.players.register(client_id, connection);
        if let Registration::Existing {
            previous: Some(previous),
            ..
        } = registration
        {
            info!(
                "{} moved from connection {} to {}",
                client_id, previous, connection
            );
            self.clients.unbind_client(previous);
        }

        self.clients.send_to(
            connection,
            ServerPacket::GameStateUpdate {
                game_state: self.game.snapshot(),
                player_number: Some(registration.player_number()),
            },
        );

        if let Registration::New(_) = registration {
            self.broadcast_player_count();
        }
    }

    fn toggle(&mut self, connection: ConnectionId, client_id: &str, index: i64) {
        let result = match self.players.player_on(client_id, connection) {
            Some(player) => self.game.toggle(player, index),
            None => Err(ToggleRejection::NotRegistered),
        };

        let owner = match result {
            Ok(owner) => owner,
            Err(rejection) => {
                debug!(
                    "Rejected toggle of {} from {} on connection {}: {}",
                    index, client_id, connection, rejection
                );
                let current = self.game.owner_at(index);
                self.acknowledge(connection, index, false, current);
                return;
            }
        };

        // The requester hears about its own move before anyone sees the result
        self.acknowledge(connection, index, true, owner);
        self.broadcast_state();

        match self.game.check_win((self.clock)()) {
            Some(LevelCompletion::Advanced { timestamp }) => {
                info!("Level won at {}", timestamp);
                self.clients.broadcast(&ServerPacket::GameWon { timestamp });
                self.broadcast_state();
            }
            Some(LevelCompletion::SeasonComplete) => {
                self.clients.broadcast(&ServerPacket::SeasonEnd {
                    message: SEASON_END_MESSAGE.to_string(),
                });
            }
            None => {}
        }
    }

    fn acknowledge(&mut self, connection: ConnectionId, index: i64, success: bool, owner: Owner) {
        self.clients.send_to(
            connection,
            ServerPacket::ToggleResponse {
                index,
                success,
                current_state: owner,
            },
        );
    }

    fn broadcast_state(&mut self) {
        let packet = ServerPacket::GameStateUpdate {
            game_state: self.game.snapshot(),
            player_number: None,
        };
        self.clients.broadcast(&packet);
    }

    fn broadcast_player_count(&mut self) {
        let count = self.players.len();
        info!("{} players online", count);
        self.clients
            .broadcast(&ServerPacket::PlayerCountUpdate { count });
    }
}
