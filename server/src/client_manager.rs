//! Connection tracking and outbound fan-out for the grid server
//!
//! This module handles the server-side bookkeeping of open connections:
//! - Connection lifecycle (accept, bind to a client, close)
//! - Capacity enforcement for concurrent connections
//! - Non-blocking delivery of packets to one connection or to all of them
//!
//! Each connection owns a bounded outbound queue drained by its transport
//! task. The event loop only ever uses `try_send`, so a stalled peer loses
//! packets instead of holding up every other client.

use log::{debug, info, warn};
use shared::{ClientId, ServerPacket};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Server-internal identifier of a transport connection
pub type ConnectionId = u64;

/// Represents an open connection and the client registered on it
#[derive(Debug)]
pub struct Connection {
    /// Identifier assigned by the accept loop
    pub id: ConnectionId,
    /// Remote address, for logging
    pub addr: SocketAddr,
    /// When the connection was accepted
    pub connected_at: Instant,
    /// Client bound to this connection once it has registered
    pub client_id: Option<ClientId>,
    /// Packets dropped because the outbound queue was full
    pub dropped_packets: u64,
    sender: mpsc::Sender<ServerPacket>,
}

impl Connection {
    pub fn new(id: ConnectionId, addr: SocketAddr, sender: mpsc::Sender<ServerPacket>) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            client_id: None,
            dropped_packets: 0,
            sender,
        }
    }

    /// Queues a packet without waiting
    ///
    /// Returns false when the packet could not be queued. A full queue is
    /// counted and logged; a closed queue means the transport task is gone
    /// and its disconnect event is on the way.
    fn deliver(&mut self, packet: ServerPacket) -> bool {
        match self.sender.try_send(packet) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped_packets += 1;
                warn!(
                    "Outbound queue full for connection {} ({}), dropped {} packets so far",
                    self.id, self.addr, self.dropped_packets
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Connection {} already closed", self.id);
                false
            }
        }
    }
}

/// Registry of open connections used for addressing and broadcast
pub struct ClientManager {
    /// Open connections indexed by their identifier
    connections: HashMap<ConnectionId, Connection>,
    /// Maximum number of concurrent connections allowed
    max_clients: usize,
}

impl ClientManager {
    /// Creates an empty registry with the given capacity limit
    pub fn new(max_clients: usize) -> Self {
        Self {
            connections: HashMap::new(),
            max_clients,
        }
    }

    /// Tracks a newly accepted connection
    ///
    /// Returns false if the server is at capacity. The caller then drops the
    /// sender, which makes the transport task close the socket.
    pub fn add_connection(
        &mut self,
        id: ConnectionId,
        addr: SocketAddr,
        sender: mpsc::Sender<ServerPacket>,
    ) -> bool {
        if self.connections.len() >= self.max_clients {
            warn!(
                "Refusing connection {} from {}: server full ({} connections)",
                id,
                addr,
                self.connections.len()
            );
            return false;
        }

        info!("Connection {} opened from {}", id, addr);
        self.connections
            .insert(id, Connection::new(id, addr, sender));
        true
    }

    /// Stops tracking a connection and returns it
    pub fn remove_connection(&mut self, id: ConnectionId) -> Option<Connection> {
        let connection = self.connections.remove(&id)?;
        info!(
            "Connection {} from {} closed after {:.1}s",
            id,
            connection.addr,
            connection.connected_at.elapsed().as_secs_f32()
        );
        Some(connection)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Client registered on the connection, if any
    pub fn client_id(&self, id: ConnectionId) -> Option<&str> {
        self.connections
            .get(&id)
            .and_then(|connection| connection.client_id.as_deref())
    }

    /// Binds a client identifier to a connection
    pub fn bind_client(&mut self, id: ConnectionId, client_id: &str) -> bool {
        match self.connections.get_mut(&id) {
            Some(connection) => {
                connection.client_id = Some(client_id.to_string());
                true
            }
            None => false,
        }
    }

    /// Forgets which client was registered on a connection
    pub fn unbind_client(&mut self, id: ConnectionId) {
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.client_id = None;
        }
    }

    /// Sends a packet to a single connection
    pub fn send_to(&mut self, id: ConnectionId, packet: ServerPacket) -> bool {
        match self.connections.get_mut(&id) {
            Some(connection) => connection.deliver(packet),
            None => false,
        }
    }

    /// Sends a packet to every open connection
    ///
    /// Returns how many connections accepted the packet into their queue.
    pub fn broadcast(&mut self, packet: &ServerPacket) -> usize {
        self.connections
            .values_mut()
            .map(|connection| connection.deliver(packet.clone()))
            .filter(|&delivered| delivered)
            .count()
    }

    /// Returns the number of open connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns true if no connections are open
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
