//! Server network layer: WebSocket transport and the event loop that drives
//! the session coordinator

use crate::client_manager::ConnectionId;
use crate::error::ServerError;
use crate::game::GameConfig;
use crate::session::Coordinator;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientPacket, ServerPacket};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub const DEFAULT_MAX_CLIENTS: usize = 1024;
pub const DEFAULT_SEND_QUEUE_CAPACITY: usize = 256;

/// Settings for a server instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    pub game: GameConfig,
    /// Maximum number of concurrent connections
    pub max_clients: usize,
    /// Length of each connection's outbound queue
    pub send_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            game: GameConfig::default(),
            max_clients: DEFAULT_MAX_CLIENTS,
            send_queue_capacity: DEFAULT_SEND_QUEUE_CAPACITY,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ServerError> {
        self.game.validate()?;
        if self.max_clients == 0 {
            return Err(ServerError::Config("max clients must be at least 1".into()));
        }
        if self.send_queue_capacity == 0 {
            return Err(ServerError::Config(
                "send queue capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Messages sent from network tasks to the event loop
#[derive(Debug)]
pub enum ServerEvent {
    Connected {
        connection: ConnectionId,
        addr: SocketAddr,
        sender: mpsc::Sender<ServerPacket>,
    },
    PacketReceived {
        connection: ConnectionId,
        packet: ClientPacket,
    },
    Disconnected {
        connection: ConnectionId,
    },
    Shutdown,
}

/// Main server coordinating connections and the shared game
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    coordinator: Coordinator,
    send_queue_capacity: usize,

    // Communication channels
    event_tx: mpsc::UnboundedSender<ServerEvent>,
    event_rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Server {
    pub async fn bind(addr: &str, config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on ws://{}", local_addr);

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            coordinator: Coordinator::new(config.game, config.max_clients),
            send_queue_capacity: config.send_queue_capacity,
            event_tx,
            event_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle for stopping the event loop from another task
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerEvent> {
        self.event_tx.clone()
    }

    /// Spawns task that accepts connections and starts one task per peer
    fn spawn_listener(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let event_tx = self.event_tx.clone();
        let queue_capacity = self.send_queue_capacity;

        tokio::spawn(async move {
            let mut next_connection: ConnectionId = 1;

            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let connection = next_connection;
                        next_connection += 1;
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            connection,
                            event_tx.clone(),
                            queue_capacity,
                        ));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    }
                }

                if event_tx.is_closed() {
                    break;
                }
            }
        });
    }

    fn handle_event(&mut self, event: ServerEvent) -> bool {
        match event {
            ServerEvent::Connected {
                connection,
                addr,
                sender,
            } => {
                self.coordinator.connect(connection, addr, sender);
            }
            ServerEvent::PacketReceived { connection, packet } => {
                self.coordinator.handle_packet(connection, packet);
            }
            ServerEvent::Disconnected { connection } => {
                self.coordinator.disconnect(connection);
            }
            ServerEvent::Shutdown => return false,
        }
        true
    }

    /// Main server loop: every event is applied to the game, and its packets
    /// queued, before the next one is taken
    pub async fn run(&mut self) -> Result<(), ServerError> {
        self.spawn_listener();
        info!("Server started successfully");

        while let Some(event) = self.event_rx.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }

        info!("Server shutting down");
        Ok(())
    }
}

/// Runs one WebSocket session until either side closes it
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    connection: ConnectionId,
    event_tx: mpsc::UnboundedSender<ServerEvent>,
    queue_capacity: usize,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();
    let (sender, mut outbound) = mpsc::channel::<ServerPacket>(queue_capacity);

    if event_tx
        .send(ServerEvent::Connected {
            connection,
            addr,
            sender,
        })
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => match ClientPacket::from_json(text.as_str()) {
                    Ok(packet) => {
                        if event_tx
                            .send(ServerEvent::PacketReceived { connection, packet })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => warn!("Dropping malformed message from {}: {}", addr, e),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Binary(_))) => debug!("Ignoring binary frame from {}", addr),
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Read error on connection {}: {}", connection, e);
                    break;
                }
            },

            outgoing = outbound.recv() => match outgoing {
                Some(packet) => match packet.to_json() {
                    Ok(json) => {
                        if let Err(e) = write.send(Message::text(json)).await {
                            debug!("Write error on connection {}: {}", connection, e);
                            break;
                        }
                    }
                    Err(e) => error!("Failed to serialize packet: {}", e),
                },
                // The event loop let go of this connection
                None => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
            },
        }
    }

    let _ = event_tx.send(ServerEvent::Disconnected { connection });
}
