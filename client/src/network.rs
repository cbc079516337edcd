use crate::game::ClientGameState;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shared::{ClientId, ClientPacket, PlayerNumber, ServerPacket};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Errors raised by the client connection.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed by server")]
    Closed,

    #[error("server did not confirm the registration")]
    NotRegistered,
}

/// How long the bot waits for each outstanding acknowledgement once it has
/// stopped sending.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Totals reported when the bot stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BotSummary {
    pub sent: usize,
    pub accepted: usize,
    pub rejected: usize,
    /// Toggles whose acknowledgement never arrived
    pub unanswered: usize,
    pub levels_won: u32,
}

/// Random identifier in the same shape browser clients use.
pub fn generate_client_id() -> ClientId {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect();
    format!("client_{}", suffix.to_lowercase())
}

pub struct Client {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    client_id: ClientId,
    fake_ping_ms: u64,
    ack_timeout: Duration,
    state: ClientGameState,
}

impl Client {
    pub async fn connect(
        url: &str,
        client_id: impl Into<ClientId>,
        fake_ping_ms: u64,
    ) -> Result<Self, ClientError> {
        let (stream, _response) = connect_async(url).await?;
        info!("Connected to {}", url);

        Ok(Client {
            stream,
            client_id: client_id.into(),
            fake_ping_ms,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            state: ClientGameState::new(),
        })
    }

    /// Sets how long the bot waits for a missing acknowledgement before it
    /// gives up on it.
    pub fn with_ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.ack_timeout = ack_timeout;
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn state(&self) -> &ClientGameState {
        &self.state
    }

    /// Sends a packet, delayed by the simulated round-trip time.
    async fn send_packet(&mut self, packet: &ClientPacket) -> Result<(), ClientError> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms)).await;
        }

        let json = packet.to_json()?;
        self.stream.send(Message::text(json)).await?;
        Ok(())
    }

    pub async fn register(&mut self) -> Result<(), ClientError> {
        let packet = ClientPacket::Register {
            client_id: self.client_id.clone(),
        };
        self.send_packet(&packet).await
    }

    /// Predicts the toggle locally and sends it. Returns whether a local
    /// prediction was made; the request is sent either way.
    pub async fn toggle(&mut self, index: usize) -> Result<bool, ClientError> {
        let predicted = self.state.predict_toggle(index);
        let packet = ClientPacket::ToggleCheckbox {
            client_id: self.client_id.clone(),
            index: index as i64,
        };
        self.send_packet(&packet).await?;
        Ok(predicted)
    }

    /// Waits for the next server packet and applies it to the local state.
    pub async fn recv(&mut self) -> Result<ServerPacket, ClientError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => match ServerPacket::from_json(text.as_str()) {
                    Ok(packet) => {
                        self.state.apply(&packet);
                        return Ok(packet);
                    }
                    Err(e) => warn!("Ignoring unreadable server message: {}", e),
                },
                Some(Ok(Message::Close(_))) | None => return Err(ClientError::Closed),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Receives until the registration snapshot has arrived.
    pub async fn wait_for_registration(&mut self) -> Result<PlayerNumber, ClientError> {
        while !self.state.is_registered() {
            self.recv().await?;
        }
        self.state.player_number.ok_or(ClientError::NotRegistered)
    }

    /// Toggles a random unowned cell every `every` until `toggles` requests
    /// have been sent or the season ends.
    pub async fn run_bot(
        &mut self,
        toggles: usize,
        every: Duration,
    ) -> Result<BotSummary, ClientError> {
        if !self.state.is_registered() {
            return Err(ClientError::NotRegistered);
        }

        let mut rng = StdRng::from_entropy();
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut summary = BotSummary::default();

        while summary.sent < toggles && !self.state.is_season_over() {
            tokio::select! {
                _ = ticker.tick() => {
                    let candidates = self.state.unowned_cells();
                    if let Some(&index) = candidates.choose(&mut rng) {
                        debug!("Toggling cell {}", index);
                        self.toggle(index).await?;
                        summary.sent += 1;
                    }
                },

                packet = self.recv() => match packet? {
                    ServerPacket::ToggleResponse { success: true, .. } => summary.accepted += 1,
                    ServerPacket::ToggleResponse { success: false, .. } => summary.rejected += 1,
                    _ => {}
                },
            }
        }

        // Collect the acknowledgements still in flight. The server may drop
        // packets for a slow peer, so each wait is bounded.
        while summary.accepted + summary.rejected < summary.sent {
            match timeout(self.ack_timeout, self.recv()).await {
                Ok(packet) => match packet? {
                    ServerPacket::ToggleResponse { success: true, .. } => summary.accepted += 1,
                    ServerPacket::ToggleResponse { success: false, .. } => summary.rejected += 1,
                    _ => {}
                },
                Err(_) => {
                    warn!(
                        "Gave up waiting for {} acknowledgements",
                        summary.sent - summary.accepted - summary.rejected
                    );
                    break;
                }
            }
        }
        summary.unanswered = summary.sent - summary.accepted - summary.rejected;

        summary.levels_won = self.state.levels_won;
        Ok(summary)
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        self.stream.close(None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{GameSnapshot, GridConfig};
    use tokio::net::TcpListener;
    use tokio_test::assert_ok;

    /// Start a local WebSocket server that runs `handler` on the accepted
    /// connection and returns the address to connect to.
    async fn start_mock_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        format!("ws://{addr}")
    }

    fn registration_reply(checkboxes: Vec<Option<PlayerNumber>>, me: PlayerNumber) -> String {
        ServerPacket::GameStateUpdate {
            game_state: GameSnapshot {
                current_level: checkboxes.len(),
                checkboxes,
                grid_config: GridConfig::new(1, 2),
                last_won: None,
            },
            player_number: Some(me),
        }
        .to_json()
        .unwrap()
    }

    #[test]
    fn test_generated_client_id_shape() {
        let id = generate_client_id();
        assert!(id.starts_with("client_"));
        assert_eq!(id.len(), "client_".len() + 9);
        assert!(id
            .chars()
            .skip(7)
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_ne!(generate_client_id(), generate_client_id());
    }

    #[tokio::test]
    async fn test_register_sends_client_id_and_reads_snapshot() {
        let url = start_mock_server(|mut ws| async move {
            let Some(Ok(Message::Text(text))) = ws.next().await else {
                panic!("expected a registration");
            };
            let packet = ClientPacket::from_json(text.as_str()).unwrap();
            assert_eq!(
                packet,
                ClientPacket::Register {
                    client_id: "client_test".to_string()
                }
            );
            ws.send(Message::text(registration_reply(vec![None, Some(2)], 1)))
                .await
                .unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut client = assert_ok!(Client::connect(&url, "client_test", 0).await);
        assert_ok!(client.register().await);

        assert_eq!(assert_ok!(client.wait_for_registration().await), 1);
        assert_eq!(client.state().unowned_cells(), vec![0]);
        assert_eq!(client.client_id(), "client_test");
    }

    #[tokio::test]
    async fn test_toggle_predicts_and_sends_index() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::text(registration_reply(vec![None, None], 5)))
                .await
                .unwrap();
            let Some(Ok(Message::Text(text))) = ws.next().await else {
                panic!("expected a toggle");
            };
            assert_eq!(
                ClientPacket::from_json(text.as_str()).unwrap(),
                ClientPacket::ToggleCheckbox {
                    client_id: "bot".to_string(),
                    index: 1
                }
            );
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut client = assert_ok!(Client::connect(&url, "bot", 0).await);
        assert_ok!(client.wait_for_registration().await);

        assert!(assert_ok!(client.toggle(1).await));
        assert_eq!(client.state().checkboxes(), &[None, Some(5)]);
    }

    #[tokio::test]
    async fn test_recv_skips_garbage_and_reports_close() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::text("{not json")).await.unwrap();
            ws.send(Message::text(
                ServerPacket::PlayerCountUpdate { count: 2 }.to_json().unwrap(),
            ))
            .await
            .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut client = assert_ok!(Client::connect(&url, "bot", 0).await);

        let packet = assert_ok!(client.recv().await);
        assert_eq!(packet, ServerPacket::PlayerCountUpdate { count: 2 });
        assert_eq!(client.state().player_count, 2);
        assert!(matches!(client.recv().await, Err(ClientError::Closed)));
    }

    #[tokio::test]
    async fn test_bot_requires_registration() {
        let url = start_mock_server(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut client = assert_ok!(Client::connect(&url, "bot", 0).await);
        let result = client.run_bot(3, Duration::from_millis(1)).await;
        assert!(matches!(result, Err(ClientError::NotRegistered)));
    }

    #[tokio::test]
    async fn test_bot_stops_waiting_for_lost_acks() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::text(registration_reply(vec![None, None], 1)))
                .await
                .unwrap();
            // Swallow every toggle without acknowledging it
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut client = assert_ok!(Client::connect(&url, "bot", 0).await)
            .with_ack_timeout(Duration::from_millis(50));
        assert_ok!(client.wait_for_registration().await);

        let summary = tokio::time::timeout(
            Duration::from_secs(2),
            client.run_bot(1, Duration::from_millis(1)),
        )
        .await
        .expect("bot hung waiting for an acknowledgement");
        let summary = assert_ok!(summary);

        assert_eq!(summary.sent, 1);
        assert_eq!(summary.accepted + summary.rejected, 0);
        assert_eq!(summary.unanswered, 1);
        assert_eq!(client.state().pending_count(), 1);
    }
}
