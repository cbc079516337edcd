//! # Checkbox Grid Client Library
//!
//! Headless client for the collaborative checkbox grid. It speaks the same
//! JSON-over-WebSocket protocol as the browser UI, keeps a local mirror of
//! the grid, and can play on its own as a load or smoke-test bot.
//!
//! ## Architecture Overview
//!
//! ### Optimistic Toggles
//! A toggle is applied to the local grid the moment it is sent, so the
//! player never waits a round trip to see their move. The change is kept
//! as a pending prediction until the server acknowledges it.
//!
//! ### Server Reconciliation
//! The acknowledgement carries the cell's authoritative owner. A refused
//! toggle rolls the cell back to that owner. Snapshots that arrive while a
//! prediction is still pending are overlaid with it; a level change drops
//! all pending predictions because the old indices no longer apply.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! - Local grid mirror, player number and player count
//! - Pending prediction bookkeeping and rollback
//! - Level and season notifications
//!
//! ### Network Module (`network`)
//! - WebSocket connection and packet encoding
//! - Registration handshake
//! - Random-move bot loop with optional simulated latency
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{generate_client_id, Client};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::connect("ws://127.0.0.1:8080", generate_client_id(), 0).await?;
//!     client.register().await?;
//!     let player = client.wait_for_registration().await?;
//!     println!("Playing as player {}", player);
//!
//!     let summary = client.run_bot(10, Duration::from_millis(200)).await?;
//!     println!("{} of {} toggles accepted", summary.accepted, summary.sent);
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod network;
