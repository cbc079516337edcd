//! # Checkbox Grid Server Library
//!
//! This library provides the authoritative server for the collaborative
//! checkbox grid. It owns the single copy of the grid, hands out player
//! numbers, advances levels, and pushes every change to all connected
//! clients.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative State
//! Clients only ever *request* a toggle. The server decides whether the
//! request is valid, applies it, and tells the requester the outcome before
//! any other client sees the new grid. A rejected request carries the cell's
//! real owner so the client can undo its optimistic change.
//!
//! ### Player Management
//! Handles the lifecycle of each connection:
//! - Registration under a client-chosen identifier and player numbering
//! - Idempotent re-registration and reconnect re-binding
//! - Disconnection cleanup and player-count updates
//! - Connection capacity limits
//!
//! ### Level Progression
//! When every cell is owned the level is won: the win time is recorded, a
//! `gameWon` notice goes out, and the grid grows by one cell. Winning the
//! final level ends the season instead.
//!
//! ## Architecture Design
//!
//! ### Single Event Loop
//! One task owns all mutable state through the [`session::Coordinator`].
//! Connection tasks forward decoded packets over a channel and the loop
//! applies them one at a time, so toggles never interleave.
//!
//! ### Non-Blocking Fan-Out
//! Each connection drains its own bounded queue. The loop never awaits a
//! socket; a peer whose queue is full loses packets instead of stalling
//! everyone else.
//!
//! ## Module Organization
//!
//! - `game`: grid state, toggle rules, grid sizing and level reset
//! - `registry`: client identifier to player number table
//! - `client_manager`: open connections and broadcast
//! - `session`: the coordinator tying the above together
//! - `network`: WebSocket transport and the event loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::bind("127.0.0.1:8080", ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod error;
pub mod game;
pub mod network;
pub mod registry;
pub mod session;
pub mod utils;
