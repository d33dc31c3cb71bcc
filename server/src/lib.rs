//! # Garden Relay Server Library
//!
//! This library implements the realtime relay for the shared garden. The
//! relay is not authoritative: clients own their own positions and the
//! server only records the latest state each client reported and fans it out
//! to everyone else.
//!
//! ## Core Responsibilities
//!
//! ### Session Registry
//! Tracks one player entry per joined connection. An entry is created on
//! `join`, updated by `move` and `cat-update`, and removed exactly once when
//! its connection goes away.
//!
//! ### Fan-out
//! Movement and companion updates go to every connection except the sender.
//! Flower placements are echoed to the sender as well, since the sender only
//! learns the stored flower's id from that echo.
//!
//! ### Flower Persistence
//! Placements are persisted through a [`store::FlowerStore`] before they are
//! broadcast. Stores never fail from the relay's point of view; a file store
//! that cannot write keeps the flower in memory.
//!
//! ## Architecture Design
//!
//! ### Single Relay Loop
//! Each socket runs in its own task that only decodes and encodes frames.
//! Decoded events are funnelled through one channel into the loop in
//! [`network::Server::run`], which hands them to the [`relay::Relay`] one at
//! a time. Events from different connections interleave at message
//! granularity, never mid-handler, so the registry needs no locking.
//!
//! ### WebSocket Transport
//! Frames are JSON text: `{"event": <name>, "data": <payload>}`. See the
//! `shared::protocol` module for the full contract.
//!
//! ### Liveness
//! The server pings every socket periodically. A socket that stays silent
//! past the configured idle timeout is closed and its player removed.
//!
//! ## Module Organization
//!
//! - `client_manager`: open sockets, outbound queues, idle detection
//! - `moderation`: acceptability oracle for placed flowers (fails open)
//! - `network`: WebSocket server and the relay loop
//! - `relay`: the event-handling state machine
//! - `session`: connection-bound player registry
//! - `store`: flower persistence with in-memory fallback
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//! use server::relay::Relay;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         bind_addr: "127.0.0.1:3000".to_string(),
//!         ..ServerConfig::default()
//!     };
//!     let mut server = Server::new(config, Relay::in_memory()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod moderation;
pub mod network;
pub mod relay;
pub mod session;
pub mod store;
