//! # Garden Client Library
//!
//! Client side of the shared garden: a local simulation of the player and
//! their companion cat, mirrors of every other player, and the adapter that
//! keeps them in sync through the relay.
//!
//! ## Architecture Overview
//!
//! ### Client-Owned Movement
//! The relay does not simulate anything. The local player is moved and
//! collision checked here, and every frame the player moves (plus the frame
//! it stops) a `move` event goes out. Remote players are placed exactly where
//! their owners reported them; they are never collision checked locally.
//!
//! ### Trailing Companions
//! Each player keeps a short ring of recent positions. A cat reads an entry
//! twenty samples back and walks toward it, which makes it trail along the
//! owner's actual route rather than cutting corners.
//!
//! ### Frame Loop
//! One call to [`game::Game::update`] per rendered frame, with the measured
//! frame time. There is no fixed timestep, so movement speed follows the
//! frame rate.
//!
//! ## Module Organization
//!
//! ### Map Module (`map`)
//! Seeded tile map generation and the walkable/plantable queries.
//!
//! ### Player and Cat Modules (`player`, `cat`)
//! Per-frame integrators, position history and animation state.
//!
//! ### Camera Module (`camera`)
//! Smoothed viewport follow, world/screen mapping and visible tile range.
//!
//! ### Game Module (`game`)
//! The frame loop, flower placement, cat adoption and inbound event handling.
//!
//! ### Network Module (`network`)
//! WebSocket adapter with fire-and-forget senders and per-event hooks.
//!
//! ### Input and Rendering Modules (`input`, `rendering`)
//! macroquad keyboard/mouse sampling and drawing.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::{Game, InputState};
//! use client::map::TileMap;
//! use client::network::NetworkClient;
//! use client::player::Player;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let local = Player::new("p1", "Ada", shared::SPAWN_X, shared::SPAWN_Y);
//! let mut game = Game::new(TileMap::generate(42), local, 800.0, 600.0, 7);
//! let mut network = NetworkClient::connect("ws://127.0.0.1:3000", game.join_request()).await?;
//! let mut hooks = Game::event_hooks();
//!
//! loop {
//!     for event in network.poll_events() {
//!         hooks.dispatch(&mut game, event);
//!     }
//!     game.update(&InputState::default(), 16.0, &network);
//! }
//! # }
//! ```

pub mod camera;
pub mod cat;
pub mod game;
pub mod input;
pub mod map;
pub mod network;
pub mod player;
pub mod rendering;
