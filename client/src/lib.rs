//! # Arena Client Library
//!
//! Everything one player's process does. There is no game server: each
//! client owns exactly one actor, simulates it locally, and publishes its
//! snapshot to the shared store. Other actors are only ever observed.
//!
//! ## Ownership model
//!
//! - A client writes only `players/{own id}` and its own damage queue.
//! - Hits are detected by the attacker but applied by the target: the
//!   attacker pushes a damage event into `damageEvents/{target}` and the
//!   target consumes it, applies it to itself and deletes it.
//! - Disconnect hooks registered on connect clean up both paths if the
//!   process dies, so no actor is left behind as a ghost.
//!
//! ## Frame order
//!
//! Each [`game::ClientGame::tick`] drains store notifications (remote
//! snapshots and damage), runs movement and separation, resolves attacks,
//! advances timers, checks for death or respawn, and finally publishes the
//! snapshot at a throttled rate.
//!
//! ## Module Organization
//!
//! - `actor`: the local actor's kinematics, timers and world bounds
//! - `combat`: hit-testing, attack cooldowns and separation
//! - `damage`: de-duplicated application of incoming damage events
//! - `respawn`: the alive/dead state machine
//! - `replication`: throttled publishing and the remote actor cache
//! - `shared_store`: the store interface the simulation is written against
//! - `network`: the UDP implementation of that interface
//! - `identity`: the persistent actor id
//! - `input` / `rendering`: macroquad front end
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::{ClientConfig, ClientGame};
//! use client::input::InputState;
//! use client::network::NetworkStore;
//!
//! let mut store = NetworkStore::connect("127.0.0.1:9000", "some-id".to_string())?;
//! let mut game = ClientGame::new("some-id".to_string(), ClientConfig::default());
//!
//! loop {
//!     let report = game.tick(&mut store, &InputState::default(), shared::timestamp_ms());
//!     if report.transition.is_some() {
//!         break;
//!     }
//! }
//! # Ok::<(), client::network::NetworkError>(())
//! ```

pub mod actor;
pub mod combat;
pub mod damage;
pub mod game;
pub mod identity;
pub mod input;
pub mod network;
pub mod rendering;
pub mod replication;
pub mod respawn;
pub mod shared_store;
