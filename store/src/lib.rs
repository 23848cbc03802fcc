//! # Shared Store
//!
//! The replication substrate every arena client talks to. It is deliberately
//! dumb: it never simulates, never validates hits and never decides who won.
//! It stores JSON records at slash-separated paths and tells subscribers when
//! those records change.
//!
//! ## Semantics
//!
//! - **Set** overwrites one key; the last write wins.
//! - **Push** appends under a fresh key that sorts after every earlier push,
//!   which gives damage queues their natural delivery order.
//! - **Remove** deletes a path and everything below it. Removing something
//!   that is already gone is a no-op, so double consumption is harmless.
//! - **SubscribeValue** delivers the direct children of a path now and after
//!   every change at or below it.
//! - **SubscribeChildren** replays existing children, then reports each new
//!   one. Replays after a reconnect make delivery at-least-once.
//! - **OnDisconnectRemove** registers a path to delete when the session ends
//!   without a clean goodbye (timeout, or the same identity reconnecting).
//!
//! ## Module Organization
//!
//! - `database`: ordered path-keyed storage and push key generation
//! - `engine`: subscriptions, disconnect hooks and ownership rules
//! - `session_manager`: address and liveness tracking for UDP sessions
//! - `network`: the tokio event loop serving the engine over UDP
//!
//! ```rust,no_run
//! use store::network::{Server, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new("127.0.0.1:9000", StoreConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod database;
pub mod engine;
pub mod network;
pub mod session_manager;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid path {0:?}")]
    InvalidPath(String),

    #[error("session {session_id} may not modify {path}")]
    PermissionDenied { session_id: String, path: String },

    #[error("unknown session {0}")]
    UnknownSession(String),

    #[error("store is full")]
    Full,
}
