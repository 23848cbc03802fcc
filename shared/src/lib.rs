use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub mod attack;
pub mod math;
pub mod paths;
pub mod records;

pub use attack::{AttackKind, AttackSpec};
pub use math::Vector2;
pub use records::{ActorSnapshot, DamageEvent, SlashEffect};

pub const ACTOR_RADIUS: f32 = 40.0;
pub const MAX_HEALTH: u8 = 100;
pub const MOVE_ACCEL: f32 = 2.0;
pub const MAX_SPEED: f32 = 20.0;
pub const FRICTION: f32 = 0.85;
pub const WORLD_WIDTH: f32 = 800.0;
pub const WORLD_HEIGHT: f32 = 600.0;
pub const SPAWN_MARGIN: f32 = 50.0;
pub const SEPARATION_FACTOR: f32 = 1.6;
pub const SLASH_REACH_PADDING: f32 = 5.0;
pub const SLASH_EFFECT_MS: u64 = 300;
pub const RESPAWN_TICKS: u32 = 180;
pub const CHAT_DISPLAY_TICKS: u32 = 300;
pub const CHAT_MAX_LEN: usize = 80;
pub const PUBLISH_INTERVAL_MS: u64 = 100;
pub const TICK_RATE: u32 = 60;
pub const DEFAULT_USERNAME: &str = "Player";

pub const PROTOCOL_VERSION: u32 = 1;
/// Largest payload a single UDP datagram can carry.
pub const MAX_PACKET_SIZE: usize = 65_507;

/// Client-generated, device-persistent actor identity (a UUID string).
pub type ActorId = String;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("packet codec error: {0}")]
    Packet(#[from] bincode::Error),

    #[error("record codec error: {0}")]
    Record(#[from] serde_json::Error),

    #[error("packet of {0} bytes exceeds the datagram limit")]
    Oversized(usize),
}

/// Operations a client asks the shared store to perform.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum StoreOp {
    /// Overwrite the value at `path` (last write wins).
    Set { path: String, value: String },
    /// Append `value` under a fresh, ordered child key of `path`.
    Push { path: String, value: String },
    /// Delete `path` and everything below it. Missing paths are a no-op.
    Remove { path: String },
    /// Observe the direct children of `path` as a whole.
    SubscribeValue { path: String },
    /// Observe children added under `path`, existing ones replayed first.
    SubscribeChildren { path: String },
    /// Delete `path` when this session ends without saying goodbye.
    OnDisconnectRemove { path: String },
}

impl StoreOp {
    pub fn path(&self) -> &str {
        match self {
            StoreOp::Set { path, .. }
            | StoreOp::Push { path, .. }
            | StoreOp::Remove { path }
            | StoreOp::SubscribeValue { path }
            | StoreOp::SubscribeChildren { path }
            | StoreOp::OnDisconnectRemove { path } => path,
        }
    }
}

/// Notifications the shared store sends to subscribers.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum StoreEvent {
    /// Full set of direct children of a value-subscribed path, in key order.
    Value {
        path: String,
        children: Vec<(String, String)>,
    },
    /// One child appeared under a child-subscribed path.
    ChildAdded {
        path: String,
        key: String,
        value: String,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
        session_id: ActorId,
    },
    Op(StoreOp),
    Heartbeat,
    Disconnect,

    Connected {
        session_id: ActorId,
    },
    Event(StoreEvent),
    Disconnected {
        reason: String,
    },
}

impl Packet {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let data = bincode::serialize(self)?;
        if data.len() > MAX_PACKET_SIZE {
            return Err(ProtocolError::Oversized(data.len()));
        }
        Ok(data)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Milliseconds since the unix epoch, saturating to zero on a skewed clock.
pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}
