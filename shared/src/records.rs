//! Records replicated through the shared store
//!
//! Records travel as JSON text so that a snapshot written by an older or
//! sloppier client still decodes: every field has a default, and health is
//! clamped into range instead of being rejected.

use crate::{ActorId, AttackKind, ProtocolError, DEFAULT_USERNAME, MAX_HEALTH, SLASH_EFFECT_MS};
use serde::{Deserialize, Deserializer, Serialize};

/// Short-lived visual of a slash, rendered until it expires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlashEffect {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub timestamp: u64,
}

impl SlashEffect {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.timestamp) >= SLASH_EFFECT_MS
    }
}

/// Everything other clients observe about one actor. Overwritten wholesale
/// on every publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorSnapshot {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub angle: f32,
    #[serde(default = "full_health", deserialize_with = "lenient_health")]
    pub health: u8,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub slash: Option<SlashEffect>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub chat: String,
}

fn full_health() -> u8 {
    MAX_HEALTH
}

fn default_username() -> String {
    DEFAULT_USERNAME.to_string()
}

fn lenient_health<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(match raw {
        Some(value) if value.is_finite() => value.clamp(0.0, MAX_HEALTH as f64).round() as u8,
        _ => MAX_HEALTH,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl ActorSnapshot {
    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn to_record(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_record(record: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(record)?)
    }
}

/// One hit waiting in its target's queue. The target is implied by the path
/// the event is stored under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageEvent {
    pub from: ActorId,
    #[serde(rename = "type")]
    pub kind: AttackKind,
    pub angle: f32,
    pub timestamp: u64,
}

impl DamageEvent {
    pub fn to_record(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_record(record: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(record)?)
    }
}
