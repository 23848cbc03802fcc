//! Attack kinds and their fixed tuning table

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackKind {
    /// Primary melee swipe in front of the actor.
    Slash,
    /// Dash along the facing direction that hits everyone around the actor.
    Charge,
}

/// Tuning for one attack kind. Every hit-test and every damage application
/// reads its numbers from here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackSpec {
    pub damage: u8,
    pub knockback: f32,
    pub hit_radius: f32,
    pub cooldown_ticks: u32,
    /// Velocity the attacker adds to itself along its facing angle.
    pub self_impulse: f32,
}

const SLASH: AttackSpec = AttackSpec {
    damage: 30,
    knockback: 6.0,
    hit_radius: 50.0,
    cooldown_ticks: 10,
    self_impulse: 0.0,
};

const CHARGE: AttackSpec = AttackSpec {
    damage: 45,
    knockback: 12.0,
    hit_radius: 70.0,
    cooldown_ticks: 60,
    self_impulse: 10.0,
};

impl AttackKind {
    pub const ALL: [AttackKind; 2] = [AttackKind::Slash, AttackKind::Charge];

    pub const fn spec(self) -> &'static AttackSpec {
        match self {
            AttackKind::Slash => &SLASH,
            AttackKind::Charge => &CHARGE,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AttackKind::Slash => "slash",
            AttackKind::Charge => "charge",
        }
    }
}
