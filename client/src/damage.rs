//! Applying damage events addressed to the local actor
//!
//! Delivery from the store is at-least-once: a resubscribe replays whatever
//! is still queued. Each event id is applied at most once, and the caller
//! removes the event from the store whatever the outcome.

use log::{debug, info};
use shared::{DamageEvent, Vector2};
use std::collections::{HashSet, VecDeque};

use crate::actor::LocalActor;

/// How many consumed event ids are remembered for de-duplication.
pub const CONSUMED_ID_MEMORY: usize = 256;

/// Events older than the newest applied one by more than this are dropped.
/// Clocks differ between clients, so the window is generous.
pub const STALE_EVENT_WINDOW_MS: u64 = 5_000;

/// Outcome of one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Applied { damage: u8, killed: bool },
    IgnoredDead,
    IgnoredSelf,
    Duplicate,
    Stale,
}

#[derive(Debug, Default)]
pub struct DamageInbox {
    consumed_order: VecDeque<String>,
    consumed: HashSet<String>,
    last_applied_timestamp: Option<u64>,
    applied: u64,
}

impl DamageInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliver(&mut self, event_id: &str, event: &DamageEvent, actor: &mut LocalActor) -> Delivery {
        if self.consumed.contains(event_id) {
            debug!("Duplicate damage event {}", event_id);
            return Delivery::Duplicate;
        }
        self.remember(event_id);

        if event.from == actor.id {
            return Delivery::IgnoredSelf;
        }
        if !actor.is_alive() {
            return Delivery::IgnoredDead;
        }
        if let Some(last) = self.last_applied_timestamp {
            if event.timestamp.saturating_add(STALE_EVENT_WINDOW_MS) < last {
                debug!(
                    "Dropping stale damage event {} ({}ms behind)",
                    event_id,
                    last - event.timestamp
                );
                return Delivery::Stale;
            }
        }

        let spec = event.kind.spec();
        let knockback = Vector2::from_angle(event.angle, spec.knockback);
        let killed = actor.take_damage(spec.damage, knockback);

        self.last_applied_timestamp = Some(
            self.last_applied_timestamp
                .map_or(event.timestamp, |last| last.max(event.timestamp)),
        );
        self.applied += 1;

        if killed {
            info!("Killed by {} ({})", event.from, event.kind.label());
        }

        Delivery::Applied {
            damage: spec.damage,
            killed,
        }
    }

    pub fn applied(&self) -> u64 {
        self.applied
    }

    fn remember(&mut self, event_id: &str) {
        if self.consumed_order.len() >= CONSUMED_ID_MEMORY {
            if let Some(oldest) = self.consumed_order.pop_front() {
                self.consumed.remove(&oldest);
            }
        }
        self.consumed_order.push_back(event_id.to_string());
        self.consumed.insert(event_id.to_string());
    }
}
