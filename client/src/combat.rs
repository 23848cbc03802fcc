//! Client-side attack resolution and player separation
//!
//! Hits are decided here, against the advisory remote cache, but never
//! applied here: each hit becomes a [`DamageIntent`] that the caller pushes
//! into the target's own damage queue. Only the target ever writes its own
//! health.

use shared::{
    math, ActorId, AttackKind, DamageEvent, SlashEffect, Vector2, SEPARATION_FACTOR,
    SLASH_REACH_PADDING,
};

use crate::actor::LocalActor;
use crate::replication::RemoteActorCache;

/// A hit waiting to be delivered to `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct DamageIntent {
    pub target: ActorId,
    pub event: DamageEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackRejected {
    Dead,
    CoolingDown { remaining: u32 },
}

/// Where an attack's hit circle is centred.
pub fn strike_origin(actor: &LocalActor, kind: AttackKind) -> Vector2 {
    match kind {
        AttackKind::Slash => actor.position.add(&Vector2::from_angle(
            actor.angle,
            actor.radius() + SLASH_REACH_PADDING,
        )),
        AttackKind::Charge => actor.position,
    }
}

/// Live cached actors strictly inside the hit radius of `kind` around
/// `origin`, sorted by id.
pub fn hit_test(origin: Vector2, kind: AttackKind, remotes: &RemoteActorCache) -> Vec<ActorId> {
    let radius = kind.spec().hit_radius;
    let mut hits: Vec<ActorId> = remotes
        .iter()
        .filter(|(_, snapshot)| snapshot.is_alive())
        .filter(|(_, snapshot)| {
            math::distance(origin.x, origin.y, snapshot.x, snapshot.y) < radius
        })
        .map(|(id, _)| id.clone())
        .collect();
    hits.sort();
    hits
}

/// Performs `kind` if the actor is able to, returning one intent per hit.
///
/// Chat-mode gating happens before this is called; everything else an
/// attack depends on is checked here.
pub fn attack(
    actor: &mut LocalActor,
    kind: AttackKind,
    remotes: &RemoteActorCache,
    now_ms: u64,
) -> Result<Vec<DamageIntent>, AttackRejected> {
    if !actor.is_alive() {
        return Err(AttackRejected::Dead);
    }
    let remaining = actor.cooldown(kind);
    if remaining > 0 {
        return Err(AttackRejected::CoolingDown { remaining });
    }

    let spec = kind.spec();
    let origin = strike_origin(actor, kind);
    actor.set_cooldown(kind, spec.cooldown_ticks);

    match kind {
        AttackKind::Slash => {
            actor.slash = Some(SlashEffect {
                x: origin.x,
                y: origin.y,
                angle: actor.angle,
                timestamp: now_ms,
            });
        }
        AttackKind::Charge => {
            actor.velocity = actor
                .velocity
                .add(&Vector2::from_angle(actor.angle, spec.self_impulse));
        }
    }

    let intents = hit_test(origin, kind, remotes)
        .into_iter()
        .map(|target| DamageIntent {
            target,
            event: DamageEvent {
                from: actor.id.clone(),
                kind,
                angle: actor.angle,
                timestamp: now_ms,
            },
        })
        .collect();

    Ok(intents)
}

/// Pushes the local actor and every overlapping live remote apart, each
/// taking half of the overlap.
///
/// The remote half only moves the cached copy, which the next replication
/// update overwrites; the remote owner resolves the same overlap from its
/// side.
pub fn separate(actor: &mut LocalActor, remotes: &mut RemoteActorCache) {
    let min_distance = actor.radius() * SEPARATION_FACTOR;

    for (_, snapshot) in remotes.iter_mut() {
        if !snapshot.is_alive() {
            continue;
        }

        let other = Vector2::new(snapshot.x, snapshot.y);
        if let Some(push) = math::separation(actor.position, other, min_distance) {
            actor.position = actor.position.add(&push);
            snapshot.x -= push.x;
            snapshot.y -= push.y;
        }
    }
}
