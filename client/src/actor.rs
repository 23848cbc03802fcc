//! The locally owned actor and its per-frame kinematics

use rand::Rng;
use shared::math::{clamp_velocity, damp, integrate};
use shared::{
    ActorId, ActorSnapshot, AttackKind, SlashEffect, Vector2, ACTOR_RADIUS, CHAT_DISPLAY_TICKS,
    CHAT_MAX_LEN, FRICTION, MAX_HEALTH, MAX_SPEED, MOVE_ACCEL, WORLD_HEIGHT, WORLD_WIDTH,
};

use crate::input::MovementKeys;

/// Playable area in pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub width: f32,
    pub height: f32,
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            width: WORLD_WIDTH,
            height: WORLD_HEIGHT,
        }
    }
}

impl WorldBounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Keeps a circle of `radius` fully inside the world.
    pub fn clamp(&self, position: Vector2, radius: f32) -> Vector2 {
        Vector2 {
            x: position.x.clamp(radius, (self.width - radius).max(radius)),
            y: position.y.clamp(radius, (self.height - radius).max(radius)),
        }
    }

    /// Uniformly random point at least `margin` away from every edge.
    pub fn random_spawn<R: Rng + ?Sized>(&self, rng: &mut R, margin: f32) -> Vector2 {
        let span_x = (self.width - 2.0 * margin).max(0.0);
        let span_y = (self.height - 2.0 * margin).max(0.0);
        Vector2 {
            x: margin + rng.gen::<f32>() * span_x,
            y: margin + rng.gen::<f32>() * span_y,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalActor {
    pub id: ActorId,
    pub username: String,
    pub position: Vector2,
    pub velocity: Vector2,
    /// Facing in radians, recomputed from the pointer every frame.
    pub angle: f32,
    pub health: u8,
    pub slash: Option<SlashEffect>,
    pub slash_cooldown: u32,
    pub charge_cooldown: u32,
    pub chat: String,
    pub chat_ticks: u32,
}

impl LocalActor {
    pub fn new(id: ActorId, username: String, position: Vector2) -> Self {
        Self {
            id,
            username,
            position,
            velocity: Vector2::ZERO,
            angle: 0.0,
            health: MAX_HEALTH,
            slash: None,
            slash_cooldown: 0,
            charge_cooldown: 0,
            chat: String::new(),
            chat_ticks: 0,
        }
    }

    pub fn radius(&self) -> f32 {
        ACTOR_RADIUS
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// One frame of input acceleration, speed clamp, friction and integration.
    pub fn apply_movement(&mut self, keys: &MovementKeys) {
        let mut velocity = self.velocity;
        if keys.up {
            velocity.y -= MOVE_ACCEL;
        }
        if keys.down {
            velocity.y += MOVE_ACCEL;
        }
        if keys.left {
            velocity.x -= MOVE_ACCEL;
        }
        if keys.right {
            velocity.x += MOVE_ACCEL;
        }

        self.velocity = damp(clamp_velocity(velocity, MAX_SPEED), FRICTION);
        self.position = integrate(self.position, self.velocity);
    }

    pub fn face(&mut self, pointer: Vector2) {
        self.angle = self.position.angle_to(&pointer);
    }

    pub fn clamp_to(&mut self, bounds: &WorldBounds) {
        self.position = bounds.clamp(self.position, self.radius());
    }

    pub fn cooldown(&self, kind: AttackKind) -> u32 {
        match kind {
            AttackKind::Slash => self.slash_cooldown,
            AttackKind::Charge => self.charge_cooldown,
        }
    }

    pub fn set_cooldown(&mut self, kind: AttackKind, ticks: u32) {
        match kind {
            AttackKind::Slash => self.slash_cooldown = ticks,
            AttackKind::Charge => self.charge_cooldown = ticks,
        }
    }

    /// Per-frame countdowns: attack cooldowns, chat display, slash visual.
    pub fn tick_timers(&mut self, now_ms: u64) {
        self.slash_cooldown = self.slash_cooldown.saturating_sub(1);
        self.charge_cooldown = self.charge_cooldown.saturating_sub(1);

        if self.chat_ticks > 0 {
            self.chat_ticks -= 1;
            if self.chat_ticks == 0 {
                self.chat.clear();
            }
        }

        if self.slash.as_ref().is_some_and(|slash| slash.is_expired(now_ms)) {
            self.slash = None;
        }
    }

    /// Subtracts `damage` without going below zero and adds `knockback` to
    /// velocity. Returns true if this hit took the actor to zero.
    pub fn take_damage(&mut self, damage: u8, knockback: Vector2) -> bool {
        let was_alive = self.is_alive();
        self.health = self.health.saturating_sub(damage);
        self.velocity = self.velocity.add(&knockback);
        was_alive && !self.is_alive()
    }

    pub fn say(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.chat = text.chars().take(CHAT_MAX_LEN).collect();
        self.chat_ticks = CHAT_DISPLAY_TICKS;
    }

    /// Back to full strength at `position` with every transient cleared.
    pub fn reset_for_respawn(&mut self, position: Vector2) {
        self.position = position;
        self.velocity = Vector2::ZERO;
        self.health = MAX_HEALTH;
        self.slash = None;
        self.slash_cooldown = 0;
        self.charge_cooldown = 0;
        self.chat.clear();
        self.chat_ticks = 0;
    }

    pub fn snapshot(&self) -> ActorSnapshot {
        ActorSnapshot {
            x: self.position.x,
            y: self.position.y,
            angle: self.angle,
            health: self.health,
            username: self.username.clone(),
            slash: self.slash.clone(),
            chat: self.chat.clone(),
        }
    }
}
