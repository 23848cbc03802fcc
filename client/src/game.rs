//! One client's simulation: the local actor, its view of everyone else, and
//! the per-frame ordering that ties input, damage, combat and replication
//! together.

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    paths, ActorId, AttackKind, DamageEvent, StoreEvent, DEFAULT_USERNAME, PUBLISH_INTERVAL_MS,
    RESPAWN_TICKS, SPAWN_MARGIN,
};

use crate::actor::{LocalActor, WorldBounds};
use crate::combat::{self, AttackRejected, DamageIntent};
use crate::damage::{DamageInbox, Delivery};
use crate::input::{InputState, MovementKeys};
use crate::replication::{Publisher, RemoteActorCache};
use crate::respawn::{RespawnMachine, Transition};
use crate::shared_store::{self, SharedStore, StoreNotice};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub username: String,
    pub world: WorldBounds,
    pub publish_interval_ms: u64,
    pub respawn_ticks: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            username: DEFAULT_USERNAME.to_string(),
            world: WorldBounds::default(),
            publish_interval_ms: PUBLISH_INTERVAL_MS,
            respawn_ticks: RESPAWN_TICKS,
        }
    }
}

/// What happened during one [`ClientGame::tick`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickReport {
    pub damage_applied: u32,
    pub intents: Vec<DamageIntent>,
    pub transition: Option<Transition>,
    pub published: bool,
}

pub struct ClientGame {
    actor: LocalActor,
    remotes: RemoteActorCache,
    publisher: Publisher,
    inbox: DamageInbox,
    respawn: RespawnMachine,
    world: WorldBounds,
    rng: StdRng,
    connected: bool,
    chatting: bool,
}

impl ClientGame {
    pub fn new(id: ActorId, config: ClientConfig) -> Self {
        Self::with_rng(id, config, StdRng::from_entropy())
    }

    pub fn with_rng(id: ActorId, config: ClientConfig, mut rng: StdRng) -> Self {
        let spawn = config.world.random_spawn(&mut rng, SPAWN_MARGIN);
        let username = match config.username.trim() {
            "" => DEFAULT_USERNAME.to_string(),
            name => name.to_string(),
        };

        Self {
            publisher: Publisher::new(id.clone(), config.publish_interval_ms),
            actor: LocalActor::new(id, username, spawn),
            remotes: RemoteActorCache::new(),
            inbox: DamageInbox::new(),
            respawn: RespawnMachine::new(config.respawn_ticks),
            world: config.world,
            rng,
            connected: false,
            chatting: false,
        }
    }

    pub fn actor(&self) -> &LocalActor {
        &self.actor
    }

    pub fn actor_mut(&mut self) -> &mut LocalActor {
        &mut self.actor
    }

    pub fn remotes(&self) -> &RemoteActorCache {
        &self.remotes
    }

    pub fn world(&self) -> &WorldBounds {
        &self.world
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_dead(&self) -> bool {
        self.respawn.is_dead()
    }

    pub fn respawn_countdown(&self) -> Option<u32> {
        self.respawn.countdown()
    }

    pub fn is_chatting(&self) -> bool {
        self.chatting
    }

    /// Reacts to one store notification. Returns the damage events applied.
    pub fn handle_notice<S: SharedStore>(
        &mut self,
        store: &mut S,
        notice: StoreNotice,
        now_ms: u64,
    ) -> u32 {
        match notice {
            StoreNotice::Connected { session_id } => {
                info!("Joined the arena as {} ({})", self.actor.username, session_id);
                self.connected = true;
                shared_store::register_actor(store, &self.actor.id);
                self.publisher
                    .publish_now(store, &self.actor.snapshot(), now_ms);
                0
            }
            StoreNotice::Disconnected { reason } => {
                warn!("Lost the shared store: {}", reason);
                self.connected = false;
                0
            }
            StoreNotice::Event(StoreEvent::Value { path, children }) if path == paths::PLAYERS => {
                self.remotes.rebuild(&children, &self.actor.id);
                0
            }
            StoreNotice::Event(StoreEvent::ChildAdded { path, key, value })
                if path == paths::damage_queue(&self.actor.id) =>
            {
                let applied = match DamageEvent::from_record(&value) {
                    Ok(event) => matches!(
                        self.inbox.deliver(&key, &event, &mut self.actor),
                        Delivery::Applied { .. }
                    ),
                    Err(e) => {
                        warn!("Discarding undecodable damage event {}: {}", key, e);
                        false
                    }
                };
                store.remove(paths::damage_event(&self.actor.id, &key));
                u32::from(applied)
            }
            StoreNotice::Event(event) => {
                debug!("Ignoring unrelated store event: {:?}", event);
                0
            }
        }
    }

    /// Handles every pending notification without blocking.
    pub fn drain<S: SharedStore>(&mut self, store: &mut S, now_ms: u64) -> u32 {
        let mut applied = 0;
        while let Some(notice) = store.poll_event() {
            applied += self.handle_notice(store, notice, now_ms);
        }
        applied
    }

    /// Advances one frame.
    pub fn tick<S: SharedStore>(
        &mut self,
        store: &mut S,
        input: &InputState,
        now_ms: u64,
    ) -> TickReport {
        let mut report = TickReport {
            damage_applied: self.drain(store, now_ms),
            ..TickReport::default()
        };

        self.chatting = input.chatting;
        let alive = self.actor.is_alive() && !self.respawn.is_dead();

        if alive {
            if let Some(text) = &input.chat_submitted {
                self.actor.say(text);
            }

            if self.chatting {
                self.actor.apply_movement(&MovementKeys::default());
            } else {
                self.actor.face(input.pointer);
                self.actor.apply_movement(&input.movement);
            }

            combat::separate(&mut self.actor, &mut self.remotes);
            self.actor.clamp_to(&self.world);

            if !self.chatting {
                let requested = [(AttackKind::Slash, input.slash), (AttackKind::Charge, input.charge)];
                for (kind, pressed) in requested {
                    if pressed {
                        report.intents.extend(self.perform_attack(store, kind, now_ms));
                    }
                }
            }
        }

        self.actor.tick_timers(now_ms);

        report.transition = self
            .respawn
            .check(&mut self.actor, &self.world, &mut self.rng);
        match report.transition {
            Some(Transition::Died) => {
                self.publisher
                    .publish_now(store, &self.actor.snapshot(), now_ms);
                self.publisher.suppress();
                report.published = true;
            }
            Some(Transition::Respawned) => {
                self.publisher.resume();
                self.publisher
                    .publish_now(store, &self.actor.snapshot(), now_ms);
                report.published = true;
            }
            None => {
                report.published = self
                    .publisher
                    .publish(store, &self.actor.snapshot(), now_ms);
            }
        }

        report
    }

    fn perform_attack<S: SharedStore>(
        &mut self,
        store: &mut S,
        kind: AttackKind,
        now_ms: u64,
    ) -> Vec<DamageIntent> {
        let intents = match combat::attack(&mut self.actor, kind, &self.remotes, now_ms) {
            Ok(intents) => intents,
            Err(AttackRejected::CoolingDown { remaining }) => {
                debug!("{} cooling down for {} more ticks", kind.label(), remaining);
                return Vec::new();
            }
            Err(AttackRejected::Dead) => return Vec::new(),
        };

        for intent in &intents {
            match intent.event.to_record() {
                Ok(record) => store.push(paths::damage_queue(&intent.target), record),
                Err(e) => warn!("Failed to encode damage for {}: {}", intent.target, e),
            }
        }
        if !intents.is_empty() {
            debug!("{} hit {} actor(s)", kind.label(), intents.len());
        }
        intents
    }

    /// Removes this actor's record and queue from the store.
    pub fn leave<S: SharedStore>(&mut self, store: &mut S) {
        info!("Leaving the arena");
        shared_store::unregister_actor(store, &self.actor.id);
        self.connected = false;
    }
}
