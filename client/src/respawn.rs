//! Death and respawn timing for the local actor

use log::info;
use rand::Rng;
use shared::SPAWN_MARGIN;

use crate::actor::{LocalActor, WorldBounds};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeState {
    Alive,
    Dead { countdown: u32 },
}

/// A change of [`LifeState`] the caller needs to react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Died,
    Respawned,
}

#[derive(Debug)]
pub struct RespawnMachine {
    state: LifeState,
    respawn_ticks: u32,
}

impl RespawnMachine {
    pub fn new(respawn_ticks: u32) -> Self {
        Self {
            state: LifeState::Alive,
            respawn_ticks,
        }
    }

    pub fn state(&self) -> LifeState {
        self.state
    }

    pub fn is_dead(&self) -> bool {
        matches!(self.state, LifeState::Dead { .. })
    }

    pub fn countdown(&self) -> Option<u32> {
        match self.state {
            LifeState::Dead { countdown } => Some(countdown),
            LifeState::Alive => None,
        }
    }

    /// Enters `Dead` with a full countdown. Returns false if already dead,
    /// leaving the running countdown untouched.
    pub fn kill(&mut self) -> bool {
        if self.is_dead() {
            return false;
        }
        self.state = LifeState::Dead {
            countdown: self.respawn_ticks,
        };
        true
    }

    /// Per-frame step. Notices a fresh death from the actor's health, counts
    /// down while dead, and respawns the actor at a random point when the
    /// countdown runs out.
    pub fn check<R: Rng + ?Sized>(
        &mut self,
        actor: &mut LocalActor,
        bounds: &WorldBounds,
        rng: &mut R,
    ) -> Option<Transition> {
        match self.state {
            LifeState::Alive => {
                if actor.is_alive() {
                    return None;
                }
                self.kill();
                actor.velocity = shared::Vector2::ZERO;
                info!("{} died, respawning in {} ticks", actor.username, self.respawn_ticks);
                Some(Transition::Died)
            }
            LifeState::Dead { countdown } => {
                let countdown = countdown.saturating_sub(1);
                if countdown > 0 {
                    self.state = LifeState::Dead { countdown };
                    return None;
                }

                let spawn = bounds.random_spawn(rng, SPAWN_MARGIN);
                actor.reset_for_respawn(spawn);
                self.state = LifeState::Alive;
                info!(
                    "{} respawned at ({:.0}, {:.0})",
                    actor.username, spawn.x, spawn.y
                );
                Some(Transition::Respawned)
            }
        }
    }
}
